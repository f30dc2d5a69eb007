//! Command-line interface for tmdb-index

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tmdb_index_core::EntityType;

#[derive(Parser)]
#[command(name = "tmdb-index")]
#[command(about = "Incrementally synchronized local index of the TMDB catalog")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to use instead of the usual lookup
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an empty table file
    Init {
        /// Table file to create
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Bring a table up to date with TMDB
    Sync {
        /// Table file to update
        path: PathBuf,

        /// Entity type stored in the table (movie, tv or person)
        #[arg(long, env = "TMDB_TYPE", value_parser = parse_entity)]
        tmdb_type: EntityType,

        /// Change-feed days to replay this run
        #[arg(long)]
        days: Option<usize>,

        /// Never-fetched ids to look up this run
        #[arg(long)]
        backfill: Option<usize>,

        /// Oldest-fetched ids to refresh this run
        #[arg(long)]
        refresh: Option<usize>,

        /// External-id lookups in flight at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Run everything but do not write the table
        #[arg(long)]
        dry_run: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize the differences between two table files
    Diff {
        /// Older table
        old: PathBuf,

        /// Newer table
        new: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Describe a table file
    Show {
        /// Table file to describe
        path: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_entity(s: &str) -> Result<EntityType, String> {
    s.parse()
}
