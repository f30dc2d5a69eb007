//! Command implementations for tmdb-index CLI

use crate::cli::Commands;
use crate::output::{JsonFormatter, PrettyPrinter, TableInfo};
use crate::progress::ProgressReporter;
use std::path::{Path, PathBuf};
use tmdb_index_core::config::{self, Config};
use tmdb_index_core::error::{Result, TmdbIndexError};
use tmdb_index_core::{
    process, summary, verify_integrity, EntityType, KeyedTable, LocalStorage, SyncOptions,
    SyncProgress, TableStorage, TmdbClient,
};

/// Per-run overrides given on the command line
#[derive(Debug, Default, Clone, Copy)]
pub struct LimitOverrides {
    pub days: Option<usize>,
    pub backfill: Option<usize>,
    pub refresh: Option<usize>,
    pub concurrency: Option<usize>,
}

impl LimitOverrides {
    /// Config values with any command-line value taking precedence
    pub fn apply(&self, config: &Config) -> SyncOptions {
        let defaults = SyncOptions::from(config);
        SyncOptions {
            days_limit: self.days.unwrap_or(defaults.days_limit),
            backfill_limit: self.backfill.unwrap_or(defaults.backfill_limit),
            refresh_limit: self.refresh.unwrap_or(defaults.refresh_limit),
            concurrency: self.concurrency.unwrap_or(defaults.concurrency),
        }
    }
}

/// Execute a command
pub fn execute_command(command: Commands, config_path: Option<&Path>) -> Result<()> {
    match command {
        Commands::Init { path, force } => init_command(&path, force),
        Commands::Sync {
            path,
            tmdb_type,
            days,
            backfill,
            refresh,
            concurrency,
            dry_run,
            json,
        } => {
            let overrides = LimitOverrides {
                days,
                backfill,
                refresh,
                concurrency,
            };
            sync_command(config_path, &path, tmdb_type, overrides, dry_run, json)
        }
        Commands::Diff { old, new, json } => diff_command(&old, &new, json),
        Commands::Show { path, json } => show_command(&path, json),
    }
}

fn storage() -> LocalStorage {
    LocalStorage::new(PathBuf::from("."))
}

fn init_command(path: &Path, force: bool) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let storage = storage();
        if storage.exists(path).await? && !force {
            return Err(TmdbIndexError::invalid_input(format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            )));
        }
        let _lock = storage.lock(path)?;
        storage.write_table(path, &KeyedTable::empty()).await?;
        println!("✅ Initialized empty table at: {}", path.display());
        Ok(())
    })
}

fn sync_command(
    config_path: Option<&Path>,
    path: &Path,
    entity: EntityType,
    overrides: LimitOverrides,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let config = config::load_config(config_path)?;
    let options = overrides.apply(&config);
    let client = TmdbClient::new(&config.tmdb, config::api_key_from_env()?)?;
    log::debug!("sync options: {options:?}");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let storage = storage();
        if !storage.exists(path).await? {
            return Err(TmdbIndexError::invalid_input(format!(
                "{} does not exist (create it with `tmdb-index init`)",
                path.display()
            )));
        }
        let _lock = storage.lock(path)?;
        let before = storage.read_table(path).await?;

        let mut progress = ProgressReporter::new_for_sync(!json);
        let today = chrono::Utc::now().date_naive();
        let outcome = process(
            &before,
            entity,
            &client,
            &options,
            today,
            Some(&progress as &dyn SyncProgress),
        )
        .await?;
        progress.finish("Sync finished");

        verify_integrity(&before, &outcome.table)?;
        let changes = summary(&before, &outcome.table)?;

        if dry_run {
            log::info!("dry run: not writing {}", path.display());
        } else {
            storage.write_table(path, &outcome.table).await?;
        }

        let display_path = path.display().to_string();
        if json {
            println!(
                "{}",
                JsonFormatter::format_sync_report(&outcome.report, &changes, dry_run)?
            );
        } else {
            PrettyPrinter::print_sync_report(&display_path, &outcome.report, &changes, dry_run);
        }
        Ok(())
    })
}

fn diff_command(old: &Path, new: &Path, json: bool) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let storage = storage();
        let old_table = storage.read_table(old).await?;
        let new_table = storage.read_table(new).await?;
        let changes = summary(&old_table, &new_table)?;

        if json {
            println!("{}", JsonFormatter::format_diff(&changes)?);
        } else {
            PrettyPrinter::print_diff(
                &old.display().to_string(),
                &new.display().to_string(),
                &changes,
            );
        }
        Ok(())
    })
}

fn show_command(path: &Path, json: bool) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let storage = storage();
        let table = storage.read_table(path).await?;
        let file_size = std::fs::metadata(storage.resolve(path))?.len();
        let info = TableInfo::from_table(&path.display().to_string(), file_size, &table)?;

        if json {
            println!("{}", JsonFormatter::format_table_info(&info)?);
        } else {
            PrettyPrinter::print_table_info(&info);
        }
        Ok(())
    })
}
