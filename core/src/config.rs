use crate::error::{Result, TmdbIndexError};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the project-local config file
pub const CONFIG_FILE_NAME: &str = "tmdb-index.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub tmdb: TmdbConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TmdbConfig {
    /// Base URL of the TMDB API (without the `/3` version segment)
    pub api_url: String,
    /// Base URL serving the daily export files
    pub export_url: String,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Maximum number of external-id lookups in flight
    pub concurrency: usize,
}

/// Per-run caps on upstream work
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Change-feed days replayed per run
    pub days: usize,
    /// Never-fetched ids looked up per run
    pub backfill: usize,
    /// Oldest-fetched ids refreshed per run
    pub refresh: usize,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.themoviedb.org".to_string(),
            export_url: "http://files.tmdb.org".to_string(),
            timeout_secs: 10,
            concurrency: 4,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            days: 7,
            backfill: 1_000,
            refresh: 1_000,
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            TmdbIndexError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }
}

/// Location of the per-user config file
pub fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".tmdb-index").join("config.toml"))
}

pub fn get_config() -> Result<Config> {
    // Priority order (highest to lowest):
    // 1. Explicit config file via TMDB_INDEX_CONFIG env var
    // 2. Local config file (tmdb-index.toml)
    // 3. Global config file (~/.tmdb-index/config.toml)
    // 4. Default configuration

    if let Ok(config_path) = env::var("TMDB_INDEX_CONFIG") {
        return Config::from_file(Path::new(&config_path));
    }

    if let Ok(current_dir) = env::current_dir() {
        let local_config_path = current_dir.join(CONFIG_FILE_NAME);
        if local_config_path.exists() {
            return Config::from_file(&local_config_path);
        }
    }

    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            return Config::from_file(&global_path);
        }
    }

    Ok(Config::default())
}

/// Load an explicit config file, or fall back to [`get_config`]
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => Config::from_file(path),
        None => get_config(),
    }
}

/// TMDB API key from the environment. Never read from config files.
pub fn api_key_from_env() -> Result<String> {
    match env::var("TMDB_API_KEY") {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(TmdbIndexError::config(
            "TMDB_API_KEY is not set (export it or put it in a .env file)",
        )),
    }
}
