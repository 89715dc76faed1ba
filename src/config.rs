use std::{env, path::PathBuf};

use directories::BaseDirs;
use lazy_static::lazy_static;
use serde::Deserialize;

const CONFIG: &str = include_str!("../.config/config.json5");

lazy_static! {
    pub static ref PROJECT_NAME: String = env!("CARGO_CRATE_NAME").to_uppercase().to_string();
    pub static ref DATA_FOLDER: Option<PathBuf> =
        env::var(format!("{}_DATA", PROJECT_NAME.clone()))
            .ok()
            .map(PathBuf::from);
    pub static ref CONFIG_FOLDER: Option<PathBuf> =
        env::var(format!("{}_CONFIG", PROJECT_NAME.clone()))
            .ok()
            .map(PathBuf::from);
}

/// Tunables for the execution core and loader.
///
/// Deserialization expects every field present; the built-in config and the
/// `from_path` builder defaults always supply all of them.
#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    pub checkpoint_interval: usize,
    pub max_datasets: usize,
    pub default_page_size: usize,
    pub large_file_threshold_mb: u64,
    pub download_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        json5::from_str(CONFIG).expect("built-in config.json5 must parse")
    }
}

impl Settings {
    /// Load settings: built-in defaults, overlaid by an optional config file
    /// (explicit path, or `config.json5` in the config dir), overlaid by
    /// `DATASCOPE_`-prefixed environment variables.
    pub fn from_path(config_path: Option<&PathBuf>) -> Result<Self, config::ConfigError> {
        let defaults = Settings::default();
        let mut builder = config::Config::builder()
            .set_default("checkpoint_interval", defaults.checkpoint_interval as u64)?
            .set_default("max_datasets", defaults.max_datasets as u64)?
            .set_default("default_page_size", defaults.default_page_size as u64)?
            .set_default("large_file_threshold_mb", defaults.large_file_threshold_mb)?
            .set_default("download_timeout_secs", defaults.download_timeout_secs)?;

        let selected = config_path
            .cloned()
            .unwrap_or_else(|| get_config_dir().join("config.json5"));
        if selected.exists() {
            builder = builder.add_source(
                config::File::from(selected).format(config::FileFormat::Json5),
            );
        }
        builder = builder.add_source(
            config::Environment::with_prefix(&PROJECT_NAME).separator("__"),
        );

        builder.build()?.try_deserialize()
    }

    pub fn large_file_threshold_bytes(&self) -> u64 {
        self.large_file_threshold_mb * 1024 * 1024
    }
}

/// User-scoped data directory (`~/.datascope` unless overridden).
pub fn get_data_dir() -> PathBuf {
    if let Some(dir) = DATA_FOLDER.clone() {
        dir
    } else if let Some(base) = BaseDirs::new() {
        base.home_dir().join(".datascope")
    } else {
        PathBuf::from(".datascope")
    }
}

/// User-scoped config directory.
pub fn get_config_dir() -> PathBuf {
    if let Some(dir) = CONFIG_FOLDER.clone() {
        dir
    } else {
        get_data_dir().join("config")
    }
}

/// Cache directory for downloaded sources.
pub fn cache_dir() -> PathBuf {
    get_data_dir().join("cache")
}

/// Fixed user-scoped path of the saved-analyses database.
pub fn analyses_db_path() -> PathBuf {
    get_data_dir().join("analyses.db")
}
