use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::database::DbLocation;
use crate::error::PatchError;

/// Prefix for environment overrides, e.g. `CIERRES_DATABASE__PATH`
const ENV_PREFIX: &str = "CIERRES_";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoggingConfig {
    pub cierres_patch: String,
}

impl LoggingConfig {
    const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
    const CIERRES_PATCH_LEVEL: &str = "info";

    fn default() -> Self {
        LoggingConfig {
            cierres_patch: Self::CIERRES_PATCH_LEVEL.to_string(),
        }
    }

    fn ensure_valid(&mut self) {
        let str_original = self.cierres_patch.clone();
        self.cierres_patch = self.cierres_patch.trim().to_ascii_lowercase();
        if !Self::LOG_LEVELS.contains(&self.cierres_patch.as_str()) {
            eprintln!(
                "Config error: cierres_patch log level of '{}' is invalid - using default of '{}'",
                str_original,
                Self::CIERRES_PATCH_LEVEL
            );
            self.cierres_patch = Self::CIERRES_PATCH_LEVEL.to_owned();
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DatabaseConfig {
    location: String,
    file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
}

impl DatabaseConfig {
    const LOCATIONS: [&str; 2] = ["relative", "fixed"];

    const LOCATION_RELATIVE: &str = "relative";
    const LOCATION_FIXED: &str = "fixed";
    const FILE_NAME: &str = "db.js.db";

    fn default() -> Self {
        DatabaseConfig {
            location: Self::LOCATION_RELATIVE.to_owned(),
            file_name: Self::FILE_NAME.to_owned(),
            path: None,
        }
    }

    pub fn db_location(&self) -> Result<DbLocation, PatchError> {
        match self.location.as_str() {
            Self::LOCATION_FIXED => match &self.path {
                Some(path) => Ok(DbLocation::Fixed(path.clone())),
                None => Err(PatchError::ConfigError(
                    "database.location is 'fixed' but database.path is not set".to_owned(),
                )),
            },
            _ => Ok(DbLocation::Relative {
                file_name: self.file_name.clone(),
            }),
        }
    }

    fn ensure_valid(&mut self) {
        let str_original = self.location.clone();
        self.location = self.location.trim().to_ascii_lowercase();
        if !Self::LOCATIONS.contains(&self.location.as_str()) {
            eprintln!(
                "Config error: database location of '{}' is invalid - using default of '{}'",
                str_original,
                Self::LOCATION_RELATIVE
            );
            self.location = Self::LOCATION_RELATIVE.to_owned();
        }

        if self.file_name.trim().is_empty() {
            eprintln!(
                "Config error: database file_name is empty - using default of '{}'",
                Self::FILE_NAME
            );
            self.file_name = Self::FILE_NAME.to_owned();
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BackupConfig {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    /// Number of backups retained after each new one; 0 keeps them all
    pub keep: usize,
}

impl BackupConfig {
    const KEEP: usize = 10;

    fn default() -> Self {
        BackupConfig {
            enabled: false,
            directory: None,
            keep: Self::KEEP,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub backup: BackupConfig,
}

impl Config {
    fn default() -> Self {
        Config {
            logging: LoggingConfig::default(),
            database: DatabaseConfig::default(),
            backup: BackupConfig::default(),
        }
    }

    /// Loads the configuration from a TOML file located in the app's data directory.
    /// If the file is missing or fails to parse, defaults are used.
    /// Additionally, writes the default config to disk if no file exists.
    pub fn load_config(project_dirs: &ProjectDirs) -> Self {
        let config_path = project_dirs.data_local_dir().join("config.toml");
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Self {
        let default_config = Config::default();

        // If the config file doesn't exist, write the default configuration to disk.
        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                if let Err(e) = fs::create_dir_all(parent) {
                    eprintln!(
                        "Failed to create configuration directory {}: {}",
                        parent.display(),
                        e
                    );
                }
            }
            if let Ok(toml_string) = toml::to_string_pretty(&default_config) {
                if let Err(e) = fs::write(config_path, toml_string) {
                    eprintln!(
                        "Failed to write default config to {}: {}",
                        config_path.display(),
                        e
                    );
                }
            } else {
                eprintln!("Failed to serialize default config.");
            }
        }

        // Defaults, then the TOML file, then CIERRES_* environment variables
        let figment = Figment::from(Serialized::defaults(default_config.clone()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let mut config = figment.extract().unwrap_or_else(|err| {
            eprintln!(
                "Could not load config file {}: {}. Using default configuration.",
                config_path.display(),
                err
            );
            default_config
        });

        config.ensure_valid();

        config
    }

    fn ensure_valid(&mut self) {
        self.logging.ensure_valid();
        self.database.ensure_valid();
    }
}
