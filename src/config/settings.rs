//! TOML-based configuration for ledgerview.
//!
//! Supports a config file (ledgerview.toml) with environment variable
//! expansion in path-valued settings.
//!
//! Example configuration:
//! ```toml
//! [warehouse]
//! data_dir = "${LEDGER_DATA}/export"
//! preload = ["customers", "charges"]
//!
//! [report]
//! default_grain = "month"
//! page_size = 50
//! cache_enabled = true
//!
//! [logging]
//! level = "info"
//!
//! # Extends or replaces entities of the built-in ledger schema.
//! [schema.entities.disputes]
//! time_field = "created"
//! fields = [
//!     { name = "id", type = "text" },
//!     { name = "amount", type = "number", unit = "currency" },
//!     { name = "created", type = "date" },
//! ]
//! ```

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::model::{Schema, TimeGrain};

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]*)\}|\$([A-Za-z0-9_]+)").unwrap());

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub warehouse: WarehouseSettings,
    pub report: ReportSettings,
    pub logging: LoggingSettings,
    /// Entity definitions merged over the built-in ledger schema.
    pub schema: Option<Schema>,
}

/// Where entity data comes from.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WarehouseSettings {
    /// Directory holding `<entity>.json` files (supports ${ENV_VAR} expansion).
    pub data_dir: String,

    /// Entities loaded up front.
    pub preload: Vec<String>,
}

impl Default for WarehouseSettings {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            preload: Vec::new(),
        }
    }
}

impl WarehouseSettings {
    /// Get the data directory with environment variables expanded.
    pub fn resolved_data_dir(&self) -> Result<PathBuf, SettingsError> {
        expand_env_vars(&self.data_dir).map(PathBuf::from)
    }
}

/// Report engine defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Grain used when a report does not set one.
    pub default_grain: Option<TimeGrain>,

    /// Rows per page for table output. 0 disables paging.
    pub page_size: usize,

    /// Memoize tables and formula results per warehouse version.
    pub cache_enabled: bool,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            default_grain: None,
            page_size: 50,
            cache_enabled: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.check()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `LEDGERVIEW_CONFIG`
    /// 2. `./ledgerview.toml`
    /// 3. `~/.config/ledgerview/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("LEDGERVIEW_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("ledgerview.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("ledgerview").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// The built-in ledger schema with any configured entities merged in.
    pub fn effective_schema(&self) -> Schema {
        let mut schema = Schema::ledger();
        if let Some(extra) = &self.schema {
            schema.merge(extra.clone());
        }
        schema
    }

    fn check(&self) -> Result<(), SettingsError> {
        if let Some(schema) = &self.schema {
            for (name, entity) in &schema.entities {
                if let Some(time_field) = &entity.time_field {
                    if entity.field(time_field).is_none() {
                        return Err(SettingsError::InvalidConfig(format!(
                            "entity '{}' names time field '{}' but does not declare it",
                            name, time_field
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax. A lone `$` is kept as is.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut missing = None;
    let expanded = ENV_VAR.replace_all(s, |caps: &Captures<'_>| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map_or("", |m| m.as_str());
        match env::var(name) {
            Ok(value) => value,
            Err(_) => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(SettingsError::MissingEnvVar(name)),
        None => Ok(expanded.into_owned()),
    }
}
