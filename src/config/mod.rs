//! Configuration module for ledgerview.
//!
//! Handles the settings file and environment variable expansion. Report
//! files are read by [`crate::report::load_report_config`].

mod settings;

pub use settings::{
    expand_env_vars, LoggingSettings, ReportSettings, Settings, SettingsError, WarehouseSettings,
};
