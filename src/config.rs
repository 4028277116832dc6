//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Wizard engine configuration.
#[derive(Debug, Clone)]
pub struct WizardConfig {
    /// Location of the libSQL database file.
    pub database_path: PathBuf,
    /// Quiet period after the last draft change before autosave writes it.
    pub autosave_debounce: Duration,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./data/goal-compass.db"),
            autosave_debounce: Duration::from_secs(1),
        }
    }
}

impl WizardConfig {
    /// Build a config from `GOAL_COMPASS_*` environment variables, falling
    /// back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = lookup("GOAL_COMPASS_DB_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(raw) = lookup("GOAL_COMPASS_AUTOSAVE_MS") {
            let millis: u64 = raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: "GOAL_COMPASS_AUTOSAVE_MS".to_string(),
                message: format!("{raw:?} is not a number of milliseconds: {e}"),
            })?;
            config.autosave_debounce = Duration::from_millis(millis);
        }

        Ok(config)
    }
}
