//! Configuration loading from file system

use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use super::types::Config;

/// Default config location (~/.slashprompt/config.json)
pub fn default_config_path() -> PathBuf {
    PathBuf::from(shellexpand::tilde("~/.slashprompt/config.json").as_ref())
}

/// Load configuration from ~/.slashprompt/config.json
///
/// Returns Config::default() if the file is missing or malformed.
pub fn load_config() -> Config {
    load_config_from(&default_config_path())
}

/// Load configuration from an explicit path, falling back to defaults
#[instrument(name = "load_config", fields(path = %config_path.display()))]
pub fn load_config_from(config_path: &Path) -> Config {
    if !config_path.exists() {
        info!("Config file not found, using defaults");
        return Config::default();
    }

    let contents = match std::fs::read_to_string(config_path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!(error = %e, "Failed to read config file, using defaults");
            return Config::default();
        }
    };

    match serde_json::from_str::<Config>(&contents) {
        Ok(config) => {
            info!("Successfully loaded config");
            config
        }
        Err(e) => {
            warn!(
                error = %e,
                line = e.line(),
                column = e.column(),
                "Failed to parse config JSON, using defaults"
            );
            Config::default()
        }
    }
}
