//! User settings for the shortcut engine and its collaborators
//!
//! Read from `~/.slashprompt/config.json`. Every section is optional and a
//! missing or broken file yields the built-in defaults, so callers go
//! through the `Config::get_*` accessors rather than the raw fields.

mod defaults;
mod loader;
mod types;

pub use defaults::*;

pub use types::{Config, OptimizeConfig, OverlayConfig, ShortcutConfig, StorageConfig};

pub use loader::{default_config_path, load_config, load_config_from};

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
