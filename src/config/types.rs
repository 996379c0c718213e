//! Configuration type definitions
//!
//! This module contains all the struct definitions for configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::defaults::*;

// ============================================
// SHORTCUT CONFIG
// ============================================

/// Trigger detection and closing heuristic settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortcutConfig {
    /// Detection throttle window in milliseconds (default: 200)
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    /// Maximum chars between "/" and the cursor (default: 200)
    #[serde(default = "default_max_trigger_distance")]
    pub max_trigger_distance: usize,
    /// Grace delay before closing an unproductive session (default: 1000)
    #[serde(default = "default_close_grace_ms")]
    pub close_grace_ms: u64,
    /// Term length that counts as unproductive when it contains ideographs (default: 30)
    #[serde(default = "default_cjk_close_threshold")]
    pub cjk_close_threshold: usize,
    /// Term length that counts as unproductive otherwise (default: 60)
    #[serde(default = "default_latin_close_threshold")]
    pub latin_close_threshold: usize,
    /// Maximum results requested per search (default: 10)
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,
}

fn default_throttle_ms() -> u64 {
    DEFAULT_THROTTLE_MS
}
fn default_max_trigger_distance() -> usize {
    DEFAULT_MAX_TRIGGER_DISTANCE
}
fn default_close_grace_ms() -> u64 {
    DEFAULT_CLOSE_GRACE_MS
}
fn default_cjk_close_threshold() -> usize {
    DEFAULT_CJK_CLOSE_THRESHOLD
}
fn default_latin_close_threshold() -> usize {
    DEFAULT_LATIN_CLOSE_THRESHOLD
}
fn default_result_limit() -> usize {
    DEFAULT_RESULT_LIMIT
}

impl Default for ShortcutConfig {
    fn default() -> Self {
        ShortcutConfig {
            throttle_ms: DEFAULT_THROTTLE_MS,
            max_trigger_distance: DEFAULT_MAX_TRIGGER_DISTANCE,
            close_grace_ms: DEFAULT_CLOSE_GRACE_MS,
            cjk_close_threshold: DEFAULT_CJK_CLOSE_THRESHOLD,
            latin_close_threshold: DEFAULT_LATIN_CLOSE_THRESHOLD,
            result_limit: DEFAULT_RESULT_LIMIT,
        }
    }
}

impl ShortcutConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }
}

// ============================================
// OVERLAY CONFIG
// ============================================

/// Overlay geometry used by the positioning algorithm
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayConfig {
    /// Overlay width in px (default: 320)
    #[serde(default = "default_overlay_width")]
    pub width: f64,
    /// Overlay max height in px (default: 300)
    #[serde(default = "default_overlay_max_height")]
    pub max_height: f64,
    /// Minimum distance from the viewport edge in px (default: 20)
    #[serde(default = "default_overlay_margin")]
    pub margin: f64,
}

fn default_overlay_width() -> f64 {
    DEFAULT_OVERLAY_WIDTH
}
fn default_overlay_max_height() -> f64 {
    DEFAULT_OVERLAY_MAX_HEIGHT
}
fn default_overlay_margin() -> f64 {
    DEFAULT_OVERLAY_MARGIN
}

impl Default for OverlayConfig {
    fn default() -> Self {
        OverlayConfig {
            width: DEFAULT_OVERLAY_WIDTH,
            max_height: DEFAULT_OVERLAY_MAX_HEIGHT,
            margin: DEFAULT_OVERLAY_MARGIN,
        }
    }
}

// ============================================
// OPTIMIZE CONFIG
// ============================================

/// Settings for the OpenAI-compatible optimize collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeConfig {
    /// Base URL without the `/chat/completions` suffix
    #[serde(default = "default_optimize_base_url")]
    pub base_url: String,
    #[serde(default = "default_optimize_model")]
    pub model: String,
    /// Extra attempts after the first one (default: 2)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay between attempts in milliseconds (default: 1000)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Multiplier applied to the base delay after a rate limit (default: 3)
    #[serde(default = "default_rate_limit_multiplier")]
    pub rate_limit_multiplier: u32,
    /// Inputs longer than this are truncated (default: 10000)
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

fn default_optimize_base_url() -> String {
    DEFAULT_OPTIMIZE_BASE_URL.to_string()
}
fn default_optimize_model() -> String {
    DEFAULT_OPTIMIZE_MODEL.to_string()
}
fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}
fn default_rate_limit_multiplier() -> u32 {
    DEFAULT_RATE_LIMIT_MULTIPLIER
}
fn default_max_input_chars() -> usize {
    DEFAULT_MAX_INPUT_CHARS
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        OptimizeConfig {
            base_url: DEFAULT_OPTIMIZE_BASE_URL.to_string(),
            model: DEFAULT_OPTIMIZE_MODEL.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            rate_limit_multiplier: DEFAULT_RATE_LIMIT_MULTIPLIER,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
        }
    }
}

impl OptimizeConfig {
    /// API key from the environment; never read from the config file
    pub fn api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty())
    }

    /// Full chat completion endpoint
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

// ============================================
// STORAGE CONFIG
// ============================================

/// Where the prompt library lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Library file; `~` is expanded (default: ~/.slashprompt/prompts.json)
    #[serde(default = "default_store_path")]
    pub path: String,
    /// Search the cached snapshot instead of the store (default: false)
    #[serde(default)]
    pub offline: bool,
}

fn default_store_path() -> String {
    DEFAULT_STORE_PATH.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            path: DEFAULT_STORE_PATH.to_string(),
            offline: false,
        }
    }
}

impl StorageConfig {
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).as_ref())
    }
}

// ============================================
// MAIN CONFIG
// ============================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Trigger detection settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortcut: Option<ShortcutConfig>,
    /// Overlay geometry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<OverlayConfig>,
    /// Optimize collaborator endpoint and retry policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimize: Option<OptimizeConfig>,
    /// Prompt library location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,
}

impl Config {
    pub fn get_shortcut(&self) -> ShortcutConfig {
        self.shortcut.clone().unwrap_or_default()
    }

    pub fn get_overlay(&self) -> OverlayConfig {
        self.overlay.unwrap_or_default()
    }

    pub fn get_optimize(&self) -> OptimizeConfig {
        self.optimize.clone().unwrap_or_default()
    }

    pub fn get_storage(&self) -> StorageConfig {
        self.storage.clone().unwrap_or_default()
    }
}
