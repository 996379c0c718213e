//! Default configuration values
//!
//! All constants used throughout the config module are defined here.

/// Trigger detection throttle window (ms)
pub const DEFAULT_THROTTLE_MS: u64 = 200;

/// Maximum distance between the "/" and the cursor (chars)
pub const DEFAULT_MAX_TRIGGER_DISTANCE: usize = 200;

/// Grace delay before an unproductive session closes (ms)
pub const DEFAULT_CLOSE_GRACE_MS: u64 = 1000;

/// Term length thresholds for the closing heuristic (chars)
pub const DEFAULT_CJK_CLOSE_THRESHOLD: usize = 30;
pub const DEFAULT_LATIN_CLOSE_THRESHOLD: usize = 60;

/// Results shown in the overlay
pub const DEFAULT_RESULT_LIMIT: usize = 10;

/// Overlay geometry (px)
pub const DEFAULT_OVERLAY_WIDTH: f64 = 320.0;
pub const DEFAULT_OVERLAY_MAX_HEIGHT: f64 = 300.0;
pub const DEFAULT_OVERLAY_MARGIN: f64 = 20.0;

/// OpenAI-compatible completion endpoint
pub const DEFAULT_OPTIMIZE_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPTIMIZE_MODEL: &str = "gpt-4o-mini";

/// Environment variable holding the completion API key
pub const API_KEY_ENV: &str = "SLASH_PROMPT_API_KEY";

/// Retry policy for transient optimize failures
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_RATE_LIMIT_MULTIPLIER: u32 = 3;

/// Inputs longer than this are truncated before optimizing (chars)
pub const DEFAULT_MAX_INPUT_CHARS: usize = 10_000;

/// Default prompt library location
pub const DEFAULT_STORE_PATH: &str = "~/.slashprompt/prompts.json";
