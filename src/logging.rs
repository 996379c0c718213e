//! Structured JSONL logging plus human-readable stderr output.
//!
//! This module provides dual-output logging:
//! - **JSONL to file** (~/.slashprompt/logs/slash-prompt.jsonl) - structured, one event per line
//! - **Compact to stderr** - for developers running the simulator
//!
//! # Usage
//!
//! ```rust,ignore
//! use slash_prompt::logging;
//!
//! // Initialize logging - MUST keep guard alive for duration of program
//! let _guard = logging::init();
//!
//! // Use tracing macros directly
//! tracing::info!(event_type = "trigger", offset = 6, "Trigger armed");
//! ```
//!
//! # JSONL Output Format
//!
//! ```json
//! {"timestamp":"2026-01-04T10:30:45.123Z","level":"INFO","target":"slash_prompt::engine","fields":{"message":"Prompt committed","prompt_id":"p1","cursor":16}}
//! ```

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_FILE_NAME: &str = "slash-prompt.jsonl";

/// Guard that must be kept alive for the duration of the program.
/// Dropping this guard will flush and close the log file.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Initialize logging into the default directory.
///
/// Returns a guard that MUST be kept alive for the duration of the program.
pub fn init() -> LoggingGuard {
    init_in(&get_log_dir())
}

/// Initialize logging with the JSONL file placed in `log_dir`.
pub fn init_in(log_dir: &Path) -> LoggingGuard {
    if let Err(e) = fs::create_dir_all(log_dir) {
        eprintln!("[LOGGING] Failed to create log directory: {}", e);
    }

    let log_path = log_dir.join(LOG_FILE_NAME);

    // Falls back to a sink so a read-only home never blocks startup
    let writer: Box<dyn Write + Send> =
        match OpenOptions::new().create(true).append(true).open(&log_path) {
            Ok(file) => Box::new(file),
            Err(e) => {
                eprintln!("[LOGGING] Failed to open log file: {}", e);
                Box::new(std::io::sink())
            }
        };

    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(writer);

    // Default to info, allow override via RUST_LOG
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,ureq=warn"));

    let json_layer = fmt::layer()
        .json()
        .with_writer(non_blocking_file)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE);

    // stdout carries simulator events, so human logs go to stderr
    let compact_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .compact();

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(compact_layer)
        .try_init();

    if installed.is_ok() {
        tracing::info!(
            event_type = "app_lifecycle",
            action = "started",
            log_path = %log_path.display(),
            "Logging initialized"
        );
    }

    LoggingGuard {
        _file_guard: file_guard,
    }
}

/// Get the log directory path (~/.slashprompt/logs/)
fn get_log_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".slashprompt").join("logs"))
        .unwrap_or_else(|| std::env::temp_dir().join("slash-prompt-logs"))
}

/// Get the path to the JSONL log file
pub fn log_path() -> PathBuf {
    get_log_dir().join(LOG_FILE_NAME)
}
