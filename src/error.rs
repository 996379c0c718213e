use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

/// Error severity for inline display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,     // informational, never surfaced
    Warning,  // recoverable
    Error,    // operation failed
    Critical, // requires user action
}

/// Failures reported by the storage collaborator
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Prompt not found: {0}")]
    NotFound(String),

    #[error("Invalid prompt: {0}")]
    Validation(String),

    #[error("Storage I/O failed for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode prompt data: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Classified failures of the optimize collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum OptimizeError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed (HTTP {status})")]
    Auth { status: u16 },

    #[error("Rate limited")]
    RateLimit,

    #[error("Server error (HTTP {status})")]
    Server { status: u16 },

    #[error("Invalid request: {0}")]
    Validation(String),
}

impl OptimizeError {
    /// Classify an HTTP status code returned by the completion endpoint
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => Self::Auth { status },
            429 => Self::RateLimit,
            500..=599 => Self::Server { status },
            _ => Self::Validation(format!("HTTP {}: {}", status, body.trim())),
        }
    }

    /// Transient classes that are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Server { .. } | Self::RateLimit
        )
    }

    /// Message embedded verbatim in an error-status optimization version
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => {
                "Network connection failed. Check your connection and try again.".to_string()
            }
            Self::Auth { .. } => "The API key is invalid or has expired.".to_string(),
            Self::RateLimit => "Too many requests. Please wait a moment and retry.".to_string(),
            Self::Server { status } => {
                format!("The optimization service is unavailable (HTTP {}).", status)
            }
            Self::Validation(msg) => format!("The request was rejected: {}", msg),
        }
    }
}

/// Failures of the request/response bridge
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Bridge channel closed")]
    Disconnected,

    #[error("Remote request failed: {0}")]
    Remote(String),

    #[error("Malformed reply: {0}")]
    Malformed(String),
}

/// Top-level error for the slash-prompt engine
#[derive(Error, Debug)]
pub enum SlashPromptError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Optimize(#[from] OptimizeError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("Failed to parse message: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SlashPromptError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Store(StoreError::NotFound(_)) => ErrorSeverity::Info,
            Self::Store(StoreError::Validation(_)) => ErrorSeverity::Warning,
            Self::Store(_) => ErrorSeverity::Error,
            Self::Optimize(OptimizeError::Auth { .. }) => ErrorSeverity::Critical,
            Self::Optimize(_) => ErrorSeverity::Error,
            Self::Bridge(_) => ErrorSeverity::Error,
            Self::Parse(_) => ErrorSeverity::Warning,
            Self::Config(_) => ErrorSeverity::Warning,
        }
    }

    /// Log at the level matching `severity()` and return the user message
    #[track_caller]
    pub fn report(&self) -> String {
        let caller = std::panic::Location::caller();
        let (file, line) = (caller.file(), caller.line());
        match self.severity() {
            ErrorSeverity::Info => debug!(error = %self, file, line, "Operation declined"),
            ErrorSeverity::Warning => warn!(error = %self, file, line, "Operation rejected"),
            ErrorSeverity::Error | ErrorSeverity::Critical => error!(
                error = %self,
                severity = ?self.severity(),
                file,
                line,
                "Operation failed"
            ),
        }
        self.user_message()
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::Store(StoreError::NotFound(id)) => format!("Prompt {} no longer exists", id),
            Self::Store(StoreError::Validation(msg)) => msg.clone(),
            Self::Store(_) => "Could not access saved prompts".to_string(),
            Self::Optimize(e) => e.user_message(),
            Self::Bridge(_) => "Lost connection to the background service".to_string(),
            Self::Parse(e) => format!("Invalid message format: {}", e),
            Self::Config(msg) => format!("Configuration issue: {}", msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, SlashPromptError>;

/// Extension trait for silent error logging with caller location tracking.
/// Use when the operation is recoverable and the user doesn't need to know.
///
/// # Examples
///
/// ```ignore
/// use slash_prompt::error::ResultExt;
///
/// // Log and continue if the use count could not be bumped
/// store.increment_use(&id).log_err();
///
/// // Log as warning for expected failures
/// let cached = read_snapshot().warn_on_err();
/// ```
pub trait ResultExt<T> {
    /// Log error with caller location and return None. Use for recoverable failures.
    fn log_err(self) -> Option<T>;
    /// Log as warning with caller location and return None. Use for expected failures.
    fn warn_on_err(self) -> Option<T>;
}

impl<T, E: std::fmt::Debug> ResultExt<T> for std::result::Result<T, E> {
    #[track_caller]
    fn log_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                error!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation failed"
                );
                None
            }
        }
    }

    #[track_caller]
    fn warn_on_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                warn!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation had warning"
                );
                None
            }
        }
    }
}
