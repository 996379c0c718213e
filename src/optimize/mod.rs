//! Prompt optimization: the collaborator contract, its HTTP implementation,
//! title generation, and the branching version history.

mod prompts;
mod provider;
mod session;
mod title;

pub use provider::{
    post_process, truncate_input, ChatMessage, ChatOptimizer, ChatRequest, ChatTransport,
    RetryPolicy, UreqTransport,
};
pub use session::{
    display_content, OptimizationSession, OptimizationVersion, PendingOptimization,
    SessionError, VersionId, VersionStatus,
};
pub use title::{clean_title, display_units, fallback_title, smart_truncate, TITLE_UNIT_BUDGET};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::OptimizeError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizeMode {
    #[default]
    Standard,
    Creative,
    Concise,
}

impl OptimizeMode {
    pub fn temperature(self) -> f32 {
        match self {
            OptimizeMode::Creative => 0.8,
            OptimizeMode::Standard | OptimizeMode::Concise => 0.3,
        }
    }
}

/// The LLM-backed rewrite and title service
///
/// Calls block until the collaborator settles, retries included.
pub trait Optimizer: Send + Sync {
    fn optimize(&self, text: &str, mode: OptimizeMode) -> Result<String, OptimizeError>;

    /// Best effort; callers fall back to [`fallback_title`]
    fn title_for(&self, text: &str) -> Result<String, OptimizeError>;
}

/// Generated title, or the truncated-content fallback
pub fn title_or_fallback(titler: Option<&dyn Optimizer>, text: &str) -> String {
    match titler.map(|t| t.title_for(text)) {
        Some(Ok(title)) if !title.trim().is_empty() => title,
        Some(Err(e)) => {
            warn!(error = %e, "Title generation failed, using fallback");
            fallback_title(text)
        }
        _ => fallback_title(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedTitle(Result<String, OptimizeError>);

    impl Optimizer for FixedTitle {
        fn optimize(&self, text: &str, _mode: OptimizeMode) -> Result<String, OptimizeError> {
            Ok(text.to_string())
        }

        fn title_for(&self, _text: &str) -> Result<String, OptimizeError> {
            self.0.clone()
        }
    }

    #[test]
    fn test_title_or_fallback() {
        let content = "Summarize the following meeting notes into action items";
        let ok = FixedTitle(Ok("Meeting actions".into()));
        assert_eq!(title_or_fallback(Some(&ok), content), "Meeting actions");

        let failing = FixedTitle(Err(OptimizeError::RateLimit));
        assert_eq!(
            title_or_fallback(Some(&failing), content),
            "Summarize the following meetin..."
        );

        let blank = FixedTitle(Ok("  ".into()));
        assert_eq!(title_or_fallback(Some(&blank), "short"), "short");
        assert_eq!(title_or_fallback(None, "short"), "short");
    }

    #[test]
    fn test_mode_serde_and_temperature() {
        assert_eq!(
            serde_json::to_string(&OptimizeMode::Creative).unwrap(),
            "\"creative\""
        );
        assert_eq!(OptimizeMode::Creative.temperature(), 0.8);
        assert_eq!(OptimizeMode::Concise.temperature(), 0.3);
    }
}
