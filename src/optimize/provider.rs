//! OpenAI-compatible chat completion client
//!
//! [`ChatOptimizer`] builds the request, retries transient failures, and
//! cleans up the model's reply. The HTTP call itself sits behind
//! [`ChatTransport`] so tests can script responses.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::OptimizeConfig;
use crate::error::OptimizeError;
use crate::surface::char_len;

use super::prompts::{
    optimize_message, system_prompt, title_message, TITLE_INPUT_CHARS, TITLE_SYSTEM_PROMPT,
};
use super::title::clean_title;
use super::{OptimizeMode, Optimizer};

const MAX_TOKENS: u32 = 1000;
const TITLE_TEMPERATURE: f32 = 0.3;
const TRUNCATION_MARKER: &str = "...(truncated)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Body of a `/chat/completions` request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// One attempt at a completion; returns the assistant message text
pub trait ChatTransport: Send + Sync {
    fn complete(&self, request: &ChatRequest) -> Result<String, OptimizeError>;
}

/// Blocking HTTP transport
#[derive(Debug, Clone)]
pub struct UreqTransport {
    url: String,
    api_key: Option<String>,
}

impl UreqTransport {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            url: url.into(),
            api_key,
        }
    }
}

impl ChatTransport for UreqTransport {
    fn complete(&self, request: &ChatRequest) -> Result<String, OptimizeError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(OptimizeError::Auth { status: 401 });
        };

        debug!(
            model = %request.model,
            message_count = request.messages.len(),
            "Sending completion request"
        );

        let response = ureq::post(self.url.as_str())
            .header("Content-Type", "application/json")
            .header("Authorization", &format!("Bearer {}", api_key))
            .send_json(request)
            .map_err(|e| match e {
                ureq::Error::StatusCode(status) => OptimizeError::from_status(status, ""),
                other => OptimizeError::Network(other.to_string()),
            })?;

        let body: serde_json::Value = response
            .into_body()
            .read_json()
            .map_err(|e| OptimizeError::Validation(format!("unreadable response: {}", e)))?;

        // {"choices": [{"message": {"content": "..."}}]}
        body.get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| OptimizeError::Validation("response has no message content".into()))
    }
}

/// How failed attempts are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Multiplier applied to `base_delay` after a rate limit
    pub rate_limit_multiplier: u32,
}

impl RetryPolicy {
    pub fn from_config(config: &OptimizeConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_delay_ms),
            rate_limit_multiplier: config.rate_limit_multiplier,
        }
    }

    /// Wait before retrying after `error`; `None` when it is not retryable
    pub fn delay_for(&self, error: &OptimizeError) -> Option<Duration> {
        match error {
            OptimizeError::RateLimit => Some(self.base_delay * self.rate_limit_multiplier),
            e if e.is_retryable() => Some(self.base_delay),
            _ => None,
        }
    }
}

fn lead_in_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*(?:here is the optimized prompt|optimized prompt|optimization result|以下是优化后的提示词|优化后的提示词|优化结果|以下是[^:：\n]*优化[^:：\n]*)\s*[:：]",
        )
        .ok()
    })
    .as_ref()
}

fn blank_lines_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").ok()).as_ref()
}

/// Strip lead-in phrases and collapse runs of blank lines
pub fn post_process(content: &str) -> String {
    let mut out = content.trim().to_string();
    if let Some(re) = lead_in_re() {
        out = re.replace(&out, "").trim().to_string();
    }
    if let Some(re) = blank_lines_re() {
        out = re.replace_all(&out, "\n\n").to_string();
    }
    out.trim().to_string()
}

/// Keep at most `max_chars` chars, marking the cut
pub fn truncate_input(text: &str, max_chars: usize) -> String {
    if char_len(text) <= max_chars {
        return text.to_string();
    }
    let mut head: String = text.chars().take(max_chars).collect();
    head.push_str(TRUNCATION_MARKER);
    head
}

pub struct ChatOptimizer<T: ChatTransport> {
    transport: T,
    model: String,
    retry: RetryPolicy,
    max_input_chars: usize,
}

impl ChatOptimizer<UreqTransport> {
    /// Client for the configured endpoint, keyed from the environment
    pub fn from_config(config: &OptimizeConfig) -> Self {
        let transport = UreqTransport::new(config.completions_url(), config.api_key());
        Self::new(transport, config)
    }
}

impl<T: ChatTransport> ChatOptimizer<T> {
    pub fn new(transport: T, config: &OptimizeConfig) -> Self {
        Self {
            transport,
            model: config.model.clone(),
            retry: RetryPolicy::from_config(config),
            max_input_chars: config.max_input_chars,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn request(&self, system: String, user: String, temperature: f32) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature,
            max_tokens: MAX_TOKENS,
        }
    }

    /// Run `request`, retrying transient failures per the policy
    fn send_with_retry(&self, request: &ChatRequest) -> Result<String, OptimizeError> {
        let mut attempt = 0;
        loop {
            match self.transport.complete(request) {
                Ok(content) => return Ok(content),
                Err(error) => {
                    let delay = self.retry.delay_for(&error);
                    match delay {
                        Some(delay) if attempt < self.retry.max_retries => {
                            attempt += 1;
                            warn!(
                                error = %error,
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                "Completion failed, retrying"
                            );
                            std::thread::sleep(delay);
                        }
                        _ => return Err(error),
                    }
                }
            }
        }
    }
}

impl<T: ChatTransport> Optimizer for ChatOptimizer<T> {
    #[instrument(skip_all, fields(mode = ?mode, input_len = text.len()))]
    fn optimize(&self, text: &str, mode: OptimizeMode) -> Result<String, OptimizeError> {
        if text.trim().is_empty() {
            return Err(OptimizeError::Validation(
                "prompt content cannot be empty".into(),
            ));
        }
        let input = truncate_input(text, self.max_input_chars);
        let request = self.request(
            system_prompt(mode),
            optimize_message(&input),
            mode.temperature(),
        );
        let raw = self.send_with_retry(&request)?;
        let optimized = post_process(&raw);
        if optimized.is_empty() {
            return Err(OptimizeError::Validation("empty completion".into()));
        }
        info!(output_len = optimized.len(), "Prompt optimized");
        Ok(optimized)
    }

    #[instrument(skip_all, fields(input_len = text.len()))]
    fn title_for(&self, text: &str) -> Result<String, OptimizeError> {
        if text.trim().is_empty() {
            return Err(OptimizeError::Validation("content cannot be empty".into()));
        }
        let input = truncate_input(text, TITLE_INPUT_CHARS);
        let request = self.request(
            TITLE_SYSTEM_PROMPT.to_string(),
            title_message(&input),
            TITLE_TEMPERATURE,
        );
        let title = clean_title(&self.send_with_retry(&request)?);
        if title.is_empty() {
            return Err(OptimizeError::Validation("empty title".into()));
        }
        debug!(title = %title, "Title generated");
        Ok(title)
    }
}
