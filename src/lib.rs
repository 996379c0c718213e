//! Slash Prompt - "/" shortcuts for saved prompts in any text field
//!
//! Typing "/" in an editable element opens an overlay of matching prompts
//! from the library; choosing one replaces the "/" sequence with the prompt
//! text. The crate also carries the prompt optimizer with its branching
//! version history.

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod matching;
pub mod messaging;
pub mod optimize;
pub mod overlay;
pub mod prompt;
pub mod ranking;
pub mod search;
pub mod simulator;
pub mod store;
pub mod surface;
pub mod trigger;

pub use engine::{ShortcutEngine, ShortcutEvent};
pub use error::{Result, SlashPromptError};
