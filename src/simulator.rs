//! Headless page simulator driven by JSONL commands
//!
//! Stands in for a browser page so the engine can be exercised from a shell
//! or a test script. Elements live in memory; time is virtual and only moves
//! on `tick`, so two `type` commands without a tick between them land in the
//! same throttle window.
//!
//! # Protocol
//!
//! Commands are JSON objects, one per line:
//!
//! ```json
//! {"type": "create", "element": 1, "kind": "textarea", "text": "Hi "}
//! {"type": "focus", "element": 1}
//! {"type": "type", "element": 1, "text": "/wor"}
//! {"type": "tick", "ms": 250}
//! {"type": "key", "element": 1, "key": "Enter"}
//! {"type": "optimize", "text": "write a poem", "mode": "creative"}
//! ```
//!
//! Each command produces zero or more [`SimOutput`] lines: engine events,
//! element snapshots, optimization versions, or an error.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_channel::Receiver;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::{ShortcutEngine, ShortcutEvent};
use crate::error::ResultExt;
use crate::optimize::{OptimizationSession, OptimizationVersion, OptimizeMode, Optimizer, VersionId};
use crate::overlay::{Direction, Key, Viewport};
use crate::prompt::{PromptDraft, PromptRecord};
use crate::store::{create_prompt, PromptStore};
use crate::surface::{ElementId, HostElement, MemoryElement};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementKind {
    #[default]
    Textarea,
    Input,
    /// contenteditable
    Rich,
}

/// Commands accepted on stdin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SimCommand {
    Create {
        element: u64,
        #[serde(default)]
        kind: ElementKind,
        #[serde(default)]
        text: String,
    },
    Focus {
        element: u64,
    },
    /// Type at the caret; `composing` marks IME input still in progress
    Type {
        element: u64,
        text: String,
        #[serde(default)]
        composing: bool,
    },
    CompositionEnd {
        element: u64,
    },
    Backspace {
        element: u64,
    },
    /// Move the caret without typing
    Caret {
        element: u64,
        offset: usize,
    },
    Key {
        element: u64,
        key: String,
    },
    Click,
    Tick {
        #[serde(default)]
        ms: u64,
    },
    Remove {
        element: u64,
    },
    Select {
        element: u64,
        index: usize,
    },
    Navigate {
        direction: Direction,
    },
    Dismiss,
    Viewport {
        width: f64,
        height: f64,
        #[serde(default, rename = "scrollX")]
        scroll_x: f64,
        #[serde(default, rename = "scrollY")]
        scroll_y: f64,
    },
    Show {
        element: u64,
    },
    AddPrompt {
        #[serde(default)]
        title: String,
        content: String,
        #[serde(default)]
        tags: Vec<String>,
    },
    ListPrompts,
    Optimize {
        text: String,
        #[serde(default)]
        mode: OptimizeMode,
    },
    Continue {
        version: VersionId,
        #[serde(default)]
        mode: OptimizeMode,
    },
    Edit {
        version: VersionId,
        content: String,
    },
    Versions,
}

/// Lines written to stdout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SimOutput {
    Event {
        event: ShortcutEvent,
    },
    Element {
        element: ElementId,
        text: String,
        #[serde(default)]
        cursor: Option<usize>,
        #[serde(default)]
        focused: bool,
    },
    Prompts {
        prompts: Vec<PromptRecord>,
    },
    Versions {
        versions: Vec<OptimizationVersion>,
        #[serde(default, rename = "lastError")]
        last_error: Option<String>,
    },
    Error {
        message: String,
    },
}

impl SimOutput {
    fn error(message: impl Into<String>) -> Self {
        SimOutput::Error {
            message: message.into(),
        }
    }
}

pub struct Simulator {
    engine: ShortcutEngine,
    events: Receiver<ShortcutEvent>,
    store: Arc<dyn PromptStore>,
    optimizer: Option<Arc<dyn Optimizer>>,
    versions: OptimizationSession,
    elements: BTreeMap<u64, MemoryElement>,
    focused: Option<u64>,
    now: Instant,
}

impl Simulator {
    pub fn new(mut engine: ShortcutEngine, optimizer: Option<Arc<dyn Optimizer>>) -> Self {
        let events = engine.subscribe();
        let store = engine.store().clone();
        Self {
            engine,
            events,
            store,
            optimizer,
            versions: OptimizationSession::new(),
            elements: BTreeMap::new(),
            focused: None,
            now: Instant::now(),
        }
    }

    pub fn engine(&self) -> &ShortcutEngine {
        &self.engine
    }

    pub fn element(&self, id: u64) -> Option<&MemoryElement> {
        self.elements.get(&id)
    }

    /// Run one command and collect what it produced
    pub fn apply(&mut self, command: SimCommand) -> Vec<SimOutput> {
        debug!(?command, "Simulator command");
        let mut out = match self.dispatch(command) {
            Ok(out) => out,
            Err(message) => {
                warn!(%message, "Simulator command failed");
                vec![SimOutput::error(message)]
            }
        };
        // Searches settle before the next command, like a fast local store
        self.engine.run_pending_searches(self.now);

        let mut events: Vec<SimOutput> = std::iter::from_fn(|| self.events.try_recv().ok())
            .map(|event| SimOutput::Event { event })
            .collect();
        events.append(&mut out);
        events
    }

    fn dispatch(&mut self, command: SimCommand) -> Result<Vec<SimOutput>, String> {
        match command {
            SimCommand::Create {
                element,
                kind,
                text,
            } => {
                let el = match kind {
                    ElementKind::Textarea => MemoryElement::textarea(element, &text),
                    ElementKind::Input => MemoryElement::input(element, Some("text"), &text),
                    ElementKind::Rich => MemoryElement::rich(element, &[text.as_str()]),
                };
                self.elements.insert(element, el);
                info!(element, ?kind, "Element created");
                Ok(vec![self.show(element)?])
            }
            SimCommand::Focus { element } => {
                element_ref(&self.elements, element)?;
                self.focused = Some(element);
                self.engine.handle_focus(ElementId(element));
                Ok(Vec::new())
            }
            SimCommand::Type {
                element,
                text,
                composing,
            } => {
                self.focus_implicitly(element)?;
                let el = element_mut(&mut self.elements, element)?;
                el.type_text(&text);
                self.engine.handle_input(&*el, composing, self.now);
                Ok(vec![self.show(element)?])
            }
            SimCommand::CompositionEnd { element } => {
                let el = element_ref(&self.elements, element)?;
                self.engine.end_composition(el, self.now);
                Ok(Vec::new())
            }
            SimCommand::Backspace { element } => {
                self.focus_implicitly(element)?;
                let el = element_mut(&mut self.elements, element)?;
                el.backspace();
                self.engine.handle_input(&*el, false, self.now);
                Ok(vec![self.show(element)?])
            }
            SimCommand::Caret { element, offset } => {
                let el = element_mut(&mut self.elements, element)?;
                el.set_cursor(offset);
                // A caret move reaches the detector through selectionchange
                self.engine.handle_input(&*el, false, self.now);
                Ok(vec![self.show(element)?])
            }
            SimCommand::Key { element, key } => {
                let key = Key::parse(&key);
                let el = element_mut(&mut self.elements, element)?;
                let action = self.engine.handle_key(key, el);
                if !action.consumes_event() {
                    self.default_key_action(element, key)?;
                }
                Ok(vec![self.show(element)?])
            }
            SimCommand::Click => {
                self.engine.handle_click_outside();
                Ok(Vec::new())
            }
            SimCommand::Tick { ms } => {
                self.now += Duration::from_millis(ms);
                let now = self.now;
                let focused = self.focused.and_then(|id| self.elements.get(&id));
                self.engine
                    .tick(focused.map(|el| el as &dyn HostElement), now);
                Ok(Vec::new())
            }
            SimCommand::Remove { element } => {
                let mut el = self
                    .elements
                    .remove(&element)
                    .ok_or_else(|| format!("Unknown element {}", element))?;
                el.set_connected(false);
                if self.focused == Some(element) {
                    self.focused = None;
                }
                self.engine.handle_element_removed(ElementId(element));
                Ok(Vec::new())
            }
            SimCommand::Select { element, index } => {
                let el = element_mut(&mut self.elements, element)?;
                if self.engine.select_result(index, el).is_none() {
                    return Err(format!("Nothing committed for index {}", index));
                }
                Ok(vec![self.show(element)?])
            }
            SimCommand::Navigate { direction } => {
                self.engine.navigate(direction);
                Ok(Vec::new())
            }
            SimCommand::Dismiss => {
                self.engine.dismiss();
                Ok(Vec::new())
            }
            SimCommand::Viewport {
                width,
                height,
                scroll_x,
                scroll_y,
            } => {
                self.engine.set_viewport(Viewport {
                    width,
                    height,
                    scroll_x,
                    scroll_y,
                });
                Ok(Vec::new())
            }
            SimCommand::Show { element } => Ok(vec![self.show(element)?]),
            SimCommand::AddPrompt {
                title,
                content,
                tags,
            } => {
                let draft = PromptDraft {
                    title,
                    content,
                    tags: tags.into_iter().collect(),
                    ..PromptDraft::default()
                };
                create_prompt(self.store.as_ref(), self.optimizer.as_deref(), draft)
                    .map_err(|e| e.report())?;
                // The prompt is saved; a stale offline snapshot only hides it from search
                self.engine.refresh_snapshot().warn_on_err();
                self.list_prompts()
            }
            SimCommand::ListPrompts => self.list_prompts(),
            SimCommand::Optimize { text, mode } => {
                let optimizer = self.require_optimizer()?;
                self.versions
                    .start(optimizer.as_ref(), &text, mode)
                    .map_err(|e| e.to_string())?;
                Ok(vec![self.versions_output()])
            }
            SimCommand::Continue { version, mode } => {
                let optimizer = self.require_optimizer()?;
                self.versions
                    .continue_from(optimizer.as_ref(), version, mode)
                    .map_err(|e| e.to_string())?;
                Ok(vec![self.versions_output()])
            }
            SimCommand::Edit { version, content } => {
                self.versions
                    .edit(version, &content)
                    .map_err(|e| e.to_string())?;
                Ok(vec![self.versions_output()])
            }
            SimCommand::Versions => Ok(vec![self.versions_output()]),
        }
    }

    /// Typing into an element focuses it first
    fn focus_implicitly(&mut self, element: u64) -> Result<(), String> {
        element_ref(&self.elements, element)?;
        if self.focused != Some(element) {
            self.focused = Some(element);
            self.engine.handle_focus(ElementId(element));
        }
        Ok(())
    }

    /// What the page does with a key the overlay let through
    fn default_key_action(&mut self, element: u64, key: Key) -> Result<(), String> {
        let el = element_mut(&mut self.elements, element)?;
        let Some(cursor) = el.cursor() else {
            return Ok(());
        };
        match key {
            Key::ArrowLeft => el.set_cursor(cursor.saturating_sub(1)),
            Key::ArrowRight => el.set_cursor(cursor + 1),
            Key::Enter => el.type_text("\n"),
            _ => return Ok(()),
        }
        self.engine.handle_input(&*el, false, self.now);
        Ok(())
    }

    fn show(&self, element: u64) -> Result<SimOutput, String> {
        let el = element_ref(&self.elements, element)?;
        Ok(SimOutput::Element {
            element: el.id(),
            text: el.text(),
            cursor: el.cursor(),
            focused: self.focused == Some(element),
        })
    }

    fn list_prompts(&self) -> Result<Vec<SimOutput>, String> {
        let prompts = self.store.get_all().map_err(|e| e.to_string())?;
        Ok(vec![SimOutput::Prompts { prompts }])
    }

    fn require_optimizer(&self) -> Result<Arc<dyn Optimizer>, String> {
        self.optimizer
            .clone()
            .ok_or_else(|| "No optimizer configured (set SLASH_PROMPT_API_KEY)".to_string())
    }

    fn versions_output(&self) -> SimOutput {
        SimOutput::Versions {
            versions: self.versions.list().to_vec(),
            last_error: self.versions.last_error().map(str::to_string),
        }
    }
}

fn element_ref(elements: &BTreeMap<u64, MemoryElement>, id: u64) -> Result<&MemoryElement, String> {
    elements
        .get(&id)
        .ok_or_else(|| format!("Unknown element {}", id))
}

fn element_mut(
    elements: &mut BTreeMap<u64, MemoryElement>,
    id: u64,
) -> Result<&mut MemoryElement, String> {
    elements
        .get_mut(&id)
        .ok_or_else(|| format!("Unknown element {}", id))
}

/// Read commands from stdin on a background thread
///
/// Malformed lines are logged and skipped.
pub fn start_stdin_listener() -> Receiver<SimCommand> {
    use std::io::BufRead;

    let (tx, rx) = async_channel::bounded(100);

    std::thread::spawn(move || {
        info!("Simulator command listener started");
        let stdin = std::io::stdin();
        let reader = stdin.lock();

        for line in reader.lines() {
            match line {
                Ok(line) if !line.trim().is_empty() => {
                    match serde_json::from_str::<SimCommand>(&line) {
                        Ok(cmd) => {
                            if tx.send_blocking(cmd).is_err() {
                                debug!("Command channel closed, exiting");
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, line = %line, "Failed to parse command");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Error reading stdin");
                    break;
                }
            }
        }
        info!("Simulator command listener exiting");
    });

    rx
}

// ============================================================================
// Tests
// ============================================================================
