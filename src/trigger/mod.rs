//! Trigger detection: the "/" state machine, its throttle, and the
//! closing heuristic for sessions that stopped being productive.

mod detector;
mod heuristic;
mod session;
mod throttle;

pub use detector::{TriggerDetector, TriggerTransition};
pub use heuristic::ClosingHeuristic;
pub use session::{CloseReason, DismissMemory, InputSnapshot, TriggerSession};
pub use throttle::Throttle;
