use super::*;
use parking_lot::Mutex;

/// Echoes the input with a suffix, or fails when told to
struct EchoOptimizer {
    fail_with: Mutex<Option<OptimizeError>>,
}

impl EchoOptimizer {
    fn new() -> Self {
        Self {
            fail_with: Mutex::new(None),
        }
    }

    fn failing(error: OptimizeError) -> Self {
        Self {
            fail_with: Mutex::new(Some(error)),
        }
    }
}

impl Optimizer for EchoOptimizer {
    fn optimize(&self, text: &str, mode: OptimizeMode) -> Result<String, OptimizeError> {
        match self.fail_with.lock().clone() {
            Some(e) => Err(e),
            None => Ok(format!("{} [{:?}]", text, mode)),
        }
    }

    fn title_for(&self, text: &str) -> Result<String, OptimizeError> {
        Ok(text.to_string())
    }
}

fn ids(session: &OptimizationSession) -> Vec<VersionId> {
    session.list().iter().map(|v| v.id).collect()
}

#[test]
fn test_start_inserts_placeholder_then_settles() {
    let mut session = OptimizationSession::new();
    let pending = session.begin_start("draft", OptimizeMode::Standard).unwrap();
    assert_eq!(pending.version_id, 1);
    assert!(session.is_optimizing());
    assert_eq!(session.list()[0].status, VersionStatus::Loading);
    assert_eq!(session.list()[0].content, "");

    assert!(session.settle(&pending, Ok("better".into())));
    let v = session.get(1).unwrap();
    assert_eq!(v.status, VersionStatus::Ready);
    assert_eq!(v.content, "better");
    assert_eq!(v.parent_id, None);
    assert!(!session.is_optimizing());
}

#[test]
fn test_start_clears_previous_history() {
    let opt = EchoOptimizer::new();
    let mut session = OptimizationSession::new();
    session.start(&opt, "one", OptimizeMode::Standard).unwrap();
    session.continue_from(&opt, 1, OptimizeMode::Standard).unwrap();
    assert_eq!(session.list().len(), 2);

    session.start(&opt, "two", OptimizeMode::Concise).unwrap();
    assert_eq!(ids(&session), vec![1]);
    assert_eq!(session.get(1).unwrap().content, "two [Concise]");
}

#[test]
fn test_empty_start_is_rejected() {
    let mut session = OptimizationSession::new();
    assert_eq!(
        session.begin_start("  ", OptimizeMode::Standard),
        Err(SessionError::EmptyInput)
    );
    assert!(session.list().is_empty());
}

#[test]
fn test_continue_twice_creates_siblings() {
    let opt = EchoOptimizer::new();
    let mut session = OptimizationSession::new();
    session.start(&opt, "root", OptimizeMode::Standard).unwrap();

    let first = session.continue_from(&opt, 1, OptimizeMode::Standard).unwrap();
    let second = session.continue_from(&opt, 1, OptimizeMode::Creative).unwrap();
    assert_eq!((first, second), (2, 3));
    assert_eq!(session.get(2).unwrap().parent_id, Some(1));
    assert_eq!(session.get(3).unwrap().parent_id, Some(1));
    // Newest continuation sits right after its source
    assert_eq!(ids(&session), vec![1, 3, 2]);
}

#[test]
fn test_continue_uses_max_id_plus_one() {
    let opt = EchoOptimizer::new();
    let mut session = OptimizationSession::new();
    session.start(&opt, "root", OptimizeMode::Standard).unwrap();
    session.continue_from(&opt, 1, OptimizeMode::Standard).unwrap();
    session.continue_from(&opt, 2, OptimizeMode::Standard).unwrap();
    // Continuing from a non-leaf still takes max + 1
    let id = session.continue_from(&opt, 1, OptimizeMode::Standard).unwrap();
    assert_eq!(id, 4);
    assert_eq!(session.lineage(3), vec![1, 2, 3]);
    assert_eq!(session.lineage(4), vec![1, 4]);
    assert!(session.lineage(99).is_empty());
}

#[test]
fn test_continue_reads_edited_content() {
    let opt = EchoOptimizer::new();
    let mut session = OptimizationSession::new();
    session.start(&opt, "root", OptimizeMode::Standard).unwrap();
    session.edit(1, "hand tuned").unwrap();

    let v = session.get(1).unwrap();
    assert_eq!(v.content, "root [Standard]");
    assert!(v.is_edited);
    assert_eq!(display_content(v), "hand tuned");

    let id = session.continue_from(&opt, 1, OptimizeMode::Standard).unwrap();
    assert_eq!(session.display_content(id), Some("hand tuned [Standard]"));
}

#[test]
fn test_interleaved_continuations_settle_by_id() {
    let opt = EchoOptimizer::new();
    let mut session = OptimizationSession::new();
    session.start(&opt, "root", OptimizeMode::Standard).unwrap();

    let a = session.begin_continue(1, OptimizeMode::Standard).unwrap();
    let b = session.begin_continue(1, OptimizeMode::Standard).unwrap();
    // b was inserted ahead of a; a's original index is now stale
    assert_eq!(ids(&session), vec![1, 3, 2]);

    assert!(session.settle(&a, Ok("from a".into())));
    assert!(session.settle(&b, Ok("from b".into())));
    assert_eq!(session.get(2).unwrap().content, "from a");
    assert_eq!(session.get(3).unwrap().content, "from b");
    // Settling twice does nothing
    assert!(!session.settle(&a, Ok("again".into())));
    assert_eq!(session.get(2).unwrap().content, "from a");
}

#[test]
fn test_result_after_restart_is_discarded() {
    let opt = EchoOptimizer::new();
    let mut session = OptimizationSession::new();
    session.start(&opt, "root", OptimizeMode::Standard).unwrap();
    let late = session.begin_continue(1, OptimizeMode::Standard).unwrap();

    let fresh = session.begin_start("new root", OptimizeMode::Standard).unwrap();
    assert!(!session.settle(&late, Ok("late".into())));
    assert!(session.settle(&fresh, Ok("fresh".into())));
    assert_eq!(ids(&session), vec![1]);
    assert_eq!(session.get(1).unwrap().content, "fresh");
}

#[test]
fn test_failure_becomes_error_version() {
    let ok = EchoOptimizer::new();
    let failing = EchoOptimizer::failing(OptimizeError::Auth { status: 401 });
    let mut session = OptimizationSession::new();
    session.start(&ok, "root", OptimizeMode::Standard).unwrap();

    let id = session
        .continue_from(&failing, 1, OptimizeMode::Standard)
        .unwrap();
    let v = session.get(id).unwrap();
    assert_eq!(v.status, VersionStatus::Error);
    assert_eq!(v.parent_id, Some(1));
    let message = OptimizeError::Auth { status: 401 }.user_message();
    assert_eq!(v.content, message);
    assert_eq!(session.last_error(), Some(message.as_str()));
}

#[test]
fn test_edit_rules() {
    let mut session = OptimizationSession::new();
    let pending = session.begin_start("root", OptimizeMode::Standard).unwrap();
    assert_eq!(session.edit(1, "x"), Err(SessionError::StillLoading(1)));
    assert_eq!(
        session.begin_continue(1, OptimizeMode::Standard),
        Err(SessionError::StillLoading(1))
    );
    session.settle(&pending, Ok("done".into()));
    assert_eq!(session.edit(7, "x"), Err(SessionError::UnknownVersion(7)));
    assert!(session.edit(1, "x").is_ok());
}
