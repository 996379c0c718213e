use super::*;
use crate::store::JsonPromptStore;
use crate::surface::{MemoryElement, SyntheticEvent};
use std::time::Duration;

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    engine: ShortcutEngine,
    events: Receiver<ShortcutEvent>,
    store: Arc<JsonPromptStore>,
    now: Instant,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(Config::default())
    }

    fn with_config(config: Config) -> Self {
        let store = Arc::new(JsonPromptStore::with_records([
            PromptRecord::new("p1", "World Greeting", "World, hello!"),
            PromptRecord::new("p2", "Apology", "Sorry for the delay"),
            PromptRecord::new("p3", "Path", "see a/b/c"),
        ]));
        let mut engine = ShortcutEngine::new(&config, store.clone());
        let events = engine.subscribe();
        Self {
            engine,
            events,
            store,
            now: Instant::now(),
        }
    }

    /// Type far enough after the previous input that the throttle runs it at once
    fn type_text(&mut self, el: &mut MemoryElement, text: &str) {
        self.now += Duration::from_millis(500);
        el.type_text(text);
        self.engine.handle_input(&*el, false, self.now);
    }

    /// Type and let the store answer
    fn type_and_search(&mut self, el: &mut MemoryElement, text: &str) {
        self.type_text(el, text);
        self.engine.run_pending_searches(self.now);
    }

    fn advance(&mut self, ms: u64) {
        self.now += Duration::from_millis(ms);
    }

    fn drain(&self) -> Vec<ShortcutEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    fn use_count(&self, id: &str) -> u64 {
        self.store.get_by_id(id).unwrap().unwrap().use_count
    }
}

fn closes(events: &[ShortcutEvent]) -> Vec<CloseReason> {
    events
        .iter()
        .filter_map(|e| match e {
            ShortcutEvent::Closed { reason, .. } => Some(*reason),
            _ => None,
        })
        .collect()
}

fn result_ids(engine: &ShortcutEngine) -> Vec<String> {
    engine.view().results.into_iter().map(|r| r.id).collect()
}

// ============================================================================
// Opening and searching
// ============================================================================

#[test]
fn test_slash_opens_overlay_and_queues_search() {
    let mut h = Harness::new();
    let mut el = MemoryElement::textarea(1, "Hi ");
    h.type_text(&mut el, "/");

    assert!(h.engine.is_open());
    assert_eq!(h.engine.pending_searches().len(), 1);
    let events = h.drain();
    assert!(matches!(
        &events[..],
        [
            ShortcutEvent::Opened { trigger_offset: 3, position: Some(_), .. },
            ShortcutEvent::Loading { .. }
        ]
    ));
    assert_eq!(h.engine.registry().active_count(), 3);

    h.engine.run_pending_searches(h.now);
    // Empty term lists every active prompt
    assert_eq!(h.engine.view().results.len(), 3);
}

#[test]
fn test_term_narrows_results() {
    let mut h = Harness::new();
    let mut el = MemoryElement::textarea(1, "Hi ");
    h.type_and_search(&mut el, "/");
    h.type_and_search(&mut el, "wor");

    assert_eq!(h.engine.session().unwrap().search_term, "wor");
    assert_eq!(result_ids(&h.engine), vec!["p1"]);
}

#[test]
fn test_coalesced_input_runs_on_tick() {
    let mut h = Harness::new();
    let mut el = MemoryElement::textarea(1, "");
    h.type_text(&mut el, "/");

    // Inside the throttle window
    h.advance(50);
    el.type_text("wor");
    h.engine.handle_input(&el, false, h.now);
    assert_eq!(h.engine.session().unwrap().search_term, "");

    h.advance(200);
    h.engine.tick(Some(&el), h.now);
    assert_eq!(h.engine.session().unwrap().search_term, "wor");
}

#[test]
fn test_composition_waits_for_commit() {
    let mut h = Harness::new();
    let mut el = MemoryElement::textarea(1, "");
    h.advance(500);
    el.type_text("/");
    h.engine.handle_input(&el, true, h.now);
    assert!(!h.engine.is_open());

    h.engine.end_composition(&el, h.now);
    assert!(h.engine.is_open());
}

// ============================================================================
// Generation guard
// ============================================================================

#[test]
fn test_newer_search_wins_over_late_older_response() {
    let mut h = Harness::new();
    let mut el = MemoryElement::textarea(1, "");
    h.type_text(&mut el, "/a");
    h.type_text(&mut el, "p");

    let mut tickets = h.engine.take_pending_searches();
    assert_eq!(tickets.len(), 2);
    let newer = tickets.pop().unwrap();
    let older = tickets.pop().unwrap();
    assert_eq!((older.term.as_str(), newer.term.as_str()), ("a", "ap"));

    let apology = vec![PromptRecord::new("p2", "Apology", "Sorry for the delay")];
    let everything = h.store.get_all().unwrap();
    assert!(h.engine.resolve_search(newer, Ok(apology), h.now));
    assert!(!h.engine.resolve_search(older, Ok(everything), h.now));

    assert_eq!(result_ids(&h.engine), vec!["p2"]);
}

#[test]
fn test_response_after_close_is_discarded() {
    let mut h = Harness::new();
    let mut el = MemoryElement::textarea(1, "");
    h.type_text(&mut el, "/");
    let tickets = h.engine.take_pending_searches();
    h.engine.dismiss();

    for ticket in tickets {
        assert!(!h.engine.resolve_search(ticket, Ok(Vec::new()), h.now));
    }
    assert!(!h.engine.is_open());
}

#[test]
fn test_search_failure_shows_error() {
    let mut h = Harness::new();
    let mut el = MemoryElement::textarea(1, "");
    h.type_text(&mut el, "/x");
    let ticket = h.engine.take_pending_searches().remove(0);
    h.engine.resolve_search(
        ticket,
        Err(StoreError::Unavailable("offline".into())),
        h.now,
    );

    let view = h.engine.view();
    assert!(view.is_open);
    assert!(view.results.is_empty());
    assert!(view.error.unwrap().contains("offline"));
}

// ============================================================================
// Commit
// ============================================================================

#[test]
fn test_enter_commits_highlighted_prompt() {
    let mut h = Harness::new();
    let mut el = MemoryElement::textarea(1, "Hi ");
    h.type_and_search(&mut el, "/");
    h.type_and_search(&mut el, "wor");
    h.drain();

    let action = h.engine.handle_key(Key::Enter, &mut el);
    assert_eq!(action, KeyAction::Commit(0));
    assert!(action.consumes_event());

    assert_eq!(el.text(), "Hi World, hello!");
    assert_eq!(el.cursor(), Some(16));
    assert_eq!(el.events(), &[SyntheticEvent::Input]);
    assert_eq!(h.use_count("p1"), 1);
    assert!(!h.engine.is_open());
    assert_eq!(h.engine.registry().active_count(), 0);

    let events = h.drain();
    assert!(matches!(
        &events[0],
        ShortcutEvent::Committed { prompt_id, cursor: 16, .. } if prompt_id == "p1"
    ));
    assert_eq!(closes(&events), vec![CloseReason::Committed]);
}

#[test]
fn test_use_count_grows_once_per_commit() {
    let mut h = Harness::new();
    let mut el = MemoryElement::textarea(1, "");
    for round in 1..=3 {
        h.type_and_search(&mut el, " /");
        h.type_and_search(&mut el, "wor");
        assert!(h.engine.select_result(0, &mut el).is_some());
        assert_eq!(h.use_count("p1"), round);
    }
}

#[test]
fn test_enter_without_results_passes_through() {
    let mut h = Harness::new();
    let mut el = MemoryElement::textarea(1, "");
    h.type_and_search(&mut el, "/");
    h.type_and_search(&mut el, "zzz");

    let action = h.engine.handle_key(Key::Enter, &mut el);
    assert_eq!(action, KeyAction::Ignored);
    assert_eq!(el.text(), "/zzz");
    assert!(h.engine.is_open());
}

#[test]
fn test_slash_inside_inserted_prompt_does_not_arm() {
    let mut h = Harness::new();
    let mut el = MemoryElement::textarea(1, "");
    h.type_and_search(&mut el, "/");
    h.type_and_search(&mut el, "see");
    h.engine.select_result(0, &mut el).unwrap();
    assert_eq!(el.text(), "see a/b/c");

    // The page re-reads the field after the synthetic input event
    h.advance(500);
    h.engine.handle_input(&el, false, h.now);
    assert!(!h.engine.is_open());

    h.type_text(&mut el, " /");
    assert!(h.engine.is_open());
}

#[test]
fn test_slash_typed_before_inserted_prompt_arms() {
    let mut h = Harness::new();
    let mut el = MemoryElement::textarea(1, "Hi ");
    h.type_and_search(&mut el, "/wor");
    h.engine.select_result(0, &mut el).unwrap();
    assert_eq!(el.text(), "Hi World, hello!");

    el.set_cursor(0);
    h.type_text(&mut el, "/");
    assert_eq!(el.text(), "/Hi World, hello!");
    assert!(h.engine.is_open());
    assert_eq!(h.engine.session().unwrap().trigger_offset, 0);
}

#[test]
fn test_slash_in_emptied_field_arms_after_commit() {
    let mut h = Harness::new();
    let mut el = MemoryElement::textarea(1, "Hi ");
    h.type_and_search(&mut el, "/wor");
    h.engine.select_result(0, &mut el).unwrap();

    while !el.text().is_empty() {
        el.backspace();
    }
    h.advance(500);
    h.engine.handle_input(&el, false, h.now);

    h.type_text(&mut el, "/");
    assert!(h.engine.is_open());
}

#[test]
fn test_commit_after_slash_vanished_closes_without_editing() {
    let mut h = Harness::new();
    let mut el = MemoryElement::textarea(1, "ab ");
    h.type_and_search(&mut el, "/");
    h.type_and_search(&mut el, "wor");

    // Host script rewrote the value without an input event
    el.set_cursor(0);
    el.type_text("xx");
    let before = el.text();

    assert!(h.engine.select_result(0, &mut el).is_none());
    assert_eq!(el.text(), before);
    assert_eq!(h.use_count("p1"), 0);
    assert!(!h.engine.is_open());
    assert_eq!(closes(&h.drain()), vec![CloseReason::SlashDeleted]);
}

#[test]
fn test_out_of_range_selection_is_ignored() {
    let mut h = Harness::new();
    let mut el = MemoryElement::textarea(1, "");
    h.type_and_search(&mut el, "/wor");
    assert!(h.engine.select_result(5, &mut el).is_none());
    assert!(h.engine.is_open());
}

// ============================================================================
// Keys and closing
// ============================================================================

#[test]
fn test_arrow_navigation_emits_active_index() {
    let mut h = Harness::new();
    let mut el = MemoryElement::textarea(1, "");
    h.type_and_search(&mut el, "/");
    h.drain();

    assert_eq!(h.engine.handle_key(Key::ArrowDown, &mut el), KeyAction::Navigated(1));
    assert_eq!(h.engine.navigate(Direction::Down), Some(2));
    assert_eq!(h.engine.navigate(Direction::Down), Some(2));
    let events = h.drain();
    assert_eq!(
        events,
        vec![
            ShortcutEvent::ActiveIndex { index: 1 },
            ShortcutEvent::ActiveIndex { index: 2 },
            ShortcutEvent::ActiveIndex { index: 2 },
        ]
    );
}

#[test]
fn test_escape_closes_and_blocks_same_slash() {
    let mut h = Harness::new();
    let mut el = MemoryElement::textarea(1, "");
    h.type_and_search(&mut el, "/ab");

    let action = h.engine.handle_key(Key::Escape, &mut el);
    assert!(action.consumes_event());
    assert!(!h.engine.is_open());

    h.type_text(&mut el, "c");
    assert!(!h.engine.is_open(), "dismissed slash must not re-arm");

    h.type_text(&mut el, " /");
    assert!(h.engine.is_open());
}

#[test]
fn test_horizontal_arrow_closes_but_passes_through() {
    let mut h = Harness::new();
    let mut el = MemoryElement::textarea(1, "");
    h.type_and_search(&mut el, "/");
    let action = h.engine.handle_key(Key::ArrowLeft, &mut el);
    assert_eq!(action, KeyAction::Close(CloseReason::HorizontalArrow));
    assert!(!action.consumes_event());
    assert!(!h.engine.is_open());
}

#[test]
fn test_dismiss_twice_matches_dismiss_once() {
    let mut h = Harness::new();
    let mut el = MemoryElement::textarea(1, "");
    h.type_and_search(&mut el, "/");
    h.drain();

    h.engine.dismiss();
    let first = h.drain();
    h.engine.dismiss();
    let second = h.drain();

    assert_eq!(closes(&first), vec![CloseReason::Dismissed]);
    assert!(second.is_empty());
    assert_eq!(h.engine.registry().active_count(), 0);
    assert_eq!(h.engine.registry().stray_removals(), 0);
}

#[test]
fn test_click_outside_and_focus_change() {
    let mut h = Harness::new();
    let mut a = MemoryElement::textarea(1, "");
    h.type_and_search(&mut a, "/");
    h.engine.handle_click_outside();
    assert_eq!(closes(&h.drain()), vec![CloseReason::ClickOutside]);

    h.type_and_search(&mut a, " /");
    h.engine.handle_focus(ElementId(2));
    assert_eq!(closes(&h.drain()), vec![CloseReason::FocusChanged]);
}

#[test]
fn test_element_removal_releases_listeners() {
    let mut h = Harness::new();
    let mut el = MemoryElement::textarea(1, "");
    h.type_and_search(&mut el, "/");
    el.set_connected(false);
    h.engine.handle_element_removed(el.id());

    assert!(!h.engine.is_open());
    assert_eq!(h.engine.registry().active_count(), 0);
    assert_eq!(closes(&h.drain()), vec![CloseReason::ElementRemoved]);
}

// ============================================================================
// Closing heuristic
// ============================================================================

#[test]
fn test_long_cjk_term_closes_exactly_once_after_grace() {
    let mut h = Harness::new();
    let mut el = MemoryElement::textarea(1, "");
    h.type_and_search(&mut el, "/");
    let term: String = std::iter::repeat('测').take(31).collect();
    h.type_and_search(&mut el, &term);
    h.drain();

    let settled = h.now;
    h.engine.tick(Some(&el), settled + Duration::from_millis(999));
    assert!(h.engine.is_open());

    h.engine.tick(Some(&el), settled + Duration::from_millis(1000));
    h.engine.tick(Some(&el), settled + Duration::from_millis(3000));
    assert!(!h.engine.is_open());
    assert_eq!(closes(&h.drain()), vec![CloseReason::NoMatch]);
}

#[test]
fn test_short_cjk_term_stays_open() {
    let mut h = Harness::new();
    let mut el = MemoryElement::textarea(1, "");
    h.type_and_search(&mut el, "/");
    let term: String = std::iter::repeat('测').take(30).collect();
    h.type_and_search(&mut el, &term);

    h.engine.tick(Some(&el), h.now + Duration::from_secs(5));
    assert!(h.engine.is_open());
}

#[test]
fn test_new_input_during_grace_revalidates() {
    let mut h = Harness::new();
    let mut el = MemoryElement::textarea(1, "");
    h.type_and_search(&mut el, "/");
    let term: String = std::iter::repeat('测').take(31).collect();
    h.type_and_search(&mut el, &term);
    let deadline = h.engine.next_deadline().unwrap();

    // Deleting back under the threshold makes the session productive again
    h.now = deadline - Duration::from_millis(100);
    el.backspace();
    h.engine.handle_input(&el, false, h.now);
    h.engine.run_pending_searches(h.now);

    h.engine.tick(Some(&el), deadline + Duration::from_millis(10));
    assert!(h.engine.is_open());
}

// ============================================================================
// Storage modes
// ============================================================================

#[test]
fn test_offline_mode_searches_snapshot() {
    let mut config = Config::default();
    config.storage = Some(crate::config::StorageConfig {
        offline: true,
        ..Default::default()
    });
    let mut h = Harness::with_config(config);
    // Added after the snapshot was taken
    h.store
        .save(PromptRecord::new("p9", "Worksheet", "wordy"))
        .unwrap();

    let mut el = MemoryElement::textarea(1, "");
    h.type_and_search(&mut el, "/wor");
    assert_eq!(result_ids(&h.engine), vec!["p1"]);

    h.engine.refresh_snapshot().unwrap();
    h.type_and_search(&mut el, "d");
    assert_eq!(result_ids(&h.engine), vec!["p9"]);
}

#[test]
fn test_rich_text_commit_end_to_end() {
    let mut h = Harness::new();
    let mut el = MemoryElement::rich(4, &["Hi "]);
    el.set_cursor(3);
    h.type_and_search(&mut el, "/");
    h.type_and_search(&mut el, "wor");
    let result = h.engine.select_result(0, &mut el).unwrap();

    assert_eq!(el.text(), "Hi World, hello!");
    assert_eq!(result.cursor, 16);
    assert_eq!(el.cursor(), Some(16));
    assert!(el.events().contains(&SyntheticEvent::Input));
}
