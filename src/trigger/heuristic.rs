//! Closing heuristic for unproductive sessions
//!
//! A session is unproductive when its term has grown past a length threshold
//! (shorter for ideograph input) and the newest settled search found nothing.
//! The close is scheduled after a grace delay and both conditions are checked
//! again when the delay expires.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::ShortcutConfig;
use crate::matching::contains_cjk;
use crate::search::SearchOutcome;
use crate::surface::char_len;

#[derive(Debug)]
pub struct ClosingHeuristic {
    cjk_threshold: usize,
    latin_threshold: usize,
    grace: Duration,
    deadline: Option<Instant>,
}

impl ClosingHeuristic {
    pub fn new(config: &ShortcutConfig) -> Self {
        Self {
            cjk_threshold: config.cjk_close_threshold,
            latin_threshold: config.latin_close_threshold,
            grace: config.close_grace(),
            deadline: None,
        }
    }

    fn threshold_for(&self, term: &str) -> usize {
        if contains_cjk(term) {
            self.cjk_threshold
        } else {
            self.latin_threshold
        }
    }

    /// Long term, settled empty result, and no genuine match
    ///
    /// A forced ideograph match does not count as genuine here: it keeps
    /// short terms alive but cannot save one past the threshold.
    pub fn is_unproductive(&self, term: &str, outcome: &SearchOutcome) -> bool {
        let term = term.trim();
        char_len(term) > self.threshold_for(term)
            && outcome.term.trim() == term
            && outcome.is_empty()
            && !outcome.confidence.is_genuine()
    }

    /// A search for `term` settled
    pub fn observe(&mut self, term: &str, outcome: &SearchOutcome, now: Instant) {
        if self.is_unproductive(term, outcome) {
            if self.deadline.is_none() {
                debug!(term_len = char_len(term), "Scheduling unproductive-session close");
                self.deadline = Some(now + self.grace);
            }
        } else {
            self.deadline = None;
        }
    }

    /// True exactly once, when the grace delay has expired and the session
    /// is still unproductive. `latest` must be `None` while a search is loading.
    pub fn poll(&mut self, now: Instant, term: &str, latest: Option<&SearchOutcome>) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                latest.is_some_and(|outcome| self.is_unproductive(term, outcome))
            }
            _ => false,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::{match_confidence, MatchConfidence};
    use crate::prompt::PromptRecord;

    fn outcome(term: &str, results: Vec<PromptRecord>) -> SearchOutcome {
        SearchOutcome {
            generation: 1,
            term: term.to_string(),
            confidence: match_confidence(term, &results),
            results,
            error: None,
        }
    }

    fn heuristic() -> ClosingHeuristic {
        ClosingHeuristic::new(&ShortcutConfig::default())
    }

    #[test]
    fn test_thresholds_by_script() {
        let h = heuristic();
        let latin_60 = "a".repeat(60);
        let latin_61 = "a".repeat(61);
        assert!(!h.is_unproductive(&latin_60, &outcome(&latin_60, vec![])));
        assert!(h.is_unproductive(&latin_61, &outcome(&latin_61, vec![])));

        let cjk_30 = "字".repeat(30);
        let cjk_31 = "字".repeat(31);
        assert!(!h.is_unproductive(&cjk_30, &outcome(&cjk_30, vec![])));
        // Forced match does not keep a 31-char term alive
        let forced = outcome(&cjk_31, vec![]);
        assert_eq!(forced.confidence, MatchConfidence::Forced);
        assert!(h.is_unproductive(&cjk_31, &forced));
    }

    #[test]
    fn test_results_keep_session_alive() {
        let h = heuristic();
        let term = "a".repeat(61);
        let with_results = outcome(&term, vec![PromptRecord::new("x", "x", "y")]);
        assert!(!h.is_unproductive(&term, &with_results));
    }

    #[test]
    fn test_close_fires_once_after_grace() {
        let mut h = heuristic();
        let t0 = Instant::now();
        let term = "字".repeat(31);
        let settled = outcome(&term, vec![]);

        h.observe(&term, &settled, t0);
        assert_eq!(h.deadline(), Some(t0 + Duration::from_secs(1)));
        assert!(!h.poll(t0 + Duration::from_millis(999), &term, Some(&settled)));
        assert!(h.poll(t0 + Duration::from_secs(1), &term, Some(&settled)));
        assert!(!h.poll(t0 + Duration::from_secs(2), &term, Some(&settled)));
    }

    #[test]
    fn test_revalidates_at_expiry() {
        let mut h = heuristic();
        let t0 = Instant::now();
        let term = "a".repeat(61);
        h.observe(&term, &outcome(&term, vec![]), t0);

        // User kept typing; the newer search is still loading
        let longer = format!("{}b", term);
        assert!(!h.poll(t0 + Duration::from_secs(1), &longer, None));
        assert_eq!(h.deadline(), None);
    }

    #[test]
    fn test_productive_outcome_cancels() {
        let mut h = heuristic();
        let t0 = Instant::now();
        let term = "a".repeat(61);
        h.observe(&term, &outcome(&term, vec![]), t0);
        h.observe("short", &outcome("short", vec![]), t0);
        assert_eq!(h.deadline(), None);
    }
}
