//! Search coordination for the active trigger session
//!
//! Searches are issued as tickets carrying a generation number. Only the
//! newest ticket may change the visible results: a response for an older
//! generation is dropped when it arrives, since the underlying transport has
//! no way to abort a request already in flight.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::matching::{match_confidence, MatchConfidence};
use crate::prompt::{PromptFilter, PromptRecord};
use crate::store::{apply_filter, PromptStore, StorageMode};

/// A search request that has been issued but not yet resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    pub generation: u64,
    /// Raw term from the trigger session
    pub term: String,
    pub filter: PromptFilter,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    /// The store rejected the search; results are empty
    Failed,
}

/// The settled result of the newest search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub generation: u64,
    pub term: String,
    pub results: Vec<PromptRecord>,
    pub confidence: MatchConfidence,
    /// Set when the store failed; shown as "search failed" rather than "no results"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchOutcome {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug)]
pub struct SearchCoordinator {
    limit: usize,
    mode: StorageMode,
    generation: u64,
    status: SearchStatus,
    latest: Option<SearchOutcome>,
    /// Local copy of the library used while offline
    snapshot: Vec<PromptRecord>,
}

impl SearchCoordinator {
    pub fn new(limit: usize, mode: StorageMode) -> Self {
        Self {
            limit,
            mode,
            generation: 0,
            status: SearchStatus::Idle,
            latest: None,
            snapshot: Vec::new(),
        }
    }

    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: StorageMode) {
        self.mode = mode;
    }

    pub fn status(&self) -> SearchStatus {
        self.status
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Newest settled outcome, if it belongs to the current generation
    pub fn latest(&self) -> Option<&SearchOutcome> {
        self.latest
            .as_ref()
            .filter(|o| o.generation == self.generation)
    }

    /// Replace the offline snapshot
    pub fn set_snapshot(&mut self, records: Vec<PromptRecord>) {
        debug!(count = records.len(), "Search snapshot replaced");
        self.snapshot = records;
    }

    /// Refresh the offline snapshot from the store
    pub fn refresh_snapshot(&mut self, store: &dyn PromptStore) -> Result<(), StoreError> {
        let records = store.get_all()?;
        self.set_snapshot(records);
        Ok(())
    }

    /// Issue a new search, superseding any in flight
    pub fn begin(&mut self, term: &str) -> SearchTicket {
        self.generation += 1;
        self.status = SearchStatus::Loading;
        debug!(generation = self.generation, term, "Search issued");
        SearchTicket {
            generation: self.generation,
            term: term.to_string(),
            filter: PromptFilter::for_term(term, self.limit),
        }
    }

    pub fn is_current(&self, ticket: &SearchTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Run a ticket against the store or the offline snapshot
    pub fn execute(
        &self,
        store: &dyn PromptStore,
        ticket: &SearchTicket,
        now_ms: i64,
    ) -> Result<Vec<PromptRecord>, StoreError> {
        match self.mode {
            StorageMode::Connected => store.search(&ticket.filter),
            StorageMode::Offline => Ok(apply_filter(
                self.snapshot.iter().cloned(),
                &ticket.filter,
                now_ms,
            )),
        }
    }

    /// Apply a response; `None` when the ticket has been superseded
    pub fn resolve(
        &mut self,
        ticket: SearchTicket,
        result: Result<Vec<PromptRecord>, StoreError>,
    ) -> Option<&SearchOutcome> {
        if !self.is_current(&ticket) {
            debug!(
                stale = ticket.generation,
                current = self.generation,
                "Discarding stale search response"
            );
            return None;
        }

        let (results, error) = match result {
            Ok(results) => (results, None),
            Err(e) => {
                // Counts as zero results for the closing heuristic
                warn!(term = %ticket.term, error = %e, "Search failed");
                (Vec::new(), Some(e.to_string()))
            }
        };

        self.status = if error.is_some() {
            SearchStatus::Failed
        } else {
            SearchStatus::Ready
        };
        let confidence = match_confidence(&ticket.term, &results);
        self.latest = Some(SearchOutcome {
            generation: ticket.generation,
            term: ticket.term,
            results,
            confidence,
            error,
        });
        self.latest.as_ref()
    }

    /// Issue, run, and resolve in one step
    pub fn search(&mut self, store: &dyn PromptStore, term: &str, now_ms: i64) -> Option<&SearchOutcome> {
        let ticket = self.begin(term);
        let result = self.execute(store, &ticket, now_ms);
        self.resolve(ticket, result)
    }

    /// Drop everything tied to the closed session; late responses become stale
    pub fn reset(&mut self) {
        self.generation += 1;
        self.status = SearchStatus::Idle;
        self.latest = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonPromptStore;

    fn records() -> Vec<PromptRecord> {
        vec![
            PromptRecord::new("p1", "World Greeting", "World, hello!"),
            PromptRecord::new("p2", "Apology", "Sorry for the delay"),
        ]
    }

    #[test]
    fn test_newer_search_wins_over_late_older_response() {
        let mut coordinator = SearchCoordinator::new(10, StorageMode::Connected);
        let first = coordinator.begin("a");
        let second = coordinator.begin("ab");

        let ab_results = vec![PromptRecord::new("ab", "ab", "ab")];
        assert!(coordinator.resolve(second, Ok(ab_results.clone())).is_some());
        // The older response lands afterwards and must be ignored
        assert!(coordinator
            .resolve(first, Ok(vec![PromptRecord::new("a", "a", "a")]))
            .is_none());

        let latest = coordinator.latest().unwrap();
        assert_eq!(latest.term, "ab");
        assert_eq!(latest.results, ab_results);
    }

    #[test]
    fn test_failure_counts_as_empty() {
        let mut coordinator = SearchCoordinator::new(10, StorageMode::Connected);
        let ticket = coordinator.begin("wor");
        let outcome = coordinator
            .resolve(ticket, Err(StoreError::Unavailable("down".into())))
            .unwrap();
        assert!(outcome.is_empty());
        assert!(outcome.failed());
        assert_eq!(outcome.confidence, MatchConfidence::NoMatch);
        assert_eq!(coordinator.status(), SearchStatus::Failed);
    }

    #[test]
    fn test_connected_search_uses_store() {
        let store = JsonPromptStore::with_records(records());
        let mut coordinator = SearchCoordinator::new(10, StorageMode::Connected);
        let outcome = coordinator.search(&store, "wor", 0).unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].id, "p1");
        assert!(outcome.confidence.is_genuine());
    }

    #[test]
    fn test_offline_search_uses_snapshot() {
        let store = JsonPromptStore::in_memory();
        let mut coordinator = SearchCoordinator::new(10, StorageMode::Offline);
        coordinator.set_snapshot(records());
        let outcome = coordinator.search(&store, "SORRY", 0).unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].id, "p2");
    }

    #[test]
    fn test_empty_term_lists_recommendations() {
        let store = JsonPromptStore::with_records(records());
        let mut coordinator = SearchCoordinator::new(1, StorageMode::Connected);
        let outcome = coordinator.search(&store, "", 0).unwrap();
        assert_eq!(outcome.results.len(), 1);
    }

    #[test]
    fn test_reset_makes_in_flight_stale() {
        let mut coordinator = SearchCoordinator::new(10, StorageMode::Connected);
        let ticket = coordinator.begin("x");
        coordinator.reset();
        assert!(coordinator.resolve(ticket, Ok(vec![])).is_none());
        assert!(coordinator.latest().is_none());
        assert_eq!(coordinator.status(), SearchStatus::Idle);
    }
}
