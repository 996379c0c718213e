//! Relevance ranking for prompt records
//!
//! Blends how often a prompt is used with how recently it was used:
//!
//! ```text
//! score = 0.7 * (use_count / max_use_count_in_set)
//!       + 0.3 * clamp(1 - (now - last_used_at) / 14 days, 0, 1)
//!       + 0.1
//! ```
//!
//! Favorites always sort ahead of non-favorites; the score orders items
//! inside each tier. The usage term is normalized per query, so a set where
//! nothing has been used contributes 0 from usage. The constant 0.1 keeps
//! never-used items off the floor for cold starts.

use std::cmp::Ordering;

use crate::prompt::{PromptRecord, SortBy};

/// Weight of the normalized use count
pub const USAGE_WEIGHT: f64 = 0.7;

/// Weight of the recency term
pub const RECENCY_WEIGHT: f64 = 0.3;

/// Cold-start constant added to every score
pub const INITIAL_SCORE: f64 = 0.1;

/// Recency window in milliseconds (14 days)
pub const FOURTEEN_DAYS_MS: i64 = 14 * 24 * 60 * 60 * 1000;

/// Recency factor in `[0, 1]`: 1 when used right now, 0 at or beyond 14 days
fn recency_factor(last_used_at: i64, now_ms: i64) -> f64 {
    let elapsed = now_ms.saturating_sub(last_used_at) as f64;
    (1.0 - elapsed / FOURTEEN_DAYS_MS as f64).clamp(0.0, 1.0)
}

/// Compute the relevance score of one record against the set maximum
pub fn relevance_score(record: &PromptRecord, max_use_count: u64, now_ms: i64) -> f64 {
    let usage = if max_use_count > 0 {
        record.use_count as f64 / max_use_count as f64
    } else {
        0.0
    };
    USAGE_WEIGHT * usage + RECENCY_WEIGHT * recency_factor(record.last_used_at, now_ms) + INITIAL_SCORE
}

/// Sort records by favorite tier, then descending relevance score
///
/// The sort is stable: records with equal tier and score keep their
/// incoming order.
pub fn rank_by_relevance(records: &mut [PromptRecord], now_ms: i64) {
    let max_use_count = records.iter().map(|r| r.use_count).max().unwrap_or(0);

    let mut scored: Vec<(f64, PromptRecord)> = records
        .iter()
        .map(|r| (relevance_score(r, max_use_count, now_ms), r.clone()))
        .collect();

    scored.sort_by(|a, b| {
        // Primary: favorites first
        match b.1.is_favorite.cmp(&a.1.is_favorite) {
            Ordering::Equal => {}
            ord => return ord,
        }
        // Secondary: score descending
        b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal)
    });

    for (slot, (_, record)) in records.iter_mut().zip(scored) {
        *slot = record;
    }
}

/// Apply one of the supported orderings in place
pub fn sort_records(records: &mut [PromptRecord], sort_by: SortBy, now_ms: i64) {
    match sort_by {
        SortBy::Relevance => rank_by_relevance(records, now_ms),
        SortBy::Usage => records.sort_by(|a, b| b.use_count.cmp(&a.use_count)),
        SortBy::Favorite => records.sort_by(|a, b| b.is_favorite.cmp(&a.is_favorite)),
        SortBy::Time => records.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;
    const DAY_MS: i64 = 24 * 60 * 60 * 1000;

    fn record(id: &str, use_count: u64, last_used_at: i64) -> PromptRecord {
        PromptRecord::new(id, id, id).with_usage(use_count, last_used_at)
    }

    #[test]
    fn test_score_used_right_now_at_max_usage() {
        let r = record("a", 10, NOW);
        let score = relevance_score(&r, 10, NOW);
        assert!((score - 1.1).abs() < 1e-9, "got {}", score);
    }

    #[test]
    fn test_score_zero_use_set_is_recency_plus_constant() {
        let r = record("a", 0, NOW - 7 * DAY_MS);
        let score = relevance_score(&r, 0, NOW);
        // Half the window elapsed -> recency 0.5
        assert!((score - (0.3 * 0.5 + 0.1)).abs() < 1e-9, "got {}", score);
    }

    #[test]
    fn test_score_never_used_old_item_keeps_cold_start_constant() {
        let r = record("a", 0, 0);
        let score = relevance_score(&r, 5, NOW);
        assert!((score - INITIAL_SCORE).abs() < 1e-9);
    }

    #[test]
    fn test_recency_clamps_future_timestamps() {
        // Clock skew: last use "in the future" must not exceed 1
        assert_eq!(recency_factor(NOW + DAY_MS, NOW), 1.0);
        assert_eq!(recency_factor(NOW - 30 * DAY_MS, NOW), 0.0);
    }

    #[test]
    fn test_favorites_always_before_higher_scores() {
        let mut records = vec![
            record("busy", 50, NOW),
            record("fav", 0, 0).favorite(true),
            record("mid", 10, NOW - DAY_MS),
        ];
        rank_by_relevance(&mut records, NOW);
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["fav", "busy", "mid"]);
    }

    #[test]
    fn test_equal_scores_keep_incoming_order() {
        let mut records = vec![record("first", 0, 0), record("second", 0, 0)];
        rank_by_relevance(&mut records, NOW);
        assert_eq!(records[0].id, "first");
        assert_eq!(records[1].id, "second");
    }

    #[test]
    fn test_sort_by_time_and_usage() {
        let mut records = vec![record("old", 9, NOW - DAY_MS), record("new", 1, NOW)];
        sort_records(&mut records, SortBy::Time, NOW);
        assert_eq!(records[0].id, "new");
        sort_records(&mut records, SortBy::Usage, NOW);
        assert_eq!(records[0].id, "old");
    }
}
