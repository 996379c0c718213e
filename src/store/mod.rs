//! Prompt storage contract
//!
//! The engine only needs a handful of operations from whatever keeps the
//! prompt library. [`JsonPromptStore`] is the bundled implementation; the
//! messaging layer provides a remote one.

mod json;

pub use json::JsonPromptStore;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::{SlashPromptError, StoreError};
use crate::matching::record_matches_term;
use crate::optimize::{title_or_fallback, Optimizer};
use crate::prompt::{
    now_millis, PromptDraft, PromptFilter, PromptPatch, PromptRecord, MAX_PROMPT_LENGTH,
    MAX_TITLE_LENGTH,
};
use crate::ranking::sort_records;
use crate::surface::char_len;

/// Operations the engine consumes from the storage collaborator
pub trait PromptStore: Send + Sync {
    /// Active records, in stored order
    fn get_all(&self) -> Result<Vec<PromptRecord>, StoreError>;

    fn get_by_id(&self, id: &str) -> Result<Option<PromptRecord>, StoreError>;

    /// Insert or replace by id
    fn save(&self, record: PromptRecord) -> Result<(), StoreError>;

    fn update(&self, id: &str, patch: PromptPatch) -> Result<(), StoreError>;

    /// Mark inactive without purging
    fn soft_delete(&self, id: &str) -> Result<(), StoreError>;

    /// Bump `use_count` by one and stamp `last_used_at`
    fn increment_use(&self, id: &str) -> Result<(), StoreError>;

    fn search(&self, filter: &PromptFilter) -> Result<Vec<PromptRecord>, StoreError>;
}

/// Whether searches go to the store or to a cached snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageMode {
    #[default]
    Connected,
    Offline,
}

/// Reject records the library must never hold
pub fn validate(record: &PromptRecord) -> Result<(), StoreError> {
    if record.id.trim().is_empty() {
        return Err(StoreError::Validation("Prompt id cannot be empty".into()));
    }
    if record.content.trim().is_empty() {
        return Err(StoreError::Validation("Prompt content cannot be empty".into()));
    }
    if char_len(&record.content) > MAX_PROMPT_LENGTH {
        return Err(StoreError::Validation(format!(
            "Prompt content exceeds {} characters",
            MAX_PROMPT_LENGTH
        )));
    }
    if char_len(&record.title) > MAX_TITLE_LENGTH {
        return Err(StoreError::Validation(format!(
            "Prompt title exceeds {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(())
}

/// Filter, order, and page a set of records
///
/// Shared by the file store and the offline snapshot search so both agree on
/// what a filter means.
pub fn apply_filter(
    records: impl IntoIterator<Item = PromptRecord>,
    filter: &PromptFilter,
    now_ms: i64,
) -> Vec<PromptRecord> {
    let term = filter.term();
    let mut matched: Vec<PromptRecord> = records
        .into_iter()
        .filter(|r| r.is_active)
        .filter(|r| !filter.only_favorites || r.is_favorite)
        .filter(|r| {
            filter.tags.is_empty()
                || filter
                    .tags
                    .iter()
                    .any(|tag| r.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
        })
        .filter(|r| term.map_or(true, |t| record_matches_term(r, t)))
        .collect();

    sort_records(&mut matched, filter.sort_by, now_ms);

    let limit = filter.limit.unwrap_or(usize::MAX);
    matched.into_iter().skip(filter.offset).take(limit).collect()
}

/// Create and save a new prompt from user-supplied fields
///
/// An empty title is generated from the content, falling back to a
/// truncated prefix when no titler is available or it fails.
#[instrument(skip_all)]
pub fn create_prompt(
    store: &dyn PromptStore,
    titler: Option<&dyn Optimizer>,
    draft: PromptDraft,
) -> Result<PromptRecord, SlashPromptError> {
    let content = draft.content.trim().to_string();
    let mut title = draft.title.trim().to_string();
    if title.is_empty() {
        title = title_or_fallback(titler, &content);
    }

    let mut record = PromptRecord::new(uuid::Uuid::new_v4().to_string(), title, content);
    record.tags = draft
        .tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    record.category = draft.category;
    record.source = draft.source;
    record.updated_at = now_millis();

    validate(&record)?;
    store.save(record.clone())?;
    info!(prompt_id = %record.id, title = %record.title, "Prompt created");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::SortBy;

    fn record(id: &str, title: &str, content: &str) -> PromptRecord {
        PromptRecord::new(id, title, content)
    }

    #[test]
    fn test_validate_rejects_empty_and_oversized() {
        assert!(validate(&record("a", "t", "  ")).is_err());
        assert!(validate(&record("a", "t", &"x".repeat(MAX_PROMPT_LENGTH + 1))).is_err());
        assert!(validate(&record("a", &"t".repeat(MAX_TITLE_LENGTH + 1), "c")).is_err());
        assert!(validate(&record("a", &"标".repeat(MAX_TITLE_LENGTH), "c")).is_ok());
    }

    #[test]
    fn test_apply_filter_excludes_inactive_and_pages() {
        let mut deleted = record("d", "hello", "x");
        deleted.is_active = false;
        let records = vec![
            record("a", "hello a", "x"),
            deleted,
            record("b", "hello b", "x"),
            record("c", "other", "x"),
        ];
        let filter = PromptFilter {
            term: Some("hello".into()),
            sort_by: SortBy::Usage,
            offset: 1,
            limit: Some(5),
            ..PromptFilter::default()
        };
        let ids: Vec<_> = apply_filter(records, &filter, 0)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn test_apply_filter_favorites_and_tags() {
        let records = vec![
            record("a", "x", "x").favorite(true).with_tags(["Work"]),
            record("b", "x", "x").with_tags(["work"]),
            record("c", "x", "x").favorite(true),
        ];
        let filter = PromptFilter {
            only_favorites: true,
            tags: vec!["WORK".into()],
            ..PromptFilter::default()
        };
        let out = apply_filter(records, &filter, 0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "a");
    }

    #[test]
    fn test_create_prompt_falls_back_to_truncated_title() {
        let store = JsonPromptStore::in_memory();
        let draft = PromptDraft {
            content: "  Summarize the following meeting notes into action items  ".into(),
            tags: ["  notes ".to_string(), " ".to_string()].into_iter().collect(),
            ..PromptDraft::default()
        };
        let created = create_prompt(&store, None, draft).unwrap();
        assert!(!created.title.is_empty());
        assert!(created.title.ends_with("..."));
        assert_eq!(created.content, "Summarize the following meeting notes into action items");
        assert_eq!(created.tags.iter().collect::<Vec<_>>(), vec!["notes"]);
        assert!(uuid::Uuid::parse_str(&created.id).is_ok());
        assert_eq!(store.get_by_id(&created.id).unwrap(), Some(created));
    }

    #[test]
    fn test_create_prompt_rejects_empty_content() {
        let store = JsonPromptStore::in_memory();
        let err = create_prompt(
            &store,
            None,
            PromptDraft {
                title: "t".into(),
                ..PromptDraft::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, SlashPromptError::Store(StoreError::Validation(_))));
    }
}
