//! JSON file-backed prompt library

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::StoreError;
use crate::prompt::{now_millis, PromptFilter, PromptPatch, PromptRecord};

use super::{apply_filter, validate, PromptStore};

/// On-disk document (owned, for deserialization)
#[derive(Debug, Default, Serialize, Deserialize)]
struct LibraryData {
    #[serde(default)]
    prompts: BTreeMap<String, PromptRecord>,
}

/// On-disk document (borrowed, for serialization without cloning)
#[derive(Serialize)]
struct LibraryDataRef<'a> {
    prompts: &'a BTreeMap<String, PromptRecord>,
}

#[derive(Debug, Default)]
struct State {
    prompts: BTreeMap<String, PromptRecord>,
    /// Incremented on every mutation
    revision: u64,
}

/// Prompt library kept in memory and, optionally, mirrored to a JSON file
///
/// Every mutation is written through with an atomic temp-file + rename.
#[derive(Debug)]
pub struct JsonPromptStore {
    state: Mutex<State>,
    file_path: Option<PathBuf>,
}

impl JsonPromptStore {
    /// A store that never touches the disk
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(State::default()),
            file_path: None,
        }
    }

    /// Open (or start) the library at `path`
    #[instrument(name = "prompt_store_open")]
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let store = Self {
            state: Mutex::new(State::default()),
            file_path: Some(path.to_path_buf()),
        };

        if !path.exists() {
            info!(path = %path.display(), "Prompt library not found, starting empty");
            return Ok(store);
        }

        let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let data: LibraryData = serde_json::from_str(&content)?;
        info!(
            path = %path.display(),
            prompt_count = data.prompts.len(),
            "Loaded prompt library"
        );
        store.state.lock().prompts = data.prompts;
        Ok(store)
    }

    /// Seed records without validation or persistence (tests, simulator)
    pub fn with_records(records: impl IntoIterator<Item = PromptRecord>) -> Self {
        let store = Self::in_memory();
        {
            let mut state = store.state.lock();
            for record in records {
                state.prompts.insert(record.id.clone(), record);
            }
        }
        store
    }

    pub fn revision(&self) -> u64 {
        self.state.lock().revision
    }

    pub fn path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Apply a mutation, write it through, then publish it
    ///
    /// The change runs on a copy; memory only moves once the file has it.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, PromptRecord>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut state = self.state.lock();
        let mut next = state.prompts.clone();
        let value = f(&mut next)?;
        self.persist(&next)?;
        state.prompts = next;
        state.revision = state.revision.wrapping_add(1);
        Ok(value)
    }

    fn persist(&self, prompts: &BTreeMap<String, PromptRecord>) -> Result<(), StoreError> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };
        let io_err = |source| StoreError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(&LibraryDataRef { prompts })?;

        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, &json).map_err(io_err)?;
        std::fs::rename(&temp_path, path).map_err(io_err)?;

        debug!(
            path = %path.display(),
            prompt_count = prompts.len(),
            bytes = json.len(),
            "Saved prompt library (atomic)"
        );
        Ok(())
    }
}

impl PromptStore for JsonPromptStore {
    fn get_all(&self) -> Result<Vec<PromptRecord>, StoreError> {
        Ok(self
            .state
            .lock()
            .prompts
            .values()
            .filter(|r| r.is_active)
            .cloned()
            .collect())
    }

    fn get_by_id(&self, id: &str) -> Result<Option<PromptRecord>, StoreError> {
        Ok(self
            .state
            .lock()
            .prompts
            .get(id)
            .filter(|r| r.is_active)
            .cloned())
    }

    fn save(&self, mut record: PromptRecord) -> Result<(), StoreError> {
        validate(&record)?;
        self.mutate(|prompts| {
            if let Some(existing) = prompts.get(&record.id) {
                // Usage only ever grows
                record.use_count = record.use_count.max(existing.use_count);
                record.last_used_at = record.last_used_at.max(existing.last_used_at);
                record.created_at = existing.created_at;
            }
            record.updated_at = now_millis();
            prompts.insert(record.id.clone(), record);
            Ok(())
        })
    }

    fn update(&self, id: &str, patch: PromptPatch) -> Result<(), StoreError> {
        self.mutate(|prompts| {
            let record = prompts
                .get_mut(id)
                .filter(|r| r.is_active)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            let mut updated = record.clone();
            patch.apply_to(&mut updated);
            validate(&updated)?;
            updated.updated_at = now_millis();
            *record = updated;
            Ok(())
        })
    }

    fn soft_delete(&self, id: &str) -> Result<(), StoreError> {
        self.mutate(|prompts| {
            let record = prompts
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            record.is_active = false;
            record.updated_at = now_millis();
            Ok(())
        })
    }

    fn increment_use(&self, id: &str) -> Result<(), StoreError> {
        self.mutate(|prompts| {
            let record = prompts
                .get_mut(id)
                .filter(|r| r.is_active)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            record.use_count = record.use_count.saturating_add(1);
            record.last_used_at = now_millis();
            Ok(())
        })
        .inspect_err(|e| warn!(prompt_id = id, error = %e, "increment_use failed"))
    }

    fn search(&self, filter: &PromptFilter) -> Result<Vec<PromptRecord>, StoreError> {
        let records: Vec<PromptRecord> = self.state.lock().prompts.values().cloned().collect();
        Ok(apply_filter(records, filter, now_millis()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::SortBy;

    fn record(id: &str, title: &str) -> PromptRecord {
        PromptRecord::new(id, title, format!("{} body", title))
    }

    #[test]
    fn test_save_and_get() {
        let store = JsonPromptStore::in_memory();
        store.save(record("a", "Alpha")).unwrap();
        assert_eq!(store.get_by_id("a").unwrap().unwrap().title, "Alpha");
        assert_eq!(store.get_all().unwrap().len(), 1);
        assert_eq!(store.get_by_id("missing").unwrap(), None);
    }

    #[test]
    fn test_failed_write_leaves_memory_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        let store = JsonPromptStore::open(&sub.join("prompts.json")).unwrap();
        store.save(record("a", "Alpha")).unwrap();
        let revision = store.revision();

        // A plain file where the directory was makes every write fail
        std::fs::remove_dir_all(&sub).unwrap();
        std::fs::write(&sub, "not a directory").unwrap();

        assert!(matches!(
            store.save(record("b", "Beta")),
            Err(StoreError::Io { .. })
        ));
        assert!(store.increment_use("a").is_err());
        assert!(store.soft_delete("a").is_err());

        assert_eq!(store.get_by_id("b").unwrap(), None);
        let a = store.get_by_id("a").unwrap().unwrap();
        assert_eq!(a.use_count, 0);
        assert_eq!(store.get_all().unwrap().len(), 1);
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn test_increment_use_is_monotonic() {
        let store = JsonPromptStore::in_memory();
        store.save(record("a", "Alpha")).unwrap();
        for _ in 0..3 {
            store.increment_use("a").unwrap();
        }
        let after = store.get_by_id("a").unwrap().unwrap();
        assert_eq!(after.use_count, 3);
        assert!(after.last_used_at > 0);

        // Saving a stale copy never lowers the count
        store.save(record("a", "Alpha v2")).unwrap();
        let after = store.get_by_id("a").unwrap().unwrap();
        assert_eq!(after.use_count, 3);
        assert_eq!(after.title, "Alpha v2");
    }

    #[test]
    fn test_update_patches_fields() {
        let store = JsonPromptStore::in_memory();
        store.save(record("a", "Alpha")).unwrap();
        store
            .update(
                "a",
                PromptPatch {
                    is_favorite: Some(true),
                    ..PromptPatch::default()
                },
            )
            .unwrap();
        assert!(store.get_by_id("a").unwrap().unwrap().is_favorite);
        assert!(matches!(
            store.update("zzz", PromptPatch::default()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_update_rejects_invalid_patch() {
        let store = JsonPromptStore::in_memory();
        store.save(record("a", "Alpha")).unwrap();
        let result = store.update(
            "a",
            PromptPatch {
                content: Some(String::new()),
                ..PromptPatch::default()
            },
        );
        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert_eq!(store.get_by_id("a").unwrap().unwrap().content, "Alpha body");
    }

    #[test]
    fn test_soft_delete_hides_record() {
        let store = JsonPromptStore::in_memory();
        store.save(record("a", "Alpha")).unwrap();
        store.soft_delete("a").unwrap();
        assert_eq!(store.get_by_id("a").unwrap(), None);
        assert!(store.get_all().unwrap().is_empty());
        assert!(store.search(&PromptFilter::default()).unwrap().is_empty());
        assert!(store.increment_use("a").is_err());
    }

    #[test]
    fn test_search_ranks_and_limits() {
        let store = JsonPromptStore::with_records([
            record("a", "World notes").with_usage(1, 0),
            record("b", "World greeting").with_usage(9, 0),
            record("c", "Unrelated").with_usage(50, 0),
        ]);
        let results = store.search(&PromptFilter::for_term("world", 10)).unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        let filter = PromptFilter {
            sort_by: SortBy::Usage,
            limit: Some(1),
            ..PromptFilter::default()
        };
        assert_eq!(store.search(&filter).unwrap()[0].id, "c");
    }

    #[test]
    fn test_revision_increments_on_mutation() {
        let store = JsonPromptStore::in_memory();
        let initial = store.revision();
        store.save(record("a", "Alpha")).unwrap();
        assert!(store.revision() > initial);
    }

    #[test]
    fn test_persists_across_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prompts.json");

        let store = JsonPromptStore::open(&path).unwrap();
        store.save(record("a", "Alpha")).unwrap();
        store.increment_use("a").unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let reopened = JsonPromptStore::open(&path).unwrap();
        let loaded = reopened.get_by_id("a").unwrap().unwrap();
        assert_eq!(loaded.use_count, 1);
        assert_eq!(reopened.path(), Some(path.as_path()));
    }

    #[test]
    fn test_open_malformed_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            JsonPromptStore::open(&path),
            Err(StoreError::Serde(_))
        ));
    }
}
