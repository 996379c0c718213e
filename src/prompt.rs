//! Prompt records and search filters
//!
//! A `PromptRecord` is owned by the storage collaborator. The shortcut engine
//! only reads records and bumps `use_count` through the store's
//! `increment_use` path.

use std::collections::BTreeSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Maximum length of a prompt body (chars)
pub const MAX_PROMPT_LENGTH: usize = 8000;

/// Maximum length of a prompt title (chars)
pub const MAX_TITLE_LENGTH: usize = 50;

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// A stored, reusable text snippet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRecord {
    /// Opaque id, immutable once created
    pub id: String,
    pub title: String,
    /// Text inserted into the host field on commit
    pub content: String,
    #[serde(default)]
    pub is_favorite: bool,
    /// Successful insertions; only ever increases
    #[serde(default)]
    pub use_count: u64,
    /// Epoch ms of the last insertion (0 = never used)
    #[serde(default)]
    pub last_used_at: i64,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    /// False once soft-deleted
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

fn default_active() -> bool {
    true
}

impl PromptRecord {
    /// Create a fresh record stamped with the current time
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            is_favorite: false,
            use_count: 0,
            last_used_at: 0,
            created_at: now,
            updated_at: now,
            tags: BTreeSet::new(),
            is_active: true,
            category: None,
            source: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn favorite(mut self, is_favorite: bool) -> Self {
        self.is_favorite = is_favorite;
        self
    }

    pub fn with_usage(mut self, use_count: u64, last_used_at: i64) -> Self {
        self.use_count = use_count;
        self.last_used_at = last_used_at;
        self
    }
}

/// Partial update applied by `PromptStore::update`
///
/// `id` and `use_count` are deliberately absent: the id is immutable and the
/// use count only moves through `increment_use`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl PromptPatch {
    pub fn apply_to(self, record: &mut PromptRecord) {
        if let Some(title) = self.title {
            record.title = title;
        }
        if let Some(content) = self.content {
            record.content = content;
        }
        if let Some(is_favorite) = self.is_favorite {
            record.is_favorite = is_favorite;
        }
        if let Some(tags) = self.tags {
            record.tags = tags;
        }
        if let Some(category) = self.category {
            record.category = Some(category);
        }
    }
}

/// Ordering applied by `PromptStore::search`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Favorites first, then the usage/recency blend
    #[default]
    Relevance,
    /// Highest use count first
    Usage,
    /// Favorites first, otherwise stored order
    Favorite,
    /// Most recently used first
    Time,
}

/// Search request understood by the storage collaborator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(default)]
    pub only_favorites: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

impl PromptFilter {
    /// Filter used by the shortcut overlay for a given term
    pub fn for_term(term: &str, limit: usize) -> Self {
        let trimmed = term.trim();
        Self {
            term: (!trimmed.is_empty()).then(|| trimmed.to_string()),
            sort_by: SortBy::Relevance,
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// The trimmed, non-empty term if any
    pub fn term(&self) -> Option<&str> {
        self.term.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

/// Fields supplied when creating a prompt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptDraft {
    #[serde(default)]
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}
