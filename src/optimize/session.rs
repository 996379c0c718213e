//! Branching history of optimize results
//!
//! Each optimize call adds a version. A version continued from another
//! records it as `parent_id`, so the history is a forest: continuing twice
//! from the same source yields two siblings.
//!
//! Calls are split into `begin_*` (insert a loading placeholder and describe
//! the request) and [`OptimizationSession::settle`] (fill the placeholder in).
//! A placeholder is found by id when it settles, never by a remembered
//! index, because other versions may have been inserted in between. Every
//! request also carries the session epoch; `start` bumps it, so results for
//! a history that has since been cleared are dropped.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::OptimizeError;
use crate::prompt::now_millis;

use super::{OptimizeMode, Optimizer};

pub type VersionId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VersionStatus {
    Loading,
    Ready,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationVersion {
    pub id: VersionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<VersionId>,
    /// Model output, or the user-facing error message
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_content: Option<String>,
    #[serde(default)]
    pub is_edited: bool,
    pub status: VersionStatus,
    pub mode: OptimizeMode,
    pub created_at: i64,
}

impl OptimizationVersion {
    fn placeholder(id: VersionId, parent_id: Option<VersionId>, mode: OptimizeMode) -> Self {
        Self {
            id,
            parent_id,
            content: String::new(),
            edited_content: None,
            is_edited: false,
            status: VersionStatus::Loading,
            mode,
            created_at: now_millis(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == VersionStatus::Loading
    }
}

/// The text shown, copied, and saved for a version
pub fn display_content(version: &OptimizationVersion) -> &str {
    version
        .edited_content
        .as_deref()
        .unwrap_or(&version.content)
}

/// A request waiting on the optimize collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOptimization {
    pub epoch: u64,
    pub version_id: VersionId,
    pub input: String,
    pub mode: OptimizeMode,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Nothing to optimize")]
    EmptyInput,

    #[error("Version {0} does not exist")]
    UnknownVersion(VersionId),

    #[error("Version {0} is still loading")]
    StillLoading(VersionId),
}

#[derive(Debug, Default)]
pub struct OptimizationSession {
    versions: Vec<OptimizationVersion>,
    epoch: u64,
    last_error: Option<String>,
}

impl OptimizationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Versions in display order
    pub fn list(&self) -> &[OptimizationVersion] {
        &self.versions
    }

    pub fn get(&self, id: VersionId) -> Option<&OptimizationVersion> {
        self.versions.iter().find(|v| v.id == id)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_optimizing(&self) -> bool {
        self.versions.iter().any(OptimizationVersion::is_loading)
    }

    /// Message of the most recent failed request
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn display_content(&self, id: VersionId) -> Option<&str> {
        self.get(id).map(display_content)
    }

    /// Ancestor chain of `id`, root first, ending with `id` itself
    pub fn lineage(&self, id: VersionId) -> Vec<VersionId> {
        let mut chain = Vec::new();
        let mut cursor = self.get(id);
        while let Some(version) = cursor {
            // Ids are unique and parents are always older, but don't loop forever on bad data
            if chain.contains(&version.id) {
                break;
            }
            chain.push(version.id);
            cursor = version.parent_id.and_then(|p| self.get(p));
        }
        chain.reverse();
        chain
    }

    fn next_id(&self) -> VersionId {
        self.versions.iter().map(|v| v.id).max().unwrap_or(0) + 1
    }

    /// Clear the history and insert the first placeholder
    pub fn begin_start(
        &mut self,
        input: &str,
        mode: OptimizeMode,
    ) -> Result<PendingOptimization, SessionError> {
        if input.trim().is_empty() {
            return Err(SessionError::EmptyInput);
        }
        self.epoch += 1;
        self.last_error = None;
        self.versions = vec![OptimizationVersion::placeholder(1, None, mode)];
        info!(epoch = self.epoch, ?mode, "Optimization started");
        Ok(PendingOptimization {
            epoch: self.epoch,
            version_id: 1,
            input: input.to_string(),
            mode,
        })
    }

    /// Insert a placeholder right after `source`, parented to it
    pub fn begin_continue(
        &mut self,
        source: VersionId,
        mode: OptimizeMode,
    ) -> Result<PendingOptimization, SessionError> {
        let index = self
            .versions
            .iter()
            .position(|v| v.id == source)
            .ok_or(SessionError::UnknownVersion(source))?;
        let source_version = &self.versions[index];
        if source_version.is_loading() {
            return Err(SessionError::StillLoading(source));
        }
        let input = display_content(source_version).to_string();
        if input.trim().is_empty() {
            return Err(SessionError::EmptyInput);
        }

        let id = self.next_id();
        self.versions
            .insert(index + 1, OptimizationVersion::placeholder(id, Some(source), mode));
        self.last_error = None;
        info!(source, version_id = id, ?mode, "Optimization continued");
        Ok(PendingOptimization {
            epoch: self.epoch,
            version_id: id,
            input,
            mode,
        })
    }

    /// Fill in a placeholder; false when the request was superseded
    pub fn settle(
        &mut self,
        pending: &PendingOptimization,
        result: Result<String, OptimizeError>,
    ) -> bool {
        if pending.epoch != self.epoch {
            debug!(
                stale = pending.epoch,
                current = self.epoch,
                "Discarding optimize result from an earlier session"
            );
            return false;
        }
        let Some(version) = self
            .versions
            .iter_mut()
            .find(|v| v.id == pending.version_id && v.is_loading())
        else {
            debug!(version_id = pending.version_id, "No placeholder to settle");
            return false;
        };

        match result {
            Ok(content) => {
                version.content = content;
                version.status = VersionStatus::Ready;
            }
            Err(e) => {
                let message = e.user_message();
                warn!(version_id = version.id, error = %e, "Optimization failed");
                version.content = message.clone();
                version.status = VersionStatus::Error;
                self.last_error = Some(message);
            }
        }
        true
    }

    /// Start over from `input` and wait for the result
    pub fn start(
        &mut self,
        optimizer: &dyn Optimizer,
        input: &str,
        mode: OptimizeMode,
    ) -> Result<VersionId, SessionError> {
        let pending = self.begin_start(input, mode)?;
        let result = optimizer.optimize(&pending.input, mode);
        self.settle(&pending, result);
        Ok(pending.version_id)
    }

    /// Continue from `source` and wait for the result
    pub fn continue_from(
        &mut self,
        optimizer: &dyn Optimizer,
        source: VersionId,
        mode: OptimizeMode,
    ) -> Result<VersionId, SessionError> {
        let pending = self.begin_continue(source, mode)?;
        let result = optimizer.optimize(&pending.input, mode);
        self.settle(&pending, result);
        Ok(pending.version_id)
    }

    /// Override a version's text; `content` itself is never modified
    pub fn edit(&mut self, id: VersionId, new_content: &str) -> Result<(), SessionError> {
        let version = self
            .versions
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or(SessionError::UnknownVersion(id))?;
        if version.is_loading() {
            return Err(SessionError::StillLoading(id));
        }
        version.edited_content = Some(new_content.to_string());
        version.is_edited = true;
        debug!(version_id = id, "Version edited");
        Ok(())
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
