//! Note domain model.
//!
//! # Responsibility
//! - Define the note record shared by the tree, the cache, and sync.
//!
//! # Invariants
//! - `local_id` is stable for the session and never reused.
//! - `remote_id` is `Some` only while a matching remote document is known.
//! - `path` names the containing folder (empty string = root).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session-local identifier for notes and folders.
pub type LocalId = String;

/// Opaque identifier of an object in the remote store.
pub type RemoteId = String;

/// One text document in the folder tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub local_id: LocalId,
    /// Display name, also used to derive the remote document name.
    pub title: String,
    /// Full document body.
    pub content: String,
    /// Path of the containing folder.
    pub path: String,
    pub remote_id: Option<RemoteId>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl Note {
    /// Creates a local-only note with a freshly generated id.
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        path: impl Into<String>,
        now_ms: i64,
    ) -> Self {
        Self {
            local_id: new_local_id(),
            title: title.into(),
            content: content.into(),
            path: path.into(),
            remote_id: None,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    /// Returns whether this note has no remote counterpart.
    pub fn is_local_only(&self) -> bool {
        self.remote_id.is_none()
    }
}

/// Generates a new session-local id.
pub fn new_local_id() -> LocalId {
    Uuid::new_v4().to_string()
}

/// Current wall clock as Unix epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
