//! Folder domain model.
//!
//! # Invariants
//! - Exactly one folder has `local_id == ROOT_FOLDER_ID`; it has an empty
//!   `path` and `parent_local_id` and is never renamed, moved, or deleted.
//! - Non-root `path` equals `join_path(parent.path, name)`.

use super::note::{new_local_id, LocalId, RemoteId};
use super::path::join_path;
use serde::{Deserialize, Serialize};

/// Local id of the permanent root folder.
pub const ROOT_FOLDER_ID: &str = "root";

/// Display name of the root folder.
pub const ROOT_FOLDER_NAME: &str = "Notes";

/// One folder in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub local_id: LocalId,
    pub name: String,
    pub path: String,
    /// Empty only for the root folder.
    pub parent_local_id: LocalId,
    /// For root: the remote root container, resolved lazily.
    pub remote_id: Option<RemoteId>,
}

impl Folder {
    /// Returns the permanent root folder with no remote id attached.
    pub fn root() -> Self {
        Self {
            local_id: ROOT_FOLDER_ID.to_string(),
            name: ROOT_FOLDER_NAME.to_string(),
            path: String::new(),
            parent_local_id: String::new(),
            remote_id: None,
        }
    }

    /// Creates a local-only child folder of `parent`.
    pub fn new_child(parent: &Folder, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            local_id: new_local_id(),
            path: join_path(&parent.path, &name),
            name,
            parent_local_id: parent.local_id.clone(),
            remote_id: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.local_id == ROOT_FOLDER_ID
    }
}
