//! Identity & dedup resolver.
//!
//! # Responsibility
//! - Collapse candidate note/folder lists so identity invariants hold before
//!   they enter the tree or the cache.
//!
//! # Invariants
//! - Output holds at most one entity per non-empty remote id.
//! - Among entities without a remote id, at most one per `(name, path)`.
//! - At most one entity per local id.
//! - First occurrence wins; relative order of survivors is preserved.

use crate::model::folder::Folder;
use crate::model::note::Note;
use std::collections::HashSet;

/// Identity keys used by the resolver.
pub trait TreeIdentity {
    fn local_id(&self) -> &str;
    fn remote_id(&self) -> Option<&str>;
    /// Title for notes, name for folders.
    fn display_name(&self) -> &str;
    fn path(&self) -> &str;
}

impl TreeIdentity for Note {
    fn local_id(&self) -> &str {
        &self.local_id
    }

    fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref().filter(|value| !value.is_empty())
    }

    fn display_name(&self) -> &str {
        &self.title
    }

    fn path(&self) -> &str {
        &self.path
    }
}

impl TreeIdentity for Folder {
    fn local_id(&self) -> &str {
        &self.local_id
    }

    fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref().filter(|value| !value.is_empty())
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &str {
        &self.path
    }
}

/// Deduplicates `items` in place and returns how many entries were dropped.
pub fn dedup_in_place<T: TreeIdentity>(items: &mut Vec<T>) -> usize {
    let before = items.len();
    let mut seen_local = HashSet::new();
    let mut seen_remote = HashSet::new();
    let mut seen_name_path = HashSet::new();

    items.retain(|item| {
        if !seen_local.insert(item.local_id().to_string()) {
            return false;
        }
        match item.remote_id() {
            Some(remote_id) => seen_remote.insert(remote_id.to_string()),
            None => seen_name_path
                .insert((item.display_name().to_string(), item.path().to_string())),
        }
    });

    before - items.len()
}
