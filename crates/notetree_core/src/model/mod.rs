//! Note/folder domain model.
//!
//! # Responsibility
//! - Define the records mirrored between the local tree and the remote store.
//! - Provide path arithmetic used by tree queries and structural mutations.
//!
//! # Invariants
//! - Every entity is addressed by a session-stable `LocalId`.
//! - Folder paths are derived from parent path and name.

pub mod folder;
pub mod note;
pub mod path;
