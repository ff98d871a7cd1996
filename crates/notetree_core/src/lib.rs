//! Core engine for notetree.
//!
//! Keeps a local, offline-capable note/folder tree consistent with a remote
//! blob-tree store: tree model and dedup, local cache, mutation engine,
//! initial sync, and reconciliation.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;
pub mod tree;

pub use config::WorkspaceConfig;
pub use db::{open_db, open_db_in_memory, CacheDbError, CacheDbResult};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::folder::{Folder, ROOT_FOLDER_ID, ROOT_FOLDER_NAME};
pub use model::note::{LocalId, Note, RemoteId};
pub use repo::cache_repo::{
    CacheRepoError, CacheRepoResult, SqliteTreeCacheRepository, TreeCacheRepository,
};
pub use service::mutation::RemovedSubtree;
pub use service::reconcile::{ImportReport, ReconcileReport, SyncReport};
pub use service::workspace_service::{WorkspaceError, WorkspaceService};
pub use sync::auth::{AuthState, Authenticator, NoReauthentication};
pub use sync::memory_store::{MemoryRemoteStore, RemoteCall, RemoteCallKind};
pub use sync::naming::{KeepDefaultName, NameResolver};
pub use sync::operation::Operation;
pub use sync::remote::{RemoteEntry, RemoteError, RemoteResult, RemoteStore};
pub use tree::{DedupReport, TreeModel, TreeSnapshot};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
