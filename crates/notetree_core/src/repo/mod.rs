//! Repository layer for the local durable cache.
//!
//! # Responsibility
//! - Define the persistence contract used by the workspace service.
//! - Isolate SQLite query details from tree/sync orchestration.

pub mod cache_repo;
