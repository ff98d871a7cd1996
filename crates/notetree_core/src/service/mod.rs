//! Workspace use-case services.
//!
//! # Responsibility
//! - Own the tree model, its local cache, and the remote store handle.
//! - Expose tree queries, mutations, initial sync, and reconciliation.
//! - Keep UI layers decoupled from storage and remote details.

pub mod mutation;
pub mod reconcile;
pub mod workspace_service;
