//! Remote side of the workspace.
//!
//! # Responsibility
//! - Define the remote store contract and its failure taxonomy.
//! - Track credentials (re-authentication guard) and per-session state.
//! - Provide an in-memory store for tests and demos.

pub mod auth;
pub mod memory_store;
pub mod naming;
pub mod operation;
pub mod remote;
pub mod session;
