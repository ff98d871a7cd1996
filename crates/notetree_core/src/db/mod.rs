//! SQLite storage for the local durable tree cache.
//!
//! # Responsibility
//! - Open cache connections and bring their schema up to date.
//!
//! # Invariants
//! - The cache schema version lives in `PRAGMA user_version`.
//! - A cache written by a newer build is refused, never downgraded.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type CacheDbResult<T> = Result<T, CacheDbError>;

/// Failures while opening or migrating the tree cache.
#[derive(Debug)]
pub enum CacheDbError {
    Sqlite(rusqlite::Error),
    /// The cache file was written by a newer schema.
    CacheTooNew {
        cache_version: u32,
        supported_version: u32,
    },
}

impl CacheDbError {
    /// Stable key used as `error_code` in cache log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "cache_sqlite_failed",
            Self::CacheTooNew { .. } => "cache_too_new",
        }
    }
}

impl Display for CacheDbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "tree cache storage failed: {err}"),
            Self::CacheTooNew {
                cache_version,
                supported_version,
            } => write!(
                f,
                "tree cache schema {cache_version} is newer than this build supports ({supported_version})"
            ),
        }
    }
}

impl Error for CacheDbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::CacheTooNew { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for CacheDbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
