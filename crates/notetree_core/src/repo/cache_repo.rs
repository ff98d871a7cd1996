//! Tree cache repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist the two ordered collections (notes, folders) of the tree.
//! - Reload them in their stored order at startup.
//!
//! # Invariants
//! - `save_snapshot` replaces both collections atomically.
//! - Loaded rows keep the order they were saved in.
//! - Blank remote ids are read back as `None`.

use crate::db::migrations::latest_version;
use crate::db::CacheDbError;
use crate::model::folder::Folder;
use crate::model::note::Note;
use crate::tree::TreeSnapshot;
use log::{debug, error};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CacheRepoResult<T> = Result<T, CacheRepoError>;

/// Errors from tree cache persistence.
#[derive(Debug)]
pub enum CacheRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(CacheDbError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
}

impl Display for CacheRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "tree cache requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid tree cache data: {message}"),
        }
    }
}

impl Error for CacheRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::UninitializedConnection { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<CacheDbError> for CacheRepoError {
    fn from(value: CacheDbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for CacheRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(CacheDbError::Sqlite(value))
    }
}

/// Durable storage for tree snapshots.
pub trait TreeCacheRepository {
    /// Loads both collections in stored order.
    fn load_snapshot(&self) -> CacheRepoResult<TreeSnapshot>;
    /// Replaces both collections with `snapshot`.
    fn save_snapshot(&self, snapshot: &TreeSnapshot) -> CacheRepoResult<()>;
}

/// SQLite-backed tree cache.
pub struct SqliteTreeCacheRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTreeCacheRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> CacheRepoResult<Self> {
        let expected_version = latest_version();
        let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if actual_version != expected_version {
            return Err(CacheRepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }
}

impl TreeCacheRepository for SqliteTreeCacheRepository<'_> {
    fn load_snapshot(&self) -> CacheRepoResult<TreeSnapshot> {
        let mut stmt = self.conn.prepare(
            "SELECT local_id, name, path, parent_local_id, remote_id
             FROM cached_folders
             ORDER BY position ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut folders = Vec::new();
        while let Some(row) = rows.next()? {
            folders.push(parse_folder_row(row)?);
        }

        let mut stmt = self.conn.prepare(
            "SELECT local_id, title, content, path, remote_id, created_at, updated_at
             FROM cached_notes
             ORDER BY position ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }

        debug!(
            "event=cache_load module=repo status=ok notes={} folders={}",
            notes.len(),
            folders.len()
        );
        Ok(TreeSnapshot { notes, folders })
    }

    fn save_snapshot(&self, snapshot: &TreeSnapshot) -> CacheRepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if let Err(err) = write_snapshot(&tx, snapshot) {
            error!("event=cache_save module=repo status=error error={err}");
            return Err(err);
        }
        tx.commit()?;
        debug!(
            "event=cache_save module=repo status=ok notes={} folders={}",
            snapshot.notes.len(),
            snapshot.folders.len()
        );
        Ok(())
    }
}

fn write_snapshot(tx: &Transaction<'_>, snapshot: &TreeSnapshot) -> CacheRepoResult<()> {
    tx.execute("DELETE FROM cached_folders;", [])?;
    tx.execute("DELETE FROM cached_notes;", [])?;

    let mut insert_folder = tx.prepare(
        "INSERT INTO cached_folders (position, local_id, name, path, parent_local_id, remote_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
    )?;
    for (position, folder) in snapshot.folders.iter().enumerate() {
        insert_folder.execute(params![
            position as i64,
            folder.local_id,
            folder.name,
            folder.path,
            folder.parent_local_id,
            folder.remote_id,
        ])?;
    }

    let mut insert_note = tx.prepare(
        "INSERT INTO cached_notes (
            position, local_id, title, content, path, remote_id, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
    )?;
    for (position, note) in snapshot.notes.iter().enumerate() {
        insert_note.execute(params![
            position as i64,
            note.local_id,
            note.title,
            note.content,
            note.path,
            note.remote_id,
            note.created_at,
            note.updated_at,
        ])?;
    }
    Ok(())
}

fn parse_folder_row(row: &Row<'_>) -> CacheRepoResult<Folder> {
    let local_id: String = row.get("local_id")?;
    if local_id.trim().is_empty() {
        return Err(CacheRepoError::InvalidData(
            "blank local_id in cached_folders.local_id".to_string(),
        ));
    }
    Ok(Folder {
        local_id,
        name: row.get("name")?,
        path: row.get("path")?,
        parent_local_id: row.get("parent_local_id")?,
        remote_id: normalize_remote_id(row.get("remote_id")?),
    })
}

fn parse_note_row(row: &Row<'_>) -> CacheRepoResult<Note> {
    let local_id: String = row.get("local_id")?;
    if local_id.trim().is_empty() {
        return Err(CacheRepoError::InvalidData(
            "blank local_id in cached_notes.local_id".to_string(),
        ));
    }
    Ok(Note {
        local_id,
        title: row.get("title")?,
        content: row.get("content")?,
        path: row.get("path")?,
        remote_id: normalize_remote_id(row.get("remote_id")?),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn normalize_remote_id(value: Option<String>) -> Option<String> {
    value.filter(|id| !id.trim().is_empty())
}
