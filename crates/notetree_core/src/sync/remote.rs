//! Remote store adapter contract.
//!
//! # Responsibility
//! - Describe the coarse blob-tree operations the engine needs from the
//!   networking layer.
//! - Classify remote failures into transient, not-found, and
//!   credential-expired classes.
//!
//! # Invariants
//! - Remote ids are opaque; the engine never derives meaning from them.
//! - Reparenting a container carries its descendants along implicitly.

use crate::model::note::RemoteId;
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RemoteResult<T> = Result<T, RemoteError>;

/// MIME types accepted as note documents besides the note extension.
const NOTE_MIME_TYPES: &[&str] = &["text/markdown", "text/plain"];

/// Failure reported by the remote store adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Credentials are invalid or expired; re-authentication may help.
    CredentialExpired(String),
    /// The addressed remote object does not exist.
    NotFound(String),
    /// Network/API failure unrelated to auth.
    Transport(String),
}

impl RemoteError {
    pub fn is_credential_expired(&self) -> bool {
        matches!(self, Self::CredentialExpired(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Stable short code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::CredentialExpired(_) => "credential_expired",
            Self::NotFound(_) => "not_found",
            Self::Transport(_) => "transport",
        }
    }
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CredentialExpired(message) => write!(f, "credentials expired: {message}"),
            Self::NotFound(message) => write!(f, "remote object not found: {message}"),
            Self::Transport(message) => write!(f, "remote store error: {message}"),
        }
    }
}

impl Error for RemoteError {}

/// One child returned by `list_children`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub remote_id: RemoteId,
    pub name: String,
    pub is_container: bool,
    /// MIME type when the store reports one.
    pub mime_type: Option<String>,
    /// Unix epoch milliseconds.
    pub created_at: Option<i64>,
    /// Unix epoch milliseconds.
    pub modified_at: Option<i64>,
}

impl RemoteEntry {
    /// Returns whether this entry is a document the tree mirrors as a note.
    pub fn is_note_document(&self, note_extension: &str) -> bool {
        if self.is_container {
            return false;
        }
        if !note_extension.is_empty() && self.name.ends_with(note_extension) {
            return true;
        }
        match self.mime_type.as_deref() {
            None => true,
            Some(mime) => NOTE_MIME_TYPES.contains(&mime),
        }
    }

    /// Note title derived from the document name.
    pub fn note_title(&self, note_extension: &str) -> String {
        strip_note_extension(&self.name, note_extension).to_string()
    }
}

/// Remote document name for a note title.
pub fn note_file_name(title: &str, note_extension: &str) -> String {
    if note_extension.is_empty() || title.ends_with(note_extension) {
        title.to_string()
    } else {
        format!("{title}{note_extension}")
    }
}

/// Strips one trailing note extension, if present.
pub fn strip_note_extension<'a>(name: &'a str, note_extension: &str) -> &'a str {
    if note_extension.is_empty() {
        return name;
    }
    name.strip_suffix(note_extension)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(name)
}

/// Operations the engine consumes from the remote blob-tree store.
///
/// Implemented by the networking layer; timeouts are the adapter's concern.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Idempotently finds or creates the top-level container named `name`.
    async fn find_or_create_root_container(&self, name: &str) -> RemoteResult<RemoteId>;

    /// Lists direct children of one container.
    async fn list_children(&self, parent_id: &str) -> RemoteResult<Vec<RemoteEntry>>;

    async fn create_container(&self, name: &str, parent_id: &str) -> RemoteResult<RemoteId>;

    async fn create_document(
        &self,
        name: &str,
        content: &str,
        parent_id: &str,
    ) -> RemoteResult<RemoteId>;

    async fn read_document(&self, remote_id: &str) -> RemoteResult<String>;

    async fn update_document(&self, remote_id: &str, content: &str) -> RemoteResult<()>;

    async fn rename_object(&self, remote_id: &str, new_name: &str) -> RemoteResult<()>;

    /// Moves one object under a new parent, keeping its id and descendants.
    async fn reparent_object(&self, remote_id: &str, new_parent_id: &str) -> RemoteResult<()>;

    async fn delete_object(&self, remote_id: &str) -> RemoteResult<()>;
}

#[cfg(test)]
mod tests {
    use super::{note_file_name, strip_note_extension, RemoteEntry, RemoteError};

    fn entry(name: &str, is_container: bool, mime_type: Option<&str>) -> RemoteEntry {
        RemoteEntry {
            remote_id: "R1".to_string(),
            name: name.to_string(),
            is_container,
            mime_type: mime_type.map(str::to_string),
            created_at: None,
            modified_at: None,
        }
    }

    #[test]
    fn classifies_note_documents() {
        assert!(entry("Plan.md", false, Some("application/octet-stream")).is_note_document(".md"));
        assert!(entry("Plan", false, Some("text/plain")).is_note_document(".md"));
        assert!(entry("Plan", false, None).is_note_document(".md"));
        assert!(!entry("photo.png", false, Some("image/png")).is_note_document(".md"));
        assert!(!entry("Work.md", true, None).is_note_document(".md"));
    }

    #[test]
    fn note_names_round_trip_through_extension() {
        assert_eq!(note_file_name("Plan", ".md"), "Plan.md");
        assert_eq!(note_file_name("Plan.md", ".md"), "Plan.md");
        assert_eq!(strip_note_extension("Plan.md", ".md"), "Plan");
        assert_eq!(strip_note_extension(".md", ".md"), ".md");
        assert_eq!(entry("Plan.md", false, None).note_title(".md"), "Plan");
    }

    #[test]
    fn error_helpers_report_class() {
        assert!(RemoteError::CredentialExpired("x".into()).is_credential_expired());
        assert!(RemoteError::NotFound("x".into()).is_not_found());
        assert_eq!(RemoteError::Transport("x".into()).code(), "transport");
    }
}
