//! High-level operation labels used in logs and user-facing errors.

use std::fmt::{Display, Formatter};

/// User-visible operation that may touch the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Sync,
    Reconcile,
    CreateNote,
    CreateFolder,
    RenameNote,
    RenameFolder,
    MoveNote,
    MoveFolder,
    DeleteNote,
    DeleteFolder,
    SaveNote,
}

impl Operation {
    /// Stable snake_case key for log events.
    pub fn key(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Reconcile => "reconcile",
            Self::CreateNote => "create_note",
            Self::CreateFolder => "create_folder",
            Self::RenameNote => "rename_note",
            Self::RenameFolder => "rename_folder",
            Self::MoveNote => "move_note",
            Self::MoveFolder => "move_folder",
            Self::DeleteNote => "delete_note",
            Self::DeleteFolder => "delete_folder",
            Self::SaveNote => "save_note",
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Sync => "sync",
            Self::Reconcile => "force sync",
            Self::CreateNote => "create note",
            Self::CreateFolder => "create folder",
            Self::RenameNote => "rename note",
            Self::RenameFolder => "rename folder",
            Self::MoveNote => "move note",
            Self::MoveFolder => "move folder",
            Self::DeleteNote => "delete note",
            Self::DeleteFolder => "delete folder",
            Self::SaveNote => "save note",
        };
        f.write_str(label)
    }
}
