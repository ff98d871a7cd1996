//! Mutation engine: optimistic create, rename, move, delete, and save.
//!
//! # Responsibility
//! - Validate each request against tree invariants before any remote call.
//! - Attempt the matching remote operation through the re-auth guard.
//! - Commit remote-confirmed state, or local-only state when the remote
//!   call failed.
//!
//! # Invariants
//! - Rejected requests (blank names, cycles, name conflicts, root edits)
//!   leave both the tree and the remote store untouched.
//! - Accepted requests always commit locally, whatever the remote outcome.
//! - A folder move or rename issues one remote call on the folder itself;
//!   descendants only get their local paths rewritten.

use super::workspace_service::{WorkspaceError, WorkspaceService};
use crate::model::folder::Folder;
use crate::model::note::{now_ms, Note, RemoteId};
use crate::model::path::{is_single_segment, is_within, join_path};
use crate::repo::cache_repo::TreeCacheRepository;
use crate::sync::auth::with_reauth;
use crate::sync::naming::apply_resolved_name;
use crate::sync::operation::Operation;
use crate::sync::remote::{note_file_name, strip_note_extension};
use log::info;
use std::sync::Arc;

/// Entities removed by a folder delete; the folder itself comes first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovedSubtree {
    pub folders: Vec<Folder>,
    pub notes: Vec<Note>,
}

impl<C: TreeCacheRepository> WorkspaceService<C> {
    /// Creates a note in the folder at `folder_path`.
    ///
    /// Returns the committed note; `remote_id` is `None` when the upload
    /// was not possible.
    pub async fn create_note(
        &mut self,
        folder_path: &str,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Note, WorkspaceError> {
        let operation = Operation::CreateNote;
        let title = normalize_display_name(title.into())?;
        let content = content.into();
        let folder = self
            .tree
            .folder_by_path(folder_path)
            .ok_or_else(|| WorkspaceError::FolderNotFound(folder_path.to_string()))?;
        let folder_id = folder.local_id.clone();
        let path = folder.path.clone();
        self.ensure_name_free(&path, &title, "")?;

        let (title, remote_id) = self
            .upload_note(operation, &folder_id, &path, &title, &content, "")
            .await?;

        let mut note = Note::new(title, content, path, now_ms());
        note.remote_id = remote_id;
        self.tree.insert_note(note.clone());
        self.commit()?;
        log_mutation(operation, &note.local_id, note.remote_id.is_some());
        Ok(note)
    }

    /// Creates a folder below the folder at `parent_path`.
    pub async fn create_folder(
        &mut self,
        parent_path: &str,
        name: impl Into<String>,
    ) -> Result<Folder, WorkspaceError> {
        let operation = Operation::CreateFolder;
        let name = normalize_display_name(name.into())?;
        let parent = self
            .tree
            .folder_by_path(parent_path)
            .ok_or_else(|| WorkspaceError::FolderNotFound(parent_path.to_string()))?
            .clone();
        self.ensure_name_free(&parent.path, &name, "")?;

        let mut folder = Folder::new_child(&parent, name);
        if self.remote_enabled(operation) {
            if let Some(parent_remote_id) =
                self.parent_remote_id(&parent.local_id, operation).await
            {
                let remote = Arc::clone(&self.remote);
                let result = with_reauth!(
                    self.guard,
                    operation,
                    remote.create_container(&folder.name, &parent_remote_id)
                );
                folder.remote_id = self.settle(operation, result);
            }
        }

        self.tree.insert_folder(folder.clone());
        self.commit()?;
        log_mutation(operation, &folder.local_id, folder.remote_id.is_some());
        Ok(folder)
    }

    /// Renames a note; its path is unchanged.
    pub async fn rename_note(
        &mut self,
        note_id: &str,
        new_title: impl Into<String>,
    ) -> Result<Note, WorkspaceError> {
        let operation = Operation::RenameNote;
        let new_title = normalize_display_name(new_title.into())?;
        let note = self.require_note(note_id)?.clone();
        if note.title == new_title {
            return Ok(note);
        }
        self.ensure_name_free(&note.path, &new_title, note_id)?;

        if let Some(remote_id) = note.remote_id.as_deref() {
            if self.remote_enabled(operation) {
                let remote = Arc::clone(&self.remote);
                let name = note_file_name(&new_title, &self.config.note_extension);
                let result = with_reauth!(
                    self.guard,
                    operation,
                    remote.rename_object(remote_id, &name)
                );
                self.settle(operation, result);
            }
        }

        let renamed = self.update_note(note_id, |note| {
            note.title = new_title;
            note.updated_at = now_ms();
        })?;
        self.commit()?;
        log_mutation(operation, note_id, renamed.remote_id.is_some());
        Ok(renamed)
    }

    /// Renames a folder and rewrites the paths of everything inside it.
    pub async fn rename_folder(
        &mut self,
        folder_id: &str,
        new_name: impl Into<String>,
    ) -> Result<Folder, WorkspaceError> {
        let operation = Operation::RenameFolder;
        let new_name = normalize_display_name(new_name.into())?;
        let folder = self.require_mutable_folder(folder_id)?.clone();
        if folder.name == new_name {
            return Ok(folder);
        }
        let parent_path = self.parent_path_of(&folder)?;
        self.ensure_name_free(&parent_path, &new_name, folder_id)?;

        if let Some(remote_id) = folder.remote_id.as_deref() {
            if self.remote_enabled(operation) {
                let remote = Arc::clone(&self.remote);
                let result = with_reauth!(
                    self.guard,
                    operation,
                    remote.rename_object(remote_id, &new_name)
                );
                self.settle(operation, result);
            }
        }

        let new_path = join_path(&parent_path, &new_name);
        let rewritten = self.tree.rewrite_subtree_paths(&folder.path, &new_path);
        let renamed = self.update_folder(folder_id, |folder| folder.name = new_name)?;
        self.commit()?;
        info!(
            "event=workspace_mutation module=service status=ok operation={} local_id={folder_id} paths_rewritten={rewritten}",
            operation.key()
        );
        Ok(renamed)
    }

    /// Moves a note into another folder, optionally renaming it.
    pub async fn move_note(
        &mut self,
        note_id: &str,
        destination_folder_id: &str,
        new_title: Option<String>,
    ) -> Result<Note, WorkspaceError> {
        let operation = Operation::MoveNote;
        let note = self.require_note(note_id)?.clone();
        let destination = self.require_folder(destination_folder_id)?.clone();
        let title = match new_title {
            Some(title) => normalize_display_name(title)?,
            None => note.title.clone(),
        };
        let moves = destination.path != note.path;
        let renames = title != note.title;
        if !moves && !renames {
            return Ok(note);
        }
        self.ensure_name_free(&destination.path, &title, note_id)?;

        if let Some(remote_id) = note.remote_id.as_deref() {
            if self.remote_enabled(operation) {
                let remote = Arc::clone(&self.remote);
                if moves {
                    if let Some(destination_remote_id) =
                        self.parent_remote_id(&destination.local_id, operation).await
                    {
                        let result = with_reauth!(
                            self.guard,
                            operation,
                            remote.reparent_object(remote_id, &destination_remote_id)
                        );
                        self.settle(operation, result);
                    }
                }
                if renames {
                    let name = note_file_name(&title, &self.config.note_extension);
                    let result = with_reauth!(
                        self.guard,
                        operation,
                        remote.rename_object(remote_id, &name)
                    );
                    self.settle(operation, result);
                }
            }
        }

        let moved = self.update_note(note_id, |note| {
            note.path = destination.path.clone();
            note.title = title;
            note.updated_at = now_ms();
        })?;
        self.commit()?;
        log_mutation(operation, note_id, moved.remote_id.is_some());
        Ok(moved)
    }

    /// Moves a folder (with its subtree) under another folder.
    ///
    /// Remotely this is a single reparent of the folder's own object.
    pub async fn move_folder(
        &mut self,
        folder_id: &str,
        destination_folder_id: &str,
    ) -> Result<Folder, WorkspaceError> {
        let operation = Operation::MoveFolder;
        let folder = self.require_mutable_folder(folder_id)?.clone();
        let destination = self.require_folder(destination_folder_id)?.clone();
        if is_within(&destination.path, &folder.path) {
            return Err(WorkspaceError::CycleDetected {
                folder_id: folder.local_id,
                destination_id: destination.local_id,
            });
        }
        if folder.parent_local_id == destination.local_id {
            return Ok(folder);
        }
        self.ensure_name_free(&destination.path, &folder.name, folder_id)?;

        if let Some(remote_id) = folder.remote_id.as_deref() {
            if self.remote_enabled(operation) {
                if let Some(destination_remote_id) =
                    self.parent_remote_id(&destination.local_id, operation).await
                {
                    let remote = Arc::clone(&self.remote);
                    let result = with_reauth!(
                        self.guard,
                        operation,
                        remote.reparent_object(remote_id, &destination_remote_id)
                    );
                    self.settle(operation, result);
                }
            }
        }

        let new_path = join_path(&destination.path, &folder.name);
        let rewritten = self.tree.rewrite_subtree_paths(&folder.path, &new_path);
        let moved = self.update_folder(folder_id, |folder| {
            folder.parent_local_id = destination.local_id.clone();
        })?;
        self.commit()?;
        info!(
            "event=workspace_mutation module=service status=ok operation={} local_id={folder_id} paths_rewritten={rewritten}",
            operation.key()
        );
        Ok(moved)
    }

    /// Deletes a note locally, and remotely when it has a remote id.
    pub async fn delete_note(&mut self, note_id: &str) -> Result<Note, WorkspaceError> {
        let operation = Operation::DeleteNote;
        let remote_id = self.require_note(note_id)?.remote_id.clone();
        if let Some(remote_id) = remote_id {
            self.delete_remote(operation, &remote_id).await;
        }

        let removed = self
            .tree
            .remove_note(note_id)
            .ok_or_else(|| WorkspaceError::NoteNotFound(note_id.to_string()))?;
        self.commit()?;
        log_mutation(operation, note_id, false);
        Ok(removed)
    }

    /// Deletes a folder with every folder and note inside it.
    ///
    /// Remote deletes of descendant notes are best-effort and do not gate
    /// their local removal.
    pub async fn delete_folder(&mut self, folder_id: &str) -> Result<RemovedSubtree, WorkspaceError> {
        let operation = Operation::DeleteFolder;
        let folder = self.require_mutable_folder(folder_id)?.clone();
        let descendant_note_ids: Vec<RemoteId> = self
            .tree
            .notes()
            .iter()
            .filter(|note| is_within(&note.path, &folder.path))
            .filter_map(|note| note.remote_id.clone())
            .collect();

        if let Some(remote_id) = folder.remote_id.as_deref() {
            self.delete_remote(operation, remote_id).await;
        }
        for remote_id in &descendant_note_ids {
            self.delete_remote(operation, remote_id).await;
        }

        let (notes, folders) = self
            .tree
            .remove_folder_subtree(folder_id)
            .ok_or_else(|| WorkspaceError::FolderNotFound(folder_id.to_string()))?;
        self.commit()?;
        info!(
            "event=workspace_mutation module=service status=ok operation={} local_id={folder_id} notes_removed={} folders_removed={}",
            operation.key(),
            notes.len(),
            folders.len()
        );
        Ok(RemovedSubtree { folders, notes })
    }

    /// Saves a note's title and content and pushes them to the remote copy.
    ///
    /// A remote copy that vanished is re-created and its new id adopted;
    /// a note without a remote copy is uploaded when its folder has one.
    pub async fn save_note(
        &mut self,
        note_id: &str,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Note, WorkspaceError> {
        let operation = Operation::SaveNote;
        let mut title = normalize_display_name(title.into())?;
        let content = content.into();
        let note = self.require_note(note_id)?.clone();
        if title != note.title {
            self.ensure_name_free(&note.path, &title, note_id)?;
        }
        let folder_id = self
            .tree
            .folder_by_path(&note.path)
            .map(|folder| folder.local_id.clone());

        let mut remote_id = note.remote_id.clone();
        if self.remote_enabled(operation) {
            match note.remote_id.as_deref() {
                Some(existing) => {
                    let remote = Arc::clone(&self.remote);
                    let updated = with_reauth!(
                        self.guard,
                        operation,
                        remote.update_document(existing, &content)
                    );
                    match updated {
                        Ok(()) => {
                            if title != note.title {
                                let name = note_file_name(&title, &self.config.note_extension);
                                let result = with_reauth!(
                                    self.guard,
                                    operation,
                                    remote.rename_object(existing, &name)
                                );
                                self.settle(operation, result);
                            }
                        }
                        Err(err) if err.is_not_found() => {
                            info!(
                                "event=remote_recreate module=service status=start operation={} local_id={note_id}",
                                operation.key()
                            );
                            remote_id = None;
                            if let Some(folder_id) = folder_id.as_deref() {
                                let (resolved_title, created) = self
                                    .upload_note(
                                        operation,
                                        folder_id,
                                        &note.path,
                                        &title,
                                        &content,
                                        note_id,
                                    )
                                    .await?;
                                title = resolved_title;
                                remote_id = created;
                            }
                        }
                        Err(err) => {
                            self.settle::<()>(operation, Err(err));
                        }
                    }
                }
                None => {
                    if let Some(folder_id) = folder_id.as_deref() {
                        let (resolved_title, created) = self
                            .upload_note(
                                operation,
                                folder_id,
                                &note.path,
                                &title,
                                &content,
                                note_id,
                            )
                            .await?;
                        title = resolved_title;
                        remote_id = created;
                    }
                }
            }
        }

        let saved = self.update_note(note_id, |note| {
            note.title = title;
            note.content = content;
            note.remote_id = remote_id;
            note.updated_at = now_ms();
        })?;
        self.commit()?;
        log_mutation(operation, note_id, saved.remote_id.is_some());
        Ok(saved)
    }

    /// Creates `"<title> - Copy"` next to the note with the same content.
    pub async fn duplicate_note(&mut self, note_id: &str) -> Result<Note, WorkspaceError> {
        let note = self.require_note(note_id)?.clone();
        let title = format!("{} - Copy", note.title);
        self.create_note(&note.path, title, note.content).await
    }

    /// Uploads a new note document into `folder_id`.
    ///
    /// Consults the name resolver first; returns the final title (which
    /// follows the resolved document name) and the new remote id, if any.
    async fn upload_note(
        &mut self,
        operation: Operation,
        folder_id: &str,
        path: &str,
        title: &str,
        content: &str,
        except_local_id: &str,
    ) -> Result<(String, Option<RemoteId>), WorkspaceError> {
        if !self.remote_enabled(operation) {
            return Ok((title.to_string(), None));
        }
        let Some(parent_remote_id) = self.parent_remote_id(folder_id, operation).await else {
            return Ok((title.to_string(), None));
        };

        let extension = self.config.note_extension.clone();
        let default_name = note_file_name(title, &extension);
        let resolved = self.name_resolver.resolve_name(&default_name).await;
        let name = apply_resolved_name(&default_name, resolved, &extension);
        let final_title = strip_note_extension(&name, &extension).to_string();
        if final_title != title {
            self.ensure_name_free(path, &final_title, except_local_id)?;
        }

        let remote = Arc::clone(&self.remote);
        let result = with_reauth!(
            self.guard,
            operation,
            remote.create_document(&name, content, &parent_remote_id)
        );
        let remote_id = self.settle(operation, result);
        Ok((final_title, remote_id))
    }

    /// Deletes one remote object; an already missing object counts as done.
    async fn delete_remote(&mut self, operation: Operation, remote_id: &str) {
        if !self.remote_enabled(operation) {
            return;
        }
        let remote = Arc::clone(&self.remote);
        let result = with_reauth!(self.guard, operation, remote.delete_object(remote_id));
        match result {
            Err(err) if err.is_not_found() => {}
            other => {
                self.settle(operation, other);
            }
        }
    }

    fn require_note(&self, note_id: &str) -> Result<&Note, WorkspaceError> {
        self.tree
            .note(note_id)
            .ok_or_else(|| WorkspaceError::NoteNotFound(note_id.to_string()))
    }

    fn require_folder(&self, folder_id: &str) -> Result<&Folder, WorkspaceError> {
        self.tree
            .folder(folder_id)
            .ok_or_else(|| WorkspaceError::FolderNotFound(folder_id.to_string()))
    }

    fn require_mutable_folder(&self, folder_id: &str) -> Result<&Folder, WorkspaceError> {
        let folder = self.require_folder(folder_id)?;
        if folder.is_root() {
            return Err(WorkspaceError::RootFolderImmutable);
        }
        Ok(folder)
    }

    fn parent_path_of(&self, folder: &Folder) -> Result<String, WorkspaceError> {
        self.require_folder(&folder.parent_local_id)
            .map(|parent| parent.path.clone())
    }

    fn ensure_name_free(
        &self,
        path: &str,
        name: &str,
        except_local_id: &str,
    ) -> Result<(), WorkspaceError> {
        if self.tree.has_sibling_named(path, name, except_local_id) {
            return Err(WorkspaceError::NameConflict {
                path: path.to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn update_note(
        &mut self,
        note_id: &str,
        apply: impl FnOnce(&mut Note),
    ) -> Result<Note, WorkspaceError> {
        let note = self
            .tree
            .note_mut(note_id)
            .ok_or_else(|| WorkspaceError::NoteNotFound(note_id.to_string()))?;
        apply(note);
        Ok(note.clone())
    }

    fn update_folder(
        &mut self,
        folder_id: &str,
        apply: impl FnOnce(&mut Folder),
    ) -> Result<Folder, WorkspaceError> {
        let folder = self
            .tree
            .folder_mut(folder_id)
            .ok_or_else(|| WorkspaceError::FolderNotFound(folder_id.to_string()))?;
        apply(folder);
        Ok(folder.clone())
    }
}

fn normalize_display_name(value: String) -> Result<String, WorkspaceError> {
    let trimmed = value.trim();
    if !is_single_segment(trimmed) {
        return Err(WorkspaceError::InvalidDisplayName);
    }
    Ok(trimmed.to_string())
}

fn log_mutation(operation: Operation, local_id: &str, remote_attached: bool) {
    let remote = if remote_attached { "attached" } else { "local_only" };
    info!(
        "event=workspace_mutation module=service status=ok operation={} local_id={local_id} remote={remote}",
        operation.key()
    );
}
