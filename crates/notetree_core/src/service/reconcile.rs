//! Initial sync and reconciliation ("force sync").
//!
//! # Responsibility
//! - Import the remote tree into the local tree once per session.
//! - On demand, prune local entities whose remote object vanished, then
//!   import again with content drift detection.
//!
//! # Invariants
//! - Entities without a remote id are never pruned.
//! - A note is inserted only after its content was read.
//! - Content is overwritten only when the remote copy differs.
//! - Remote renames reach known entities unless the new name is taken by a
//!   sibling.
//! - A transient failure skips one branch; credential expiry aborts the
//!   pass so the whole pass can be retried once.

use super::workspace_service::{WorkspaceError, WorkspaceService};
use crate::model::folder::{Folder, ROOT_FOLDER_ID};
use crate::model::note::{new_local_id, now_ms, LocalId, Note, RemoteId};
use crate::model::path::{is_single_segment, is_within, join_path};
use crate::repo::cache_repo::TreeCacheRepository;
use crate::sync::auth::with_reauth;
use crate::sync::operation::Operation;
use crate::sync::remote::{RemoteEntry, RemoteError, RemoteResult};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// Counters of one import pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub folders_added: usize,
    pub notes_added: usize,
    /// Known folders renamed or moved remotely.
    pub folders_updated: usize,
    /// Known notes whose remote copy changed.
    pub notes_updated: usize,
    /// Local-only entities matched by name and given a remote id.
    pub remote_ids_attached: usize,
    /// Remote entries whose name is taken locally by another entity.
    pub conflicts_skipped: usize,
    /// Containers or documents that could not be read.
    pub branches_skipped: usize,
}

/// Result of `sync`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// The session already imported the tree; nothing was walked.
    pub already_synced: bool,
    pub import: ImportReport,
}

/// Result of `reconcile`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub notes_pruned: usize,
    pub folders_pruned: usize,
    /// Vanished folders kept as local-only because they hold local-only
    /// entities.
    pub folders_detached: usize,
    pub import: ImportReport,
}

/// Every container listing under the remote root, keyed by container id.
#[derive(Debug, Default)]
struct RemoteListing {
    children: HashMap<RemoteId, Vec<RemoteEntry>>,
    document_ids: HashSet<RemoteId>,
    container_ids: HashSet<RemoteId>,
}

/// Container waiting to be imported.
struct PendingContainer {
    remote_id: RemoteId,
    path: String,
    local_id: LocalId,
}

impl<C: TreeCacheRepository> WorkspaceService<C> {
    /// Imports the remote tree at most once per sign-in session.
    ///
    /// `progress` receives advisory percentages (0-100).
    pub async fn sync(
        &mut self,
        progress: &mut dyn FnMut(u8),
    ) -> Result<SyncReport, WorkspaceError> {
        let operation = Operation::Sync;
        self.ensure_signed_in(operation)?;
        let started_at = Instant::now();
        progress(10);

        let root_remote_id = self
            .resolve_root(operation)
            .await
            .map_err(|err| WorkspaceError::from_remote(operation, err))?;
        progress(30);

        if self.session.has_synced() {
            debug!("event=sync module=service status=skipped reason=already_synced");
            self.commit()?;
            progress(100);
            return Ok(SyncReport {
                already_synced: true,
                import: ImportReport::default(),
            });
        }

        info!("event=sync module=service status=start");
        progress(50);
        let mut import = ImportReport::default();
        let outcome: RemoteResult<()> = with_reauth!(
            self.guard,
            operation,
            self.import_tree(&root_remote_id, None, &mut import)
        );
        if let Err(err) = outcome {
            self.commit()?;
            return Err(self.abort_pass(operation, err));
        }
        progress(90);

        self.session.mark_synced();
        self.commit()?;
        progress(100);
        log_import(operation, &import, started_at);
        Ok(SyncReport {
            already_synced: false,
            import,
        })
    }

    /// Prunes locally-stale entities and re-imports the remote tree.
    ///
    /// The whole remote tree is listed before anything is pruned; a listing
    /// failure leaves the local tree untouched.
    pub async fn reconcile(
        &mut self,
        progress: &mut dyn FnMut(u8),
    ) -> Result<ReconcileReport, WorkspaceError> {
        let operation = Operation::Reconcile;
        self.ensure_signed_in(operation)?;
        let started_at = Instant::now();
        info!("event=reconcile module=service status=start");
        progress(10);

        let root_remote_id = self
            .resolve_root(operation)
            .await
            .map_err(|err| WorkspaceError::from_remote(operation, err))?;
        progress(20);

        let mut report = ReconcileReport::default();
        let outcome: RemoteResult<()> = with_reauth!(
            self.guard,
            operation,
            self.reconcile_pass(&root_remote_id, &mut *progress, &mut report)
        );
        if let Err(err) = outcome {
            self.commit()?;
            return Err(self.abort_pass(operation, err));
        }

        self.session.mark_synced();
        self.commit()?;
        progress(100);
        info!(
            "event=reconcile module=service status=ok notes_pruned={} folders_pruned={} folders_detached={}",
            report.notes_pruned, report.folders_pruned, report.folders_detached
        );
        log_import(operation, &report.import, started_at);
        Ok(report)
    }

    async fn reconcile_pass(
        &mut self,
        root_remote_id: &str,
        progress: &mut dyn FnMut(u8),
        report: &mut ReconcileReport,
    ) -> RemoteResult<()> {
        progress(30);
        let listing = self.list_remote_tree(root_remote_id).await?;
        progress(50);

        self.prune_vanished(&listing, report);
        progress(60);

        report.import = ImportReport::default();
        progress(70);
        self.import_tree(root_remote_id, Some(&listing), &mut report.import)
            .await?;
        progress(90);
        Ok(())
    }

    /// Lists every container under the root; any failure aborts.
    async fn list_remote_tree(&self, root_remote_id: &str) -> RemoteResult<RemoteListing> {
        let remote = Arc::clone(&self.remote);
        let mut listing = RemoteListing::default();
        listing.container_ids.insert(root_remote_id.to_string());
        let mut pending = vec![root_remote_id.to_string()];
        while let Some(container_id) = pending.pop() {
            let children = remote.list_children(&container_id).await?;
            for entry in &children {
                if entry.is_container {
                    listing.container_ids.insert(entry.remote_id.clone());
                    pending.push(entry.remote_id.clone());
                } else {
                    listing.document_ids.insert(entry.remote_id.clone());
                }
            }
            listing.children.insert(container_id, children);
        }
        debug!(
            "event=remote_list module=service status=ok containers={} documents={}",
            listing.container_ids.len(),
            listing.document_ids.len()
        );
        Ok(listing)
    }

    /// Removes remote-tracked entities missing from `listing`.
    ///
    /// A vanished folder that still holds local-only entities loses its
    /// remote id instead, so those entities keep a parent.
    fn prune_vanished(&mut self, listing: &RemoteListing, report: &mut ReconcileReport) {
        report.notes_pruned = self.tree.retain_notes(|note| match note.remote_id.as_deref() {
            Some(remote_id) => listing.document_ids.contains(remote_id),
            None => true,
        });

        let vanished: Vec<Folder> = self
            .tree
            .folders()
            .iter()
            .filter(|folder| !folder.is_root())
            .filter(|folder| {
                folder
                    .remote_id
                    .as_deref()
                    .is_some_and(|remote_id| !listing.container_ids.contains(remote_id))
            })
            .cloned()
            .collect();

        let mut detached: HashSet<LocalId> = HashSet::new();
        for folder in &vanished {
            let holds_local_only = self
                .tree
                .notes()
                .iter()
                .any(|note| note.remote_id.is_none() && is_within(&note.path, &folder.path))
                || self.tree.folders().iter().any(|other| {
                    other.remote_id.is_none()
                        && !other.is_root()
                        && is_within(&other.path, &folder.path)
                });
            if holds_local_only {
                detached.insert(folder.local_id.clone());
            }
        }
        for folder_id in &detached {
            if let Some(folder) = self.tree.folder_mut(folder_id) {
                folder.remote_id = None;
            }
        }
        report.folders_detached = detached.len();
        report.folders_pruned =
            self.tree
                .retain_folders(|folder| match folder.remote_id.as_deref() {
                    Some(remote_id) => listing.container_ids.contains(remote_id),
                    None => true,
                });
    }

    /// Walks the remote tree depth-first and merges it into the local tree.
    ///
    /// Uses `listing` when given and lists containers live otherwise.
    async fn import_tree(
        &mut self,
        root_remote_id: &str,
        listing: Option<&RemoteListing>,
        report: &mut ImportReport,
    ) -> RemoteResult<()> {
        let remote = Arc::clone(&self.remote);
        let extension = self.config.note_extension.clone();
        let mut pending = vec![PendingContainer {
            remote_id: root_remote_id.to_string(),
            path: String::new(),
            local_id: ROOT_FOLDER_ID.to_string(),
        }];

        while let Some(container) = pending.pop() {
            let cached = listing.and_then(|listing| listing.children.get(&container.remote_id));
            let children = match cached {
                Some(children) => children.clone(),
                None => match remote.list_children(&container.remote_id).await {
                    Ok(children) => children,
                    Err(err) if err.is_credential_expired() => return Err(err),
                    Err(err) => {
                        warn!(
                            "event=import_branch module=service status=skipped kind=container remote_id={} error_code={}",
                            container.remote_id,
                            err.code()
                        );
                        report.branches_skipped += 1;
                        continue;
                    }
                },
            };

            let mut subfolders = Vec::new();
            for entry in &children {
                if !is_single_segment(&entry.name) {
                    warn!(
                        "event=import_branch module=service status=skipped reason=separator_in_name remote_id={}",
                        entry.remote_id
                    );
                    report.branches_skipped += 1;
                    continue;
                }
                if entry.is_container {
                    if let Some(next) = self.import_folder(entry, &container, report) {
                        subfolders.push(next);
                    }
                } else if entry.is_note_document(&extension) {
                    self.import_note(entry, &container.path, report).await?;
                }
            }
            pending.extend(subfolders.into_iter().rev());
        }
        Ok(())
    }

    /// Finds or creates the local folder for one remote container.
    ///
    /// Returns the container to descend into, or `None` when the name is
    /// taken locally by a folder bound to another remote object.
    fn import_folder(
        &mut self,
        entry: &RemoteEntry,
        parent: &PendingContainer,
        report: &mut ImportReport,
    ) -> Option<PendingContainer> {
        if let Some(known) = self.tree.folder_by_remote_id(&entry.remote_id) {
            let local_id = known.local_id.clone();
            let old_path = known.path.clone();
            let new_path = join_path(&parent.path, &entry.name);
            if old_path == new_path || known.is_root() {
                return Some(PendingContainer {
                    remote_id: entry.remote_id.clone(),
                    path: old_path,
                    local_id,
                });
            }
            if self
                .tree
                .has_sibling_named(&parent.path, &entry.name, &local_id)
            {
                debug!(
                    "event=import_folder module=service status=skipped reason=rename_name_taken remote_id={}",
                    entry.remote_id
                );
                report.conflicts_skipped += 1;
                return Some(PendingContainer {
                    remote_id: entry.remote_id.clone(),
                    path: old_path,
                    local_id,
                });
            }
            self.tree.rewrite_subtree_paths(&old_path, &new_path);
            if let Some(folder) = self.tree.folder_mut(&local_id) {
                folder.name = entry.name.clone();
                folder.parent_local_id = parent.local_id.clone();
            }
            report.folders_updated += 1;
            return Some(PendingContainer {
                remote_id: entry.remote_id.clone(),
                path: new_path,
                local_id,
            });
        }

        if let Some(named) = self.tree.folder_by_name(&parent.path, &entry.name) {
            let local_id = named.local_id.clone();
            let path = named.path.clone();
            if named.remote_id.is_some() {
                debug!(
                    "event=import_folder module=service status=skipped reason=name_taken remote_id={}",
                    entry.remote_id
                );
                report.conflicts_skipped += 1;
                return None;
            }
            if let Some(folder) = self.tree.folder_mut(&local_id) {
                folder.remote_id = Some(entry.remote_id.clone());
            }
            report.remote_ids_attached += 1;
            return Some(PendingContainer {
                remote_id: entry.remote_id.clone(),
                path,
                local_id,
            });
        }

        let folder = Folder {
            local_id: new_local_id(),
            name: entry.name.clone(),
            path: join_path(&parent.path, &entry.name),
            parent_local_id: parent.local_id.clone(),
            remote_id: Some(entry.remote_id.clone()),
        };
        let next = PendingContainer {
            remote_id: entry.remote_id.clone(),
            path: folder.path.clone(),
            local_id: folder.local_id.clone(),
        };
        self.tree.insert_folder(folder);
        report.folders_added += 1;
        Some(next)
    }

    /// Finds, updates, or creates the local note for one remote document.
    async fn import_note(
        &mut self,
        entry: &RemoteEntry,
        path: &str,
        report: &mut ImportReport,
    ) -> RemoteResult<()> {
        let title = entry.note_title(&self.config.note_extension);

        if let Some(known) = self.tree.note_by_remote_id(&entry.remote_id) {
            let local_id = known.local_id.clone();
            let Some(content) = self.read_for_import(entry, report).await? else {
                return Ok(());
            };
            let Some(current) = self.tree.note(&local_id) else {
                return Ok(());
            };
            let drifted = current.content != content;
            let relocated = current.title != title || current.path != path;
            let relocated = relocated && {
                let taken = self.tree.has_sibling_named(path, &title, &local_id);
                if taken {
                    debug!(
                        "event=import_note module=service status=skipped reason=rename_name_taken remote_id={}",
                        entry.remote_id
                    );
                    report.conflicts_skipped += 1;
                }
                !taken
            };
            if drifted || relocated {
                if let Some(note) = self.tree.note_mut(&local_id) {
                    if drifted {
                        note.content = content;
                    }
                    if relocated {
                        note.title = title;
                        note.path = path.to_string();
                    }
                    note.updated_at = entry.modified_at.unwrap_or_else(now_ms);
                }
                report.notes_updated += 1;
            }
            return Ok(());
        }

        if let Some(named) = self.tree.note_by_title(path, &title) {
            let local_id = named.local_id.clone();
            if named.remote_id.is_some() {
                debug!(
                    "event=import_note module=service status=skipped reason=name_taken remote_id={}",
                    entry.remote_id
                );
                report.conflicts_skipped += 1;
                return Ok(());
            }
            if let Some(note) = self.tree.note_mut(&local_id) {
                note.remote_id = Some(entry.remote_id.clone());
            }
            report.remote_ids_attached += 1;
            return Ok(());
        }

        let Some(content) = self.read_for_import(entry, report).await? else {
            return Ok(());
        };
        if self.tree.note_by_remote_id(&entry.remote_id).is_some() {
            return Ok(());
        }
        let now = now_ms();
        self.tree.insert_note(Note {
            local_id: new_local_id(),
            title,
            content,
            path: path.to_string(),
            remote_id: Some(entry.remote_id.clone()),
            created_at: entry.created_at.unwrap_or(now),
            updated_at: entry.modified_at.unwrap_or(now),
        });
        report.notes_added += 1;
        Ok(())
    }

    /// Reads one document; transient failures skip it.
    async fn read_for_import(
        &self,
        entry: &RemoteEntry,
        report: &mut ImportReport,
    ) -> RemoteResult<Option<String>> {
        match self.remote.read_document(&entry.remote_id).await {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.is_credential_expired() => Err(err),
            Err(err) => {
                warn!(
                    "event=import_branch module=service status=skipped kind=document remote_id={} error_code={}",
                    entry.remote_id,
                    err.code()
                );
                report.branches_skipped += 1;
                Ok(None)
            }
        }
    }

    fn abort_pass(&self, operation: Operation, err: RemoteError) -> WorkspaceError {
        warn!(
            "event={} module=service status=error error_code={}",
            operation.key(),
            err.code()
        );
        WorkspaceError::from_remote(operation, err)
    }
}

fn log_import(operation: Operation, report: &ImportReport, started_at: Instant) {
    info!(
        "event={} module=service status=ok folders_added={} notes_added={} folders_updated={} notes_updated={} remote_ids_attached={} conflicts_skipped={} branches_skipped={} duration_ms={}",
        operation.key(),
        report.folders_added,
        report.notes_added,
        report.folders_updated,
        report.notes_updated,
        report.remote_ids_attached,
        report.conflicts_skipped,
        report.branches_skipped,
        started_at.elapsed().as_millis()
    );
}
