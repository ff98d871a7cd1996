//! Workspace service state, errors, and queries.
//!
//! # Responsibility
//! - Hold the tree model plus the collaborators every engine needs.
//! - Persist the tree to the local cache after each mutation.
//! - Translate remote failures into user-facing errors.
//!
//! # Invariants
//! - Dedup runs before every cache write.
//! - The cache is written only when the tree revision changed since the
//!   last write.
//! - Engine methods take `&mut self`; one call finishes before the next
//!   starts, so tree lookups and the inserts they guard never interleave.

use crate::config::WorkspaceConfig;
use crate::model::folder::Folder;
use crate::model::note::{LocalId, Note, RemoteId};
use crate::repo::cache_repo::{CacheRepoError, TreeCacheRepository};
use crate::sync::auth::{with_reauth, AuthState, Authenticator, ReauthGuard};
use crate::sync::naming::{KeepDefaultName, NameResolver};
use crate::sync::operation::Operation;
use crate::sync::remote::{RemoteError, RemoteResult, RemoteStore};
use crate::sync::session::SyncSession;
use crate::tree::TreeModel;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Errors from workspace operations.
#[derive(Debug)]
pub enum WorkspaceError {
    /// Title or folder name is blank after trim or holds a `/`.
    InvalidDisplayName,
    /// Target note does not exist.
    NoteNotFound(LocalId),
    /// Target folder does not exist (by id or path).
    FolderNotFound(String),
    /// The root folder cannot be renamed, moved, or deleted.
    RootFolderImmutable,
    /// Move would place a folder inside itself or its own subtree.
    CycleDetected {
        folder_id: LocalId,
        destination_id: LocalId,
    },
    /// A sibling with the same name already exists in the target folder.
    NameConflict { path: String, name: String },
    /// Remote credentials are missing or could not be renewed.
    Unauthenticated { operation: Operation },
    /// Remote store failure that could not be degraded locally.
    Remote {
        operation: Operation,
        source: RemoteError,
    },
    /// Local cache failure.
    Cache(CacheRepoError),
}

impl Display for WorkspaceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDisplayName => write!(f, "display name must be a non-blank single path segment"),
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::FolderNotFound(id) => write!(f, "folder not found: {id}"),
            Self::RootFolderImmutable => {
                write!(f, "the root folder cannot be renamed, moved, or deleted")
            }
            Self::CycleDetected {
                folder_id,
                destination_id,
            } => write!(
                f,
                "move would create cycle: folder {folder_id} into {destination_id}"
            ),
            Self::NameConflict { path, name } => {
                write!(f, "`{name}` already exists in folder `{path}`")
            }
            Self::Unauthenticated { operation } => {
                write!(f, "{operation} failed: sign-in required")
            }
            Self::Remote { operation, source } => write!(f, "{operation} failed: {source}"),
            Self::Cache(err) => write!(f, "{err}"),
        }
    }
}

impl Error for WorkspaceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Remote { source, .. } => Some(source),
            Self::Cache(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CacheRepoError> for WorkspaceError {
    fn from(value: CacheRepoError) -> Self {
        Self::Cache(value)
    }
}

impl WorkspaceError {
    /// Maps a remote failure of a whole-tree operation to a caller error.
    pub(crate) fn from_remote(operation: Operation, err: RemoteError) -> Self {
        if err.is_credential_expired() {
            Self::Unauthenticated { operation }
        } else {
            Self::Remote {
                operation,
                source: err,
            }
        }
    }
}

/// Workspace facade over the tree, its cache, and the remote store.
pub struct WorkspaceService<C: TreeCacheRepository> {
    pub(super) tree: TreeModel,
    pub(super) cache: C,
    pub(super) remote: Arc<dyn RemoteStore>,
    pub(super) guard: ReauthGuard,
    pub(super) session: SyncSession,
    pub(super) name_resolver: Arc<dyn NameResolver>,
    pub(super) config: WorkspaceConfig,
    persisted_revision: Option<u64>,
    pub(super) last_failure: Option<(Operation, RemoteError)>,
}

impl<C: TreeCacheRepository> WorkspaceService<C> {
    /// Loads the cached tree, deduplicates it, and builds the service.
    ///
    /// A dedup that drops entries writes the cleaned set back once.
    pub fn load(
        cache: C,
        remote: Arc<dyn RemoteStore>,
        authenticator: Arc<dyn Authenticator>,
        config: WorkspaceConfig,
    ) -> Result<Self, WorkspaceError> {
        let snapshot = cache.load_snapshot()?;
        let (tree, report) = TreeModel::from_snapshot(snapshot);
        info!(
            "event=workspace_load module=service status=ok notes={} folders={}",
            tree.notes().len(),
            tree.folders().len()
        );
        let persisted_revision = if report.changed() {
            None
        } else {
            Some(tree.revision())
        };
        let mut service = Self {
            tree,
            cache,
            remote,
            guard: ReauthGuard::new(authenticator),
            session: SyncSession::new(),
            name_resolver: Arc::new(KeepDefaultName),
            config,
            persisted_revision,
            last_failure: None,
        };
        service.commit()?;
        Ok(service)
    }

    /// Replaces the name resolver consulted before note uploads.
    pub fn with_name_resolver(mut self, name_resolver: Arc<dyn NameResolver>) -> Self {
        self.name_resolver = name_resolver;
        self
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn tree(&self) -> &TreeModel {
        &self.tree
    }

    pub fn session(&self) -> &SyncSession {
        &self.session
    }

    pub fn auth_state(&self) -> AuthState {
        self.guard.state()
    }

    pub fn note(&self, local_id: &str) -> Option<&Note> {
        self.tree.note(local_id)
    }

    pub fn folder(&self, local_id: &str) -> Option<&Folder> {
        self.tree.folder(local_id)
    }

    pub fn folder_by_path(&self, path: &str) -> Option<&Folder> {
        self.tree.folder_by_path(path)
    }

    pub fn root_folder(&self) -> &Folder {
        self.tree.root()
    }

    pub fn notes(&self) -> &[Note] {
        self.tree.notes()
    }

    pub fn folders(&self) -> &[Folder] {
        self.tree.folders()
    }

    /// Folders one level below `path`.
    pub fn child_folders(&self, path: &str) -> Vec<&Folder> {
        self.tree.child_folders(path)
    }

    /// Notes directly inside the folder at `path`.
    pub fn notes_in(&self, path: &str) -> Vec<&Note> {
        self.tree.notes_in(path)
    }

    /// Returns and clears the most recent degraded remote failure.
    pub fn take_last_failure(&mut self) -> Option<(Operation, RemoteError)> {
        self.last_failure.take()
    }

    /// Ends the sign-in session: the next `sync` imports the full tree again.
    pub fn sign_out(&mut self) {
        self.session.reset();
        self.guard.sign_out();
        info!("event=sign_out module=service status=ok");
    }

    /// Marks credentials as valid again after an external sign-in flow.
    pub fn sign_in(&mut self) {
        self.guard.sign_in();
        info!("event=sign_in module=service status=ok");
    }

    /// Deduplicates the tree and persists it when it changed.
    pub(super) fn commit(&mut self) -> Result<(), WorkspaceError> {
        self.tree.dedup();
        let revision = self.tree.revision();
        if self.persisted_revision == Some(revision) {
            return Ok(());
        }
        if let Err(err) = self.cache.save_snapshot(&self.tree.snapshot()) {
            error!("event=workspace_commit module=service status=error error={err}");
            return Err(err.into());
        }
        self.persisted_revision = Some(revision);
        Ok(())
    }

    /// Whether remote calls may be attempted right now.
    pub(super) fn remote_enabled(&self, operation: Operation) -> bool {
        if self.guard.state() == AuthState::Authenticated {
            return true;
        }
        warn!(
            "event=remote_call module=service status=skipped operation={} reason=unauthenticated",
            operation.key()
        );
        false
    }

    /// Fails fast for whole-tree operations while signed out.
    pub(super) fn ensure_signed_in(&self, operation: Operation) -> Result<(), WorkspaceError> {
        match self.guard.state() {
            AuthState::Authenticated => Ok(()),
            AuthState::Unauthenticated => Err(WorkspaceError::Unauthenticated { operation }),
        }
    }

    /// Converts a mutation's remote outcome into an optional value,
    /// recording failures for `take_last_failure`.
    pub(super) fn settle<T>(&mut self, operation: Operation, result: RemoteResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(
                    "event=remote_call module=service status=degraded operation={} error_code={}",
                    operation.key(),
                    err.code()
                );
                self.last_failure = Some((operation, err));
                None
            }
        }
    }

    /// Finds or creates the remote root container and records its id on
    /// the root folder.
    pub(super) async fn resolve_root(&mut self, operation: Operation) -> RemoteResult<RemoteId> {
        let remote = Arc::clone(&self.remote);
        let name = self.config.root_container_name.clone();
        let remote_id: RemoteId = with_reauth!(
            self.guard,
            operation,
            remote.find_or_create_root_container(&name)
        )?;
        let root_id = self.tree.root().local_id.clone();
        if self.tree.root().remote_id.as_deref() != Some(remote_id.as_str()) {
            if let Some(root) = self.tree.folder_mut(&root_id) {
                root.remote_id = Some(remote_id.clone());
            }
            info!(
                "event=root_resolve module=service status=ok operation={} remote_id={remote_id}",
                operation.key()
            );
        }
        Ok(remote_id)
    }

    /// Remote id to use as parent for uploads into `folder_id`.
    ///
    /// Resolves the root container lazily; `None` means the folder has no
    /// remote counterpart (or resolution failed and was recorded).
    pub(super) async fn parent_remote_id(
        &mut self,
        folder_id: &str,
        operation: Operation,
    ) -> Option<RemoteId> {
        let folder = self.tree.folder(folder_id)?;
        if let Some(remote_id) = &folder.remote_id {
            return Some(remote_id.clone());
        }
        if !folder.is_root() {
            return None;
        }
        let result = self.resolve_root(operation).await;
        self.settle(operation, result)
    }
}
