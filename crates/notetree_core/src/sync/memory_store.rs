//! In-process remote store.
//!
//! # Responsibility
//! - Provide a `RemoteStore` + `Authenticator` without a network, for the
//!   CLI demo and for tests.
//! - Record every call and allow failure injection per call kind.
//!
//! # Invariants
//! - Deleting a container deletes its descendants.
//! - Reparenting keeps object ids and carries descendants along.

use super::auth::Authenticator;
use super::remote::{RemoteEntry, RemoteError, RemoteResult, RemoteStore};
use crate::model::note::{now_ms, RemoteId};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Kind of remote call, used for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteCallKind {
    FindOrCreateRoot,
    ListChildren,
    CreateContainer,
    CreateDocument,
    ReadDocument,
    UpdateDocument,
    RenameObject,
    ReparentObject,
    DeleteObject,
}

/// One recorded remote call with its id/name arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    FindOrCreateRoot { name: String },
    ListChildren { parent_id: String },
    CreateContainer { name: String, parent_id: String },
    CreateDocument { name: String, parent_id: String },
    ReadDocument { remote_id: String },
    UpdateDocument { remote_id: String },
    RenameObject { remote_id: String, new_name: String },
    ReparentObject { remote_id: String, new_parent_id: String },
    DeleteObject { remote_id: String },
}

impl RemoteCall {
    pub fn kind(&self) -> RemoteCallKind {
        match self {
            Self::FindOrCreateRoot { .. } => RemoteCallKind::FindOrCreateRoot,
            Self::ListChildren { .. } => RemoteCallKind::ListChildren,
            Self::CreateContainer { .. } => RemoteCallKind::CreateContainer,
            Self::CreateDocument { .. } => RemoteCallKind::CreateDocument,
            Self::ReadDocument { .. } => RemoteCallKind::ReadDocument,
            Self::UpdateDocument { .. } => RemoteCallKind::UpdateDocument,
            Self::RenameObject { .. } => RemoteCallKind::RenameObject,
            Self::ReparentObject { .. } => RemoteCallKind::ReparentObject,
            Self::DeleteObject { .. } => RemoteCallKind::DeleteObject,
        }
    }

    /// Returns whether any id argument of this call equals `remote_id`.
    pub fn involves(&self, remote_id: &str) -> bool {
        match self {
            Self::FindOrCreateRoot { .. } => false,
            Self::ListChildren { parent_id }
            | Self::CreateContainer { parent_id, .. }
            | Self::CreateDocument { parent_id, .. } => parent_id == remote_id,
            Self::ReadDocument { remote_id: id }
            | Self::UpdateDocument { remote_id: id }
            | Self::RenameObject { remote_id: id, .. }
            | Self::DeleteObject { remote_id: id } => id == remote_id,
            Self::ReparentObject {
                remote_id: id,
                new_parent_id,
            } => id == remote_id || new_parent_id == remote_id,
        }
    }
}

#[derive(Debug, Clone)]
struct RemoteObject {
    name: String,
    parent_id: Option<RemoteId>,
    is_container: bool,
    content: String,
    mime_type: Option<String>,
    created_at: i64,
    modified_at: i64,
}

#[derive(Debug, Default)]
struct StoreState {
    objects: BTreeMap<RemoteId, RemoteObject>,
    next_id: u64,
    calls: Vec<RemoteCall>,
    fail_all: bool,
    failing_kinds: HashSet<RemoteCallKind>,
    credential_failures_remaining: u32,
    credential_failures_by_kind: HashMap<RemoteCallKind, u32>,
    reject_reauthentication: bool,
    reauthentication_count: u32,
}

impl StoreState {
    fn allocate_id(&mut self) -> RemoteId {
        self.next_id += 1;
        format!("remote-{}", self.next_id)
    }

    fn insert(&mut self, remote_id: RemoteId, object: RemoteObject) -> RemoteId {
        self.objects.insert(remote_id.clone(), object);
        remote_id
    }

    fn record(&mut self, call: RemoteCall) -> RemoteResult<()> {
        let kind = call.kind();
        self.calls.push(call);
        let by_kind = self.credential_failures_by_kind.get_mut(&kind);
        if let Some(remaining) = by_kind.filter(|remaining| **remaining > 0) {
            *remaining -= 1;
            return Err(RemoteError::CredentialExpired(
                "access token expired".to_string(),
            ));
        }
        if self.credential_failures_remaining > 0 {
            self.credential_failures_remaining -= 1;
            return Err(RemoteError::CredentialExpired(
                "access token expired".to_string(),
            ));
        }
        if self.fail_all || self.failing_kinds.contains(&kind) {
            return Err(RemoteError::Transport(format!(
                "injected failure for {kind:?}"
            )));
        }
        Ok(())
    }

    fn require(&self, remote_id: &str) -> RemoteResult<&RemoteObject> {
        self.objects
            .get(remote_id)
            .ok_or_else(|| RemoteError::NotFound(remote_id.to_string()))
    }

    fn require_container(&self, remote_id: &str) -> RemoteResult<()> {
        if self.require(remote_id)?.is_container {
            Ok(())
        } else {
            Err(RemoteError::Transport(format!(
                "{remote_id} is not a container"
            )))
        }
    }

    fn remove_recursive(&mut self, remote_id: &str) {
        let children: Vec<RemoteId> = self
            .objects
            .iter()
            .filter(|(_, object)| object.parent_id.as_deref() == Some(remote_id))
            .map(|(id, _)| id.clone())
            .collect();
        for child in children {
            self.remove_recursive(&child);
        }
        self.objects.remove(remote_id);
    }

    fn is_ancestor(&self, ancestor_id: &str, remote_id: &str) -> bool {
        let mut cursor = Some(remote_id.to_string());
        while let Some(current) = cursor {
            if current == ancestor_id {
                return true;
            }
            cursor = self
                .objects
                .get(&current)
                .and_then(|object| object.parent_id.clone());
        }
        false
    }
}

/// Remote store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    state: Mutex<StoreState>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seeds a container; `parent_id = None` places it at the store top level.
    pub fn add_container(&self, name: &str, parent_id: Option<&str>) -> RemoteId {
        let mut state = self.state();
        let remote_id = state.allocate_id();
        state.insert(remote_id, container(name, parent_id))
    }

    /// Seeds a container with a caller-chosen id.
    pub fn add_container_with_id(&self, remote_id: &str, name: &str, parent_id: Option<&str>) {
        self.state()
            .insert(remote_id.to_string(), container(name, parent_id));
    }

    /// Seeds a document under `parent_id`.
    pub fn add_document(&self, name: &str, content: &str, parent_id: &str) -> RemoteId {
        let mut state = self.state();
        let remote_id = state.allocate_id();
        state.insert(remote_id, document(name, content, parent_id, None))
    }

    /// Seeds a document with a caller-chosen id and optional MIME type.
    pub fn add_document_with_id(
        &self,
        remote_id: &str,
        name: &str,
        content: &str,
        parent_id: &str,
        mime_type: Option<&str>,
    ) {
        self.state().insert(
            remote_id.to_string(),
            document(name, content, parent_id, mime_type),
        );
    }

    /// Removes an object (and descendants) without recording a call.
    pub fn remove_object(&self, remote_id: &str) {
        self.state().remove_recursive(remote_id);
    }

    /// Replaces document content without recording a call.
    pub fn set_document_content(&self, remote_id: &str, content: &str) {
        if let Some(object) = self.state().objects.get_mut(remote_id) {
            object.content = content.to_string();
            object.modified_at = now_ms();
        }
    }

    pub fn exists(&self, remote_id: &str) -> bool {
        self.state().objects.contains_key(remote_id)
    }

    pub fn object_name(&self, remote_id: &str) -> Option<String> {
        self.state()
            .objects
            .get(remote_id)
            .map(|object| object.name.clone())
    }

    pub fn parent_of(&self, remote_id: &str) -> Option<RemoteId> {
        self.state()
            .objects
            .get(remote_id)
            .and_then(|object| object.parent_id.clone())
    }

    pub fn document_content(&self, remote_id: &str) -> Option<String> {
        self.state()
            .objects
            .get(remote_id)
            .filter(|object| !object.is_container)
            .map(|object| object.content.clone())
    }

    /// Number of stored objects, containers included.
    pub fn object_count(&self) -> usize {
        self.state().objects.len()
    }

    /// Every call recorded so far, failed ones included.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state().calls.clone()
    }

    pub fn calls_of(&self, kind: RemoteCallKind) -> Vec<RemoteCall> {
        self.state()
            .calls
            .iter()
            .filter(|call| call.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Makes every call fail with a transport error.
    pub fn fail_all(&self, enabled: bool) {
        self.state().fail_all = enabled;
    }

    /// Makes calls of `kind` fail with a transport error.
    pub fn fail_on(&self, kind: RemoteCallKind) {
        self.state().failing_kinds.insert(kind);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.fail_all = false;
        state.failing_kinds.clear();
        state.credential_failures_remaining = 0;
        state.credential_failures_by_kind.clear();
    }

    /// Makes the next `calls` calls fail with expired credentials.
    pub fn expire_credentials(&self, calls: u32) {
        self.state().credential_failures_remaining = calls;
    }

    /// Makes the next `calls` calls of `kind` fail with expired credentials.
    pub fn expire_credentials_on(&self, kind: RemoteCallKind, calls: u32) {
        self.state().credential_failures_by_kind.insert(kind, calls);
    }

    /// Makes `reauthenticate` fail.
    pub fn reject_reauthentication(&self, enabled: bool) {
        self.state().reject_reauthentication = enabled;
    }

    pub fn reauthentication_count(&self) -> u32 {
        self.state().reauthentication_count
    }
}

fn container(name: &str, parent_id: Option<&str>) -> RemoteObject {
    let now = now_ms();
    RemoteObject {
        name: name.to_string(),
        parent_id: parent_id.map(str::to_string),
        is_container: true,
        content: String::new(),
        mime_type: None,
        created_at: now,
        modified_at: now,
    }
}

fn document(name: &str, content: &str, parent_id: &str, mime_type: Option<&str>) -> RemoteObject {
    let now = now_ms();
    RemoteObject {
        name: name.to_string(),
        parent_id: Some(parent_id.to_string()),
        is_container: false,
        content: content.to_string(),
        mime_type: mime_type.map(str::to_string),
        created_at: now,
        modified_at: now,
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn find_or_create_root_container(&self, name: &str) -> RemoteResult<RemoteId> {
        let mut state = self.state();
        state.record(RemoteCall::FindOrCreateRoot {
            name: name.to_string(),
        })?;
        let existing = state
            .objects
            .iter()
            .find(|(_, object)| {
                object.is_container && object.parent_id.is_none() && object.name == name
            })
            .map(|(id, _)| id.clone());
        if let Some(remote_id) = existing {
            return Ok(remote_id);
        }
        let remote_id = state.allocate_id();
        Ok(state.insert(remote_id, container(name, None)))
    }

    async fn list_children(&self, parent_id: &str) -> RemoteResult<Vec<RemoteEntry>> {
        let mut state = self.state();
        state.record(RemoteCall::ListChildren {
            parent_id: parent_id.to_string(),
        })?;
        state.require_container(parent_id)?;
        Ok(state
            .objects
            .iter()
            .filter(|(_, object)| object.parent_id.as_deref() == Some(parent_id))
            .map(|(id, object)| RemoteEntry {
                remote_id: id.clone(),
                name: object.name.clone(),
                is_container: object.is_container,
                mime_type: object.mime_type.clone(),
                created_at: Some(object.created_at),
                modified_at: Some(object.modified_at),
            })
            .collect())
    }

    async fn create_container(&self, name: &str, parent_id: &str) -> RemoteResult<RemoteId> {
        let mut state = self.state();
        state.record(RemoteCall::CreateContainer {
            name: name.to_string(),
            parent_id: parent_id.to_string(),
        })?;
        state.require_container(parent_id)?;
        let remote_id = state.allocate_id();
        Ok(state.insert(remote_id, container(name, Some(parent_id))))
    }

    async fn create_document(
        &self,
        name: &str,
        content: &str,
        parent_id: &str,
    ) -> RemoteResult<RemoteId> {
        let mut state = self.state();
        state.record(RemoteCall::CreateDocument {
            name: name.to_string(),
            parent_id: parent_id.to_string(),
        })?;
        state.require_container(parent_id)?;
        let remote_id = state.allocate_id();
        Ok(state.insert(remote_id, document(name, content, parent_id, None)))
    }

    async fn read_document(&self, remote_id: &str) -> RemoteResult<String> {
        let mut state = self.state();
        state.record(RemoteCall::ReadDocument {
            remote_id: remote_id.to_string(),
        })?;
        Ok(state.require(remote_id)?.content.clone())
    }

    async fn update_document(&self, remote_id: &str, content: &str) -> RemoteResult<()> {
        let mut state = self.state();
        state.record(RemoteCall::UpdateDocument {
            remote_id: remote_id.to_string(),
        })?;
        let object = state
            .objects
            .get_mut(remote_id)
            .ok_or_else(|| RemoteError::NotFound(remote_id.to_string()))?;
        object.content = content.to_string();
        object.modified_at = now_ms();
        Ok(())
    }

    async fn rename_object(&self, remote_id: &str, new_name: &str) -> RemoteResult<()> {
        let mut state = self.state();
        state.record(RemoteCall::RenameObject {
            remote_id: remote_id.to_string(),
            new_name: new_name.to_string(),
        })?;
        let object = state
            .objects
            .get_mut(remote_id)
            .ok_or_else(|| RemoteError::NotFound(remote_id.to_string()))?;
        object.name = new_name.to_string();
        object.modified_at = now_ms();
        Ok(())
    }

    async fn reparent_object(&self, remote_id: &str, new_parent_id: &str) -> RemoteResult<()> {
        let mut state = self.state();
        state.record(RemoteCall::ReparentObject {
            remote_id: remote_id.to_string(),
            new_parent_id: new_parent_id.to_string(),
        })?;
        state.require(remote_id)?;
        state.require_container(new_parent_id)?;
        if state.is_ancestor(remote_id, new_parent_id) {
            return Err(RemoteError::Transport(format!(
                "cannot move {remote_id} under its own descendant"
            )));
        }
        if let Some(object) = state.objects.get_mut(remote_id) {
            object.parent_id = Some(new_parent_id.to_string());
            object.modified_at = now_ms();
        }
        Ok(())
    }

    async fn delete_object(&self, remote_id: &str) -> RemoteResult<()> {
        let mut state = self.state();
        state.record(RemoteCall::DeleteObject {
            remote_id: remote_id.to_string(),
        })?;
        state.require(remote_id)?;
        state.remove_recursive(remote_id);
        Ok(())
    }
}

#[async_trait]
impl Authenticator for MemoryRemoteStore {
    async fn reauthenticate(&self) -> RemoteResult<()> {
        let mut state = self.state();
        state.reauthentication_count += 1;
        if state.reject_reauthentication {
            return Err(RemoteError::CredentialExpired(
                "re-authentication rejected".to_string(),
            ));
        }
        Ok(())
    }
}
