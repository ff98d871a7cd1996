use notetree_core::{
    open_db_in_memory, AuthState, MemoryRemoteStore, Operation, RemoteCallKind, RemoteError,
    SqliteTreeCacheRepository, WorkspaceConfig, WorkspaceError, WorkspaceService,
};
use rusqlite::Connection;
use std::sync::Arc;

type Workspace<'conn> = WorkspaceService<SqliteTreeCacheRepository<'conn>>;

fn workspace<'conn>(conn: &'conn Connection, store: &Arc<MemoryRemoteStore>) -> Workspace<'conn> {
    let cache = SqliteTreeCacheRepository::try_new(conn).unwrap();
    WorkspaceService::load(
        cache,
        store.clone(),
        store.clone(),
        WorkspaceConfig::default(),
    )
    .unwrap()
}

fn store_with_note() -> Arc<MemoryRemoteStore> {
    let store = Arc::new(MemoryRemoteStore::new());
    store.add_container_with_id("R0", "Notes", None);
    store.add_document_with_id("N1", "Plan.md", "# Plan", "R0", None);
    store
}

#[tokio::test]
async fn expired_credentials_trigger_one_reauth_and_retry() {
    let conn = open_db_in_memory().unwrap();
    let store = Arc::new(MemoryRemoteStore::new());
    store.expire_credentials_on(RemoteCallKind::CreateDocument, 1);
    let mut ws = workspace(&conn, &store);

    let note = ws.create_note("", "Todo", "").await.unwrap();

    assert!(note.remote_id.is_some());
    assert_eq!(store.reauthentication_count(), 1);
    assert_eq!(store.calls_of(RemoteCallKind::CreateDocument).len(), 2);
    assert_eq!(ws.auth_state(), AuthState::Authenticated);
    assert!(ws.take_last_failure().is_none());
}

#[tokio::test]
async fn second_credential_failure_is_terminal() {
    let conn = open_db_in_memory().unwrap();
    let store = Arc::new(MemoryRemoteStore::new());
    store.expire_credentials_on(RemoteCallKind::CreateDocument, 2);
    let mut ws = workspace(&conn, &store);

    let note = ws.create_note("", "Todo", "").await.unwrap();

    assert!(note.remote_id.is_none());
    assert_eq!(store.reauthentication_count(), 1);
    assert_eq!(store.calls_of(RemoteCallKind::CreateDocument).len(), 2);
    assert_eq!(ws.auth_state(), AuthState::Unauthenticated);
    let (operation, err) = ws.take_last_failure().unwrap();
    assert_eq!(operation, Operation::CreateNote);
    assert!(err.is_credential_expired());

    store.clear_calls();
    let offline = ws.create_folder("", "Offline").await.unwrap();
    assert!(offline.remote_id.is_none());
    assert!(store.calls().is_empty());
    let err = ws.sync(&mut |_| {}).await.unwrap_err();
    assert!(matches!(
        err,
        WorkspaceError::Unauthenticated {
            operation: Operation::Sync
        }
    ));

    ws.sign_in();
    let online = ws.create_folder("", "Online").await.unwrap();
    assert!(online.remote_id.is_some());
}

#[tokio::test]
async fn failed_reauthentication_degrades_without_retry() {
    let conn = open_db_in_memory().unwrap();
    let store = Arc::new(MemoryRemoteStore::new());
    store.expire_credentials_on(RemoteCallKind::CreateContainer, 1);
    store.reject_reauthentication(true);
    let mut ws = workspace(&conn, &store);

    let folder = ws.create_folder("", "Work").await.unwrap();

    assert!(folder.remote_id.is_none());
    assert_eq!(store.calls_of(RemoteCallKind::CreateContainer).len(), 1);
    assert_eq!(store.reauthentication_count(), 1);
    assert_eq!(ws.auth_state(), AuthState::Unauthenticated);
    assert!(matches!(
        ws.take_last_failure(),
        Some((Operation::CreateFolder, RemoteError::CredentialExpired(_)))
    ));
}

#[tokio::test]
async fn sync_retries_whole_pass_once() {
    let conn = open_db_in_memory().unwrap();
    let store = store_with_note();
    store.expire_credentials_on(RemoteCallKind::ListChildren, 1);
    let mut ws = workspace(&conn, &store);

    let report = ws.sync(&mut |_| {}).await.unwrap();

    assert_eq!(report.import.notes_added, 1);
    assert_eq!(store.reauthentication_count(), 1);
    assert_eq!(store.calls_of(RemoteCallKind::ListChildren).len(), 2);
    assert_eq!(ws.auth_state(), AuthState::Authenticated);
}

#[tokio::test]
async fn sync_surfaces_second_credential_failure() {
    let conn = open_db_in_memory().unwrap();
    let store = store_with_note();
    store.expire_credentials_on(RemoteCallKind::ListChildren, 2);
    let mut ws = workspace(&conn, &store);

    let err = ws.sync(&mut |_| {}).await.unwrap_err();

    assert!(matches!(
        err,
        WorkspaceError::Unauthenticated {
            operation: Operation::Sync
        }
    ));
    assert_eq!(err.to_string(), "sync failed: sign-in required");
    assert_eq!(store.reauthentication_count(), 1);
    assert_eq!(store.calls_of(RemoteCallKind::ListChildren).len(), 2);
    assert!(!ws.session().has_synced());
    assert_eq!(ws.auth_state(), AuthState::Unauthenticated);
}

#[tokio::test]
async fn reconcile_retries_after_expiry_mid_pass() {
    let conn = open_db_in_memory().unwrap();
    let store = store_with_note();
    store.expire_credentials_on(RemoteCallKind::ReadDocument, 1);
    let mut ws = workspace(&conn, &store);

    let report = ws.reconcile(&mut |_| {}).await.unwrap();

    assert_eq!(report.import.notes_added, 1);
    assert_eq!(store.reauthentication_count(), 1);
    assert_eq!(ws.notes()[0].content, "# Plan");
}
