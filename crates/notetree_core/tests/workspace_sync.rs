use notetree_core::{
    open_db_in_memory, Folder, ImportReport, MemoryRemoteStore, Note, Operation,
    RemoteCallKind, RemoteStore, SqliteTreeCacheRepository, TreeCacheRepository, TreeSnapshot,
    WorkspaceConfig, WorkspaceError, WorkspaceService,
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

/// Remote tree: `Notes(R0)/{Work(F1)/Plan.md(N1), Ideas.md(N2), photo.png, readme}`.
fn remote_tree() -> Arc<MemoryRemoteStore> {
    let store = Arc::new(MemoryRemoteStore::new());
    store.add_container_with_id("R0", "Notes", None);
    store.add_container_with_id("F1", "Work", Some("R0"));
    store.add_document_with_id("N1", "Plan.md", "# Plan", "F1", None);
    store.add_document_with_id("N2", "Ideas.md", "- idea", "R0", None);
    store.add_document_with_id("P1", "photo.png", "binary", "R0", Some("image/png"));
    store.add_document_with_id("N3", "readme", "plain", "R0", Some("text/plain"));
    store
}

fn seed_cache(conn: &Connection, notes: Vec<Note>, folders: Vec<Folder>) {
    SqliteTreeCacheRepository::try_new(conn)
        .unwrap()
        .save_snapshot(&TreeSnapshot { notes, folders })
        .unwrap();
}

fn remote_note(title: &str, content: &str, path: &str, remote_id: &str) -> Note {
    let mut note = Note::new(title, content, path, 1);
    note.remote_id = Some(remote_id.to_string());
    note
}

fn note_titled<'a>(ws: &'a Workspace<'_>, title: &str) -> Option<&'a Note> {
    ws.notes().iter().find(|note| note.title == title)
}

#[tokio::test]
async fn initial_sync_imports_remote_tree_once_per_session() {
    let conn = open_db_in_memory().unwrap();
    let store = remote_tree();
    let mut ws = workspace(&conn, &store);
    let mut progress = Vec::new();

    let report = ws.sync(&mut |value| progress.push(value)).await.unwrap();

    assert!(!report.already_synced);
    assert_eq!(report.import.folders_added, 1);
    assert_eq!(report.import.notes_added, 3);
    assert_eq!(progress, vec![10, 30, 50, 90, 100]);
    assert_eq!(ws.root_folder().remote_id.as_deref(), Some("R0"));
    let work = ws.folder_by_path("Work").unwrap();
    assert_eq!(work.remote_id.as_deref(), Some("F1"));
    let plan = note_titled(&ws, "Plan").unwrap();
    assert_eq!(plan.path, "Work");
    assert_eq!(plan.content, "# Plan");
    assert_eq!(note_titled(&ws, "readme").unwrap().content, "plain");
    assert!(ws.notes().iter().all(|note| !note.title.starts_with("photo")));
    assert!(ws.session().has_synced());

    store.clear_calls();
    let again = ws.sync(&mut |_| {}).await.unwrap();

    assert!(again.already_synced);
    assert!(store.calls_of(RemoteCallKind::ListChildren).is_empty());
    assert_eq!(ws.notes().len(), 3);
}

#[tokio::test]
async fn imported_tree_is_persisted_to_cache() {
    let conn = open_db_in_memory().unwrap();
    let store = remote_tree();
    let mut ws = workspace(&conn, &store);

    ws.sync(&mut |_| {}).await.unwrap();

    let reloaded = workspace(&conn, &store);
    assert_eq!(reloaded.notes(), ws.notes());
    assert_eq!(reloaded.folders(), ws.folders());
}

#[tokio::test]
async fn sign_out_resets_session_and_blocks_sync() {
    let conn = open_db_in_memory().unwrap();
    let store = remote_tree();
    let mut ws = workspace(&conn, &store);
    ws.sync(&mut |_| {}).await.unwrap();

    ws.sign_out();
    let err = ws.sync(&mut |_| {}).await.unwrap_err();
    assert!(matches!(
        err,
        WorkspaceError::Unauthenticated {
            operation: Operation::Sync
        }
    ));

    ws.sign_in();
    let report = ws.sync(&mut |_| {}).await.unwrap();
    assert!(!report.already_synced);
    assert_eq!(report.import, ImportReport::default());
    assert_eq!(ws.notes().len(), 3);
}

#[tokio::test]
async fn sync_attaches_remote_ids_to_matching_local_entities() {
    let conn = open_db_in_memory().unwrap();
    let store = remote_tree();
    store.fail_all(true);
    let mut ws = workspace(&conn, &store);
    ws.create_folder("", "Work").await.unwrap();
    let local = ws.create_note("Work", "Plan", "local body").await.unwrap();
    assert!(local.remote_id.is_none());
    store.clear_failures();

    let report = ws.sync(&mut |_| {}).await.unwrap();

    assert_eq!(report.import.remote_ids_attached, 2);
    assert_eq!(report.import.folders_added, 0);
    let plan = ws.note(&local.local_id).unwrap();
    assert_eq!(plan.remote_id.as_deref(), Some("N1"));
    assert_eq!(plan.content, "local body");
    assert_eq!(
        ws.folder_by_path("Work").unwrap().remote_id.as_deref(),
        Some("F1")
    );
    assert_eq!(ws.notes().iter().filter(|note| note.title == "Plan").count(), 1);
}

#[tokio::test]
async fn sync_skips_name_taken_by_other_remote_object() {
    let conn = open_db_in_memory().unwrap();
    let mut root = Folder::root();
    root.remote_id = Some("R0".to_string());
    let mut stale = Folder::new_child(&root, "Work");
    stale.remote_id = Some("F9".to_string());
    seed_cache(&conn, Vec::new(), vec![root, stale]);
    let store = remote_tree();
    let mut ws = workspace(&conn, &store);

    let report = ws.sync(&mut |_| {}).await.unwrap();

    assert_eq!(report.import.conflicts_skipped, 1);
    assert!(note_titled(&ws, "Plan").is_none());
    assert_eq!(ws.child_folders("").len(), 1);
}

#[tokio::test]
async fn unreadable_documents_are_skipped_without_aborting() {
    let conn = open_db_in_memory().unwrap();
    let store = remote_tree();
    store.fail_on(RemoteCallKind::ReadDocument);
    let mut ws = workspace(&conn, &store);

    let report = ws.sync(&mut |_| {}).await.unwrap();

    assert_eq!(report.import.folders_added, 1);
    assert_eq!(report.import.notes_added, 0);
    assert_eq!(report.import.branches_skipped, 3);
    assert!(ws.notes().is_empty());
    assert!(ws.session().has_synced());
}

#[tokio::test]
async fn reconcile_prunes_vanished_and_updates_drifted_notes() {
    let conn = open_db_in_memory().unwrap();
    let mut root = Folder::root();
    root.remote_id = Some("R0".to_string());
    let mut work = Folder::new_child(&root, "Work");
    work.remote_id = Some("F1".to_string());
    let plan = remote_note("Plan", "# Plan", "Work", "N1");
    let ideas = remote_note("Ideas", "- idea", "", "N2");
    let gone = remote_note("Gone", "bye", "", "X");
    let draft = Note::new("Draft", "unsynced", "", 2);
    seed_cache(
        &conn,
        vec![plan.clone(), ideas.clone(), gone.clone(), draft.clone()],
        vec![root, work],
    );
    let store = remote_tree();
    store.set_document_content("N1", "# Plan v2");
    store.add_document_with_id("N5", "Fresh.md", "new", "F1", None);
    let mut ws = workspace(&conn, &store);
    let mut progress = Vec::new();

    let report = ws
        .reconcile(&mut |value| progress.push(value))
        .await
        .unwrap();

    assert_eq!(report.notes_pruned, 1);
    assert_eq!(report.folders_pruned, 0);
    assert_eq!(report.import.notes_updated, 1);
    assert_eq!(report.import.notes_added, 2);
    assert_eq!(progress, vec![10, 20, 30, 50, 60, 70, 90, 100]);
    assert!(ws.note(&gone.local_id).is_none());
    assert_eq!(ws.note(&draft.local_id).unwrap().content, "unsynced");
    assert_eq!(ws.note(&plan.local_id).unwrap().content, "# Plan v2");
    assert_eq!(ws.note(&ideas.local_id), Some(&ideas));
    assert!(note_titled(&ws, "Fresh").is_some());
    assert!(ws.session().has_synced());

    let revision = ws.tree().revision();
    let quiet = ws.reconcile(&mut |_| {}).await.unwrap();
    assert_eq!(quiet.notes_pruned, 0);
    assert_eq!(quiet.import.notes_updated, 0);
    assert_eq!(quiet.import.notes_added, 0);
    assert_eq!(ws.tree().revision(), revision);
    assert!(ws.sync(&mut |_| {}).await.unwrap().already_synced);
}

#[tokio::test]
async fn reconcile_keeps_vanished_folder_holding_local_only_notes() {
    let conn = open_db_in_memory().unwrap();
    let mut root = Folder::root();
    root.remote_id = Some("R0".to_string());
    let mut old = Folder::new_child(&root, "Old");
    old.remote_id = Some("F7".to_string());
    let mut empty = Folder::new_child(&root, "Empty");
    empty.remote_id = Some("F8".to_string());
    let keep = Note::new("Keep", "local", "Old", 1);
    seed_cache(&conn, vec![keep.clone()], vec![root, old.clone(), empty.clone()]);
    let store = remote_tree();
    let mut ws = workspace(&conn, &store);

    let report = ws.reconcile(&mut |_| {}).await.unwrap();

    assert_eq!(report.folders_pruned, 1);
    assert_eq!(report.folders_detached, 1);
    assert!(ws.folder(&empty.local_id).is_none());
    assert!(ws.folder(&old.local_id).unwrap().remote_id.is_none());
    assert!(ws.note(&keep.local_id).is_some());
}

#[tokio::test]
async fn reconcile_listing_failure_leaves_tree_untouched() {
    let conn = open_db_in_memory().unwrap();
    let mut root = Folder::root();
    root.remote_id = Some("R0".to_string());
    let gone = remote_note("Gone", "bye", "", "X");
    seed_cache(&conn, vec![gone.clone()], vec![root]);
    let store = remote_tree();
    store.fail_on(RemoteCallKind::ListChildren);
    let mut ws = workspace(&conn, &store);
    let before = ws.tree().snapshot();

    let err = ws.reconcile(&mut |_| {}).await.unwrap_err();

    assert!(matches!(
        err,
        WorkspaceError::Remote {
            operation: Operation::Reconcile,
            ..
        }
    ));
    assert_eq!(err.to_string().split(':').next(), Some("force sync failed"));
    assert_eq!(ws.tree().snapshot(), before);
    assert!(!ws.session().has_synced());
}

#[tokio::test]
async fn import_skips_remote_names_holding_a_path_separator() {
    let conn = open_db_in_memory().unwrap();
    let store = remote_tree();
    store.add_container_with_id("F7", "a/b", Some("R0"));
    store.add_document_with_id("N7", "Inside.md", "hidden", "F7", None);
    store.add_document_with_id("N8", "x/y.md", "odd", "F1", None);
    let mut ws = workspace(&conn, &store);

    let report = ws.sync(&mut |_| {}).await.unwrap();

    assert_eq!(report.import.branches_skipped, 2);
    assert_eq!(report.import.folders_added, 1);
    assert_eq!(report.import.notes_added, 3);
    assert!(ws.folder_by_path("a/b").is_none());
    assert!(note_titled(&ws, "Inside").is_none());
    assert!(note_titled(&ws, "x/y").is_none());
    assert!(ws.folders().iter().all(|folder| !folder.name.contains('/')));
}

#[tokio::test]
async fn reconcile_follows_remote_renames_and_moves() {
    let conn = open_db_in_memory().unwrap();
    let mut root = Folder::root();
    root.remote_id = Some("R0".to_string());
    let mut work = Folder::new_child(&root, "Work");
    work.remote_id = Some("F1".to_string());
    let plan = remote_note("Plan", "# Plan", "Work", "N1");
    let ideas = remote_note("Ideas", "- idea", "", "N2");
    let draft = Note::new("Draft", "unsynced", "Work", 2);
    seed_cache(
        &conn,
        vec![plan.clone(), ideas.clone(), draft.clone()],
        vec![root, work.clone()],
    );
    let store = remote_tree();
    store.rename_object("F1", "Projects").await.unwrap();
    store.rename_object("N1", "Roadmap.md").await.unwrap();
    store.reparent_object("N2", "F1").await.unwrap();
    let mut ws = workspace(&conn, &store);

    let report = ws.reconcile(&mut |_| {}).await.unwrap();

    assert_eq!(report.import.folders_updated, 1);
    assert_eq!(report.import.notes_updated, 2);
    assert_eq!(report.import.folders_added, 0);
    let projects = ws.folder(&work.local_id).unwrap();
    assert_eq!(projects.name, "Projects");
    assert_eq!(projects.path, "Projects");
    assert!(ws.folder_by_path("Work").is_none());
    let roadmap = ws.note(&plan.local_id).unwrap();
    assert_eq!(roadmap.title, "Roadmap");
    assert_eq!(roadmap.path, "Projects");
    assert_eq!(ws.note(&ideas.local_id).unwrap().path, "Projects");
    assert_eq!(ws.note(&draft.local_id).unwrap().path, "Projects");

    store.clear_calls();
    ws.save_note(&plan.local_id, "Roadmap", "# Plan v2")
        .await
        .unwrap();
    assert!(store.calls_of(RemoteCallKind::RenameObject).is_empty());
    assert_eq!(store.object_name("N1").as_deref(), Some("Roadmap.md"));
}
