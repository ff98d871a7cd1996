//! CLI smoke and demo entry point.
//!
//! # Responsibility
//! - Verify `notetree_core` linkage (ping/version).
//! - Walk through create, move, sync, and reconcile against the in-memory
//!   remote store and print the resulting tree.
//!
//! Usage: `notetree_cli [absolute-log-dir]`

use log::info;
use notetree_core::{
    default_log_level, init_logging, open_db_in_memory, MemoryRemoteStore,
    SqliteTreeCacheRepository, TreeCacheRepository, WorkspaceConfig, WorkspaceService,
};
use std::error::Error;
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    println!("notetree_core ping={}", notetree_core::ping());
    println!("notetree_core version={}", notetree_core::core_version());

    if let Some(log_dir) = std::env::args().nth(1) {
        init_logging(default_log_level(), &log_dir)?;
        println!("logging to {log_dir}");
    }

    let store = Arc::new(MemoryRemoteStore::new());
    let notes_root = store.add_container("Notes", None);
    let shared = store.add_container("Shared", Some(&notes_root));
    store.add_document("Welcome.md", "# Welcome", &shared);
    store.add_document("cover.png", "binary", &shared);

    let conn = open_db_in_memory()?;
    let cache = SqliteTreeCacheRepository::try_new(&conn)?;
    let mut workspace = WorkspaceService::load(
        cache,
        store.clone(),
        store.clone(),
        WorkspaceConfig::default(),
    )?;

    let work = workspace.create_folder("", "Work").await?;
    let archive = workspace.create_folder("", "Archive").await?;
    workspace.create_note("Work", "Plan", "# Plan").await?;
    workspace.move_folder(&work.local_id, &archive.local_id).await?;

    let sync = workspace
        .sync(&mut |value| println!("sync progress={value}"))
        .await?;
    println!(
        "sync folders_added={} notes_added={}",
        sync.import.folders_added, sync.import.notes_added
    );

    store.add_document("Later.md", "added remotely", &shared);
    let reconcile = workspace
        .reconcile(&mut |value| println!("reconcile progress={value}"))
        .await?;
    println!(
        "reconcile notes_pruned={} notes_added={}",
        reconcile.notes_pruned, reconcile.import.notes_added
    );

    print_tree(&workspace, "", 0);
    info!(
        "event=cli_demo module=cli status=ok notes={} folders={}",
        workspace.notes().len(),
        workspace.folders().len()
    );
    Ok(())
}

fn print_tree<C: TreeCacheRepository>(workspace: &WorkspaceService<C>, path: &str, depth: usize) {
    let indent = "  ".repeat(depth);
    for folder in workspace.child_folders(path) {
        println!(
            "{indent}{}/ [{}]",
            folder.name,
            remote_label(folder.remote_id.as_deref())
        );
        print_tree(workspace, &folder.path, depth + 1);
    }
    for note in workspace.notes_in(path) {
        println!(
            "{indent}{} [{}]",
            note.title,
            remote_label(note.remote_id.as_deref())
        );
    }
}

fn remote_label(remote_id: Option<&str>) -> &str {
    remote_id.unwrap_or("local only")
}
