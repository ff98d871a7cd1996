//! In-memory note/folder tree.
//!
//! # Responsibility
//! - Hold the authoritative local set of notes and folders.
//! - Answer id and path queries for services and UI callers.
//! - Apply pure structural rewrites (prefix rewrite, pruning).
//!
//! # Invariants
//! - The root folder is always present and always stored first.
//! - Every mutating call bumps `revision`, so callers can skip redundant
//!   persistence.
//! - No method awaits; a lookup followed by an insert is one logical step.

pub mod dedup;

use crate::model::folder::{Folder, ROOT_FOLDER_ID};
use crate::model::note::Note;
use crate::model::path::{is_within, parent_path, rewrite_prefix};
use dedup::dedup_in_place;
use log::warn;

/// Ordered collections persisted to the local cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeSnapshot {
    pub notes: Vec<Note>,
    pub folders: Vec<Folder>,
}

/// Number of entries dropped by one dedup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupReport {
    pub notes_removed: usize,
    pub folders_removed: usize,
}

impl DedupReport {
    pub fn changed(&self) -> bool {
        self.notes_removed > 0 || self.folders_removed > 0
    }
}

/// Note/folder arena addressed by local id.
#[derive(Debug, Clone)]
pub struct TreeModel {
    notes: Vec<Note>,
    folders: Vec<Folder>,
    revision: u64,
}

impl Default for TreeModel {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeModel {
    /// Creates a tree that only contains the root folder.
    pub fn new() -> Self {
        Self {
            notes: Vec::new(),
            folders: vec![Folder::root()],
            revision: 0,
        }
    }

    /// Builds a tree from persisted collections.
    ///
    /// Runs the dedup resolver and re-seeds the root folder when missing.
    pub fn from_snapshot(snapshot: TreeSnapshot) -> (Self, DedupReport) {
        let mut tree = Self {
            notes: snapshot.notes,
            folders: snapshot.folders,
            revision: 0,
        };
        tree.ensure_root_first();
        let report = tree.dedup();
        (tree, report)
    }

    /// Returns an owned copy of both collections in stored order.
    pub fn snapshot(&self) -> TreeSnapshot {
        TreeSnapshot {
            notes: self.notes.clone(),
            folders: self.folders.clone(),
        }
    }

    /// Monotonic change counter.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Applies the dedup resolver to both collections.
    pub fn dedup(&mut self) -> DedupReport {
        let notes_removed = dedup_in_place(&mut self.notes);
        let folders_removed = dedup_in_place(&mut self.folders);
        let report = DedupReport {
            notes_removed,
            folders_removed,
        };
        if report.changed() {
            warn!(
                "event=tree_dedup module=tree status=ok notes_removed={} folders_removed={}",
                notes_removed, folders_removed
            );
            self.ensure_root_first();
            self.revision += 1;
        }
        report
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn folders(&self) -> &[Folder] {
        &self.folders
    }

    pub fn root(&self) -> &Folder {
        &self.folders[0]
    }

    pub fn note(&self, local_id: &str) -> Option<&Note> {
        self.notes.iter().find(|note| note.local_id == local_id)
    }

    pub fn folder(&self, local_id: &str) -> Option<&Folder> {
        self.folders.iter().find(|folder| folder.local_id == local_id)
    }

    pub fn folder_by_path(&self, path: &str) -> Option<&Folder> {
        self.folders.iter().find(|folder| folder.path == path)
    }

    pub fn note_by_remote_id(&self, remote_id: &str) -> Option<&Note> {
        self.notes
            .iter()
            .find(|note| note.remote_id.as_deref() == Some(remote_id))
    }

    pub fn folder_by_remote_id(&self, remote_id: &str) -> Option<&Folder> {
        self.folders
            .iter()
            .find(|folder| folder.remote_id.as_deref() == Some(remote_id))
    }

    pub fn note_by_title(&self, path: &str, title: &str) -> Option<&Note> {
        self.notes
            .iter()
            .find(|note| note.path == path && note.title == title)
    }

    pub fn folder_by_name(&self, parent: &str, name: &str) -> Option<&Folder> {
        self.folders.iter().find(|folder| {
            !folder.is_root()
                && folder.name == name
                && parent_path(&folder.path) == Some(parent)
        })
    }

    /// Folders exactly one segment below `path`.
    pub fn child_folders(&self, path: &str) -> Vec<&Folder> {
        self.folders
            .iter()
            .filter(|folder| !folder.is_root() && parent_path(&folder.path) == Some(path))
            .collect()
    }

    /// Notes whose containing folder path equals `path`.
    pub fn notes_in(&self, path: &str) -> Vec<&Note> {
        self.notes.iter().filter(|note| note.path == path).collect()
    }

    /// Returns whether a sibling named `name` already exists under `path`.
    pub fn has_sibling_named(&self, path: &str, name: &str, except_local_id: &str) -> bool {
        let folder_clash = self
            .folder_by_name(path, name)
            .is_some_and(|folder| folder.local_id != except_local_id);
        let note_clash = self
            .notes
            .iter()
            .any(|note| note.path == path && note.title == name && note.local_id != except_local_id);
        folder_clash || note_clash
    }

    pub fn note_mut(&mut self, local_id: &str) -> Option<&mut Note> {
        let note = self.notes.iter_mut().find(|note| note.local_id == local_id)?;
        self.revision += 1;
        Some(note)
    }

    pub fn folder_mut(&mut self, local_id: &str) -> Option<&mut Folder> {
        let folder = self
            .folders
            .iter_mut()
            .find(|folder| folder.local_id == local_id)?;
        self.revision += 1;
        Some(folder)
    }

    pub fn insert_note(&mut self, note: Note) {
        self.notes.push(note);
        self.revision += 1;
    }

    pub fn insert_folder(&mut self, folder: Folder) {
        if folder.is_root() {
            return;
        }
        self.folders.push(folder);
        self.revision += 1;
    }

    pub fn remove_note(&mut self, local_id: &str) -> Option<Note> {
        let index = self.notes.iter().position(|note| note.local_id == local_id)?;
        self.revision += 1;
        Some(self.notes.remove(index))
    }

    /// Removes a folder together with every folder and note within its path.
    ///
    /// Returns the removed notes and folders (the folder itself first). The
    /// root folder is never removed.
    pub fn remove_folder_subtree(&mut self, local_id: &str) -> Option<(Vec<Note>, Vec<Folder>)> {
        let folder = self.folder(local_id)?;
        if folder.is_root() {
            return None;
        }
        let path = folder.path.clone();

        let (removed_notes, kept_notes) = std::mem::take(&mut self.notes)
            .into_iter()
            .partition(|note: &Note| is_within(&note.path, &path));
        let (mut removed_folders, kept_folders): (Vec<Folder>, Vec<Folder>) =
            std::mem::take(&mut self.folders)
                .into_iter()
                .partition(|folder| !folder.is_root() && is_within(&folder.path, &path));
        self.notes = kept_notes;
        self.folders = kept_folders;
        removed_folders.sort_by_key(|folder| folder.local_id != local_id);
        self.revision += 1;
        Some((removed_notes, removed_folders))
    }

    /// Keeps notes matching `keep`; returns how many were removed.
    pub fn retain_notes(&mut self, keep: impl FnMut(&Note) -> bool) -> usize {
        let before = self.notes.len();
        self.notes.retain(keep);
        let removed = before - self.notes.len();
        if removed > 0 {
            self.revision += 1;
        }
        removed
    }

    /// Keeps non-root folders matching `keep`; root always survives.
    pub fn retain_folders(&mut self, mut keep: impl FnMut(&Folder) -> bool) -> usize {
        let before = self.folders.len();
        self.folders.retain(|folder| folder.is_root() || keep(folder));
        let removed = before - self.folders.len();
        if removed > 0 {
            self.revision += 1;
        }
        removed
    }

    /// Rewrites every folder and note path within `old_path` to `new_path`.
    ///
    /// Entities already rewritten are left alone, so a repeated call with the
    /// same canonical paths is a no-op. Returns the number of changed paths.
    pub fn rewrite_subtree_paths(&mut self, old_path: &str, new_path: &str) -> usize {
        if old_path == new_path || old_path.is_empty() {
            return 0;
        }
        let mut changed = 0;
        for folder in self.folders.iter_mut().filter(|folder| !folder.is_root()) {
            if let Some(rewritten) = rewrite_prefix(&folder.path, old_path, new_path) {
                folder.path = rewritten;
                changed += 1;
            }
        }
        for note in &mut self.notes {
            if let Some(rewritten) = rewrite_prefix(&note.path, old_path, new_path) {
                note.path = rewritten;
                changed += 1;
            }
        }
        if changed > 0 {
            self.revision += 1;
        }
        changed
    }

    fn ensure_root_first(&mut self) {
        match self
            .folders
            .iter()
            .position(|folder| folder.local_id == ROOT_FOLDER_ID)
        {
            Some(0) => {}
            Some(index) => {
                let root = self.folders.remove(index);
                self.folders.insert(0, root);
            }
            None => self.folders.insert(0, Folder::root()),
        }
        let root = &mut self.folders[0];
        root.path.clear();
        root.parent_local_id.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{TreeModel, TreeSnapshot};
    use crate::model::folder::Folder;
    use crate::model::note::Note;

    fn sample_tree() -> TreeModel {
        let mut tree = TreeModel::new();
        let work = Folder::new_child(tree.root(), "Work");
        let plans = Folder::new_child(&work, "Plans");
        let workshop = Folder::new_child(tree.root(), "Workshop");
        tree.insert_note(Note::new("Plan", "body", "Work", 1));
        tree.insert_note(Note::new("Q3", "body", "Work/Plans", 1));
        tree.insert_note(Note::new("Tools", "body", "Workshop", 1));
        tree.insert_note(Note::new("Inbox", "body", "", 1));
        tree.insert_folder(work);
        tree.insert_folder(plans);
        tree.insert_folder(workshop);
        tree
    }

    #[test]
    fn child_queries_use_exactly_one_extra_segment() {
        let tree = sample_tree();
        let root_children: Vec<_> = tree.child_folders("").iter().map(|f| f.name.clone()).collect();
        assert_eq!(root_children, vec!["Work", "Workshop"]);
        assert_eq!(tree.child_folders("Work").len(), 1);
        assert_eq!(tree.notes_in("").len(), 1);
        assert_eq!(tree.notes_in("Work").len(), 1);
    }

    #[test]
    fn remove_folder_subtree_does_not_touch_prefix_siblings() {
        let mut tree = sample_tree();
        let work_id = tree.folder_by_path("Work").expect("work folder").local_id.clone();

        let (notes, folders) = tree.remove_folder_subtree(&work_id).expect("subtree removed");
        assert_eq!(notes.len(), 2);
        assert_eq!(folders.len(), 2);
        assert_eq!(folders[0].local_id, work_id);
        assert!(tree.folder_by_path("Workshop").is_some());
        assert!(tree.note_by_title("Workshop", "Tools").is_some());
    }

    #[test]
    fn root_cannot_be_removed() {
        let mut tree = sample_tree();
        assert!(tree.remove_folder_subtree("root").is_none());
        assert_eq!(tree.retain_folders(|_| false), 3);
        assert!(tree.root().is_root());
    }

    #[test]
    fn rewrite_subtree_paths_is_idempotent() {
        let mut tree = sample_tree();
        let first = tree.rewrite_subtree_paths("Work", "Archive/Work");
        let second = tree.rewrite_subtree_paths("Work", "Archive/Work");

        assert_eq!(first, 4);
        assert_eq!(second, 0);
        assert!(tree.folder_by_path("Archive/Work/Plans").is_some());
        assert!(tree.note_by_title("Archive/Work", "Plan").is_some());
        assert!(tree.folder_by_path("Workshop").is_some());
    }

    #[test]
    fn from_snapshot_reseeds_root_and_dedups() {
        let note = Note::new("Todo", "a", "", 1);
        let mut twin = Note::new("Todo", "b", "", 2);
        twin.remote_id = None;
        let (tree, report) = TreeModel::from_snapshot(TreeSnapshot {
            notes: vec![note, twin],
            folders: Vec::new(),
        });

        assert!(tree.root().is_root());
        assert_eq!(tree.notes().len(), 1);
        assert_eq!(report.notes_removed, 1);
        assert!(report.changed());
    }

    #[test]
    fn from_snapshot_moves_root_to_front() {
        let root = Folder::root();
        let work = Folder::new_child(&root, "Work");
        let (tree, report) = TreeModel::from_snapshot(TreeSnapshot {
            notes: Vec::new(),
            folders: vec![work, root],
        });

        assert!(!report.changed());
        assert!(tree.folders()[0].is_root());
        assert_eq!(tree.folders().len(), 2);
    }
}
