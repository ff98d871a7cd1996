//! Folder path helpers.
//!
//! # Invariants
//! - Paths are `/`-delimited, relative to the root folder.
//! - The root folder path is the empty string.
//! - Paths never carry a leading or trailing slash.

/// Joins a parent folder path with one child segment.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Returns whether `name` can stand as one path segment.
pub fn is_single_segment(name: &str) -> bool {
    !name.is_empty() && !name.contains('/')
}

/// Returns the parent path of `path`, or `None` for root.
pub fn parent_path(path: &str) -> Option<&str> {
    if path.is_empty() {
        return None;
    }
    Some(path.rsplit_once('/').map_or("", |(parent, _)| parent))
}

/// Returns whether `path` lies strictly below `ancestor`.
///
/// Every non-root path is below root. Prefix matching is segment-aware:
/// `Workshop` is not below `Work`.
pub fn is_descendant_path(path: &str, ancestor: &str) -> bool {
    if ancestor.is_empty() {
        return !path.is_empty();
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}

/// Returns whether `path` equals `ancestor` or lies below it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    path == ancestor || is_descendant_path(path, ancestor)
}

/// Rewrites the `old_prefix` part of `path` to `new_prefix`.
///
/// Returns `None` when `path` is not within `old_prefix`. The remainder after
/// the prefix is preserved verbatim.
pub fn rewrite_prefix(path: &str, old_prefix: &str, new_prefix: &str) -> Option<String> {
    if path == old_prefix {
        return Some(new_prefix.to_string());
    }
    if !is_descendant_path(path, old_prefix) {
        return None;
    }
    let remainder = if old_prefix.is_empty() {
        path
    } else {
        &path[old_prefix.len() + 1..]
    };
    Some(join_path(new_prefix, remainder))
}
