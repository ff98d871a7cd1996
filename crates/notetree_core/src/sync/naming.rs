//! Name resolution before a note document is uploaded.

use crate::model::path::is_single_segment;
use async_trait::async_trait;

/// Lets the UI layer pick the remote name of a new note document.
///
/// Receives the default document name; returns a replacement or `None` to
/// keep the default.
#[async_trait]
pub trait NameResolver: Send + Sync {
    async fn resolve_name(&self, default_name: &str) -> Option<String>;
}

/// Resolver that always keeps the default name.
pub struct KeepDefaultName;

#[async_trait]
impl NameResolver for KeepDefaultName {
    async fn resolve_name(&self, _default_name: &str) -> Option<String> {
        None
    }
}

/// Applies a resolver answer to `default_name`.
///
/// Blank answers and answers holding a path separator keep the default;
/// answers missing `note_extension` get it appended.
pub fn apply_resolved_name(
    default_name: &str,
    resolved: Option<String>,
    note_extension: &str,
) -> String {
    match resolved.as_deref().map(str::trim) {
        Some(name) if is_single_segment(name) => {
            if note_extension.is_empty() || name.ends_with(note_extension) {
                name.to_string()
            } else {
                format!("{name}{note_extension}")
            }
        }
        _ => default_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::apply_resolved_name;

    #[test]
    fn blank_or_missing_answers_keep_default() {
        assert_eq!(apply_resolved_name("Todo.md", None, ".md"), "Todo.md");
        assert_eq!(
            apply_resolved_name("Todo.md", Some("   ".to_string()), ".md"),
            "Todo.md"
        );
    }

    #[test]
    fn answers_with_separator_keep_default() {
        assert_eq!(
            apply_resolved_name("Todo.md", Some("Lists/Groceries".to_string()), ".md"),
            "Todo.md"
        );
    }

    #[test]
    fn provided_answers_get_extension() {
        assert_eq!(
            apply_resolved_name("Todo.md", Some(" Groceries ".to_string()), ".md"),
            "Groceries.md"
        );
        assert_eq!(
            apply_resolved_name("Todo.md", Some("Groceries.md".to_string()), ".md"),
            "Groceries.md"
        );
    }
}
