//! Workspace configuration.

use serde::{Deserialize, Serialize};

/// Default well-known name of the remote root container.
pub const DEFAULT_ROOT_CONTAINER_NAME: &str = "Notes";

/// Default extension appended to note titles for remote document names.
pub const DEFAULT_NOTE_EXTENSION: &str = ".md";

/// Settings that shape how the local tree maps onto the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Name passed to `find_or_create_root_container`.
    pub root_container_name: String,
    /// Suffix of remote note documents; stripped on import.
    pub note_extension: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root_container_name: DEFAULT_ROOT_CONTAINER_NAME.to_string(),
            note_extension: DEFAULT_NOTE_EXTENSION.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::WorkspaceConfig;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: WorkspaceConfig =
            serde_json::from_str(r#"{"note_extension":".txt"}"#).expect("valid config json");
        assert_eq!(config.root_container_name, "Notes");
        assert_eq!(config.note_extension, ".txt");
    }
}
