//! Per-sign-in sync session state.

/// Session-scoped state consulted by the initial sync engine.
///
/// Reset on sign-out so the next sign-in performs a full import again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSession {
    has_synced: bool,
}

impl SyncSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a full import already ran during this session.
    pub fn has_synced(&self) -> bool {
        self.has_synced
    }

    pub fn mark_synced(&mut self) {
        self.has_synced = true;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
