use std::sync::Arc;

use super::CredentialStore;

/// How much of a credential pair is currently held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Both credentials present
    Authenticated,
    /// Only one of the two credentials present
    Partial,
    Anonymous,
}

/// Read-only view of the session for route guards and status displays.
///
/// Always answers from the credential store, so it reflects a `set` or
/// `clear` immediately.
#[derive(Debug, Clone)]
pub struct Session {
    store: Arc<CredentialStore>,
}

impl Session {
    pub fn new(store: Arc<CredentialStore>) -> Self {
        Self { store }
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.is_authenticated()
    }

    pub fn status(&self) -> SessionStatus {
        let pair = self.store.get();
        match (pair.access.is_some(), pair.renewal.is_some()) {
            (true, true) => SessionStatus::Authenticated,
            (false, false) => SessionStatus::Anonymous,
            _ => SessionStatus::Partial,
        }
    }
}
