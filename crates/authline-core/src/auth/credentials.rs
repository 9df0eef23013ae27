use std::fmt;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use super::backend::{CredentialBackend, MemoryBackend};

/// Entry name for the access credential
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Entry name for the renewal credential
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// The access/renewal credential pair. Either half may be absent; an
/// empty string is stored as absent.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialPair {
    pub access: Option<String>,
    pub renewal: Option<String>,
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, renewal: impl Into<String>) -> Self {
        Self {
            access: Some(access.into()).filter(|v| !v.is_empty()),
            renewal: Some(renewal.into()).filter(|v| !v.is_empty()),
        }
    }

    pub fn access(&self) -> Option<&str> {
        self.access.as_deref()
    }

    pub fn renewal(&self) -> Option<&str> {
        self.renewal.as_deref()
    }

    /// Both halves present
    pub fn is_complete(&self) -> bool {
        self.access.is_some() && self.renewal.is_some()
    }
}

// Token values never reach logs
impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access", &self.access.as_ref().map(|_| "<redacted>"))
            .field("renewal", &self.renewal.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Owner of the credential pair for one application instance.
///
/// The in-process copy is authoritative and guarded by a lock so no reader
/// ever sees a half-updated pair. Every change is written through to the
/// backend; a backend failure is logged and does not fail the call.
///
/// Backend writes happen outside the pair lock, so readers never wait on
/// file or keyring I/O. Writers are serialized by `persist` so the backend
/// ends up holding the last pair set in memory.
pub struct CredentialStore {
    pair: RwLock<CredentialPair>,
    persist: Mutex<()>,
    backend: Box<dyn CredentialBackend>,
}

impl CredentialStore {
    /// Create an empty store over `backend`, ignoring anything it holds.
    pub fn new(backend: impl CredentialBackend + 'static) -> Self {
        Self {
            pair: RwLock::new(CredentialPair::default()),
            persist: Mutex::new(()),
            backend: Box::new(backend),
        }
    }

    /// Create a store seeded from whatever `backend` has persisted.
    pub fn load(backend: impl CredentialBackend + 'static) -> Self {
        let pair = CredentialPair {
            access: Self::read_entry(&backend, ACCESS_TOKEN_KEY),
            renewal: Self::read_entry(&backend, REFRESH_TOKEN_KEY),
        };
        debug!(
            backend = backend.name(),
            authenticated = pair.is_complete(),
            "Loaded credentials"
        );
        Self {
            pair: RwLock::new(pair),
            persist: Mutex::new(()),
            backend: Box::new(backend),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    fn read_entry(backend: &dyn CredentialBackend, key: &str) -> Option<String> {
        match backend.read(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(backend = backend.name(), key, error = %e, "Failed to read credential entry");
                None
            }
        }
    }

    pub fn get(&self) -> CredentialPair {
        self.pair.read().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.pair.read().access.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.pair.read().renewal.clone()
    }

    /// Replace both credentials.
    pub fn set(&self, access: &str, renewal: &str) {
        let _persist = self.persist.lock();
        *self.pair.write() = CredentialPair::new(access, renewal);
        if let Err(e) = self.backend.write_pair(access, renewal) {
            warn!(backend = self.backend.name(), error = %e, "Failed to persist credentials");
        }
    }

    /// Remove both credentials.
    pub fn clear(&self) {
        let _persist = self.persist.lock();
        *self.pair.write() = CredentialPair::default();
        if let Err(e) = self.backend.delete_pair() {
            warn!(backend = self.backend.name(), error = %e, "Failed to remove persisted credentials");
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.pair.read().is_complete()
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("backend", &self.backend.name())
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}
