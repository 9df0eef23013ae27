//! Persistence backends for the credential entries.
//!
//! A backend stores plain string entries under the names `access_token`
//! and `refresh_token`. It knows nothing about sessions; the
//! [`CredentialStore`](super::CredentialStore) owns the pairing logic.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use keyring::Entry;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::credentials::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};

/// Keyring service name used for OS keychain entries
const SERVICE_NAME: &str = "authline";

/// Credential file name in the cache directory
const CREDENTIALS_FILE: &str = "credentials.json";

/// Durable key-value storage for credential entries.
pub trait CredentialBackend: Send + Sync {
    /// Read a single entry. `Ok(None)` means the entry is absent.
    fn read(&self, key: &str) -> Result<Option<String>>;

    fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Remove an entry. Removing an absent entry is not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// Write both entries. Backends that can persist them in one step
    /// override this.
    fn write_pair(&self, access: &str, renewal: &str) -> Result<()> {
        self.write(ACCESS_TOKEN_KEY, access)?;
        self.write(REFRESH_TOKEN_KEY, renewal)
    }

    fn delete_pair(&self) -> Result<()> {
        self.delete(ACCESS_TOKEN_KEY)?;
        self.delete(REFRESH_TOKEN_KEY)
    }

    /// Name of this backend, for logs.
    fn name(&self) -> &str;
}

/// In-process storage. Nothing survives a restart; used in tests and for
/// throwaway sessions.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredEntries {
    #[serde(default)]
    entries: BTreeMap<String, String>,
    updated_at: Option<DateTime<Utc>>,
}

/// JSON file storage, written with 0600 permissions on Unix.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Storage at `<dir>/credentials.json`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CREDENTIALS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<StoredEntries> {
        if !self.path.exists() {
            return Ok(StoredEntries::default());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read credential file {}", self.path.display()))?;
        if contents.trim().is_empty() {
            return Ok(StoredEntries::default());
        }
        serde_json::from_str(&contents).context("Failed to parse credential file")
    }

    fn write_all(&self, mut stored: StoredEntries) -> Result<()> {
        if stored.entries.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path).context("Failed to remove credential file")?;
            }
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        stored.updated_at = Some(Utc::now());
        let contents = serde_json::to_string_pretty(&stored)?;
        std::fs::write(&self.path, contents).context("Failed to write credential file")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to restrict credential file permissions")?;
        }

        debug!(path = %self.path.display(), "Credential file written");
        Ok(())
    }
}

impl CredentialBackend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.entries.remove(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let mut stored = self.read_all()?;
        stored.entries.insert(key.to_string(), value.to_string());
        self.write_all(stored)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut stored = self.read_all()?;
        if stored.entries.remove(key).is_none() {
            return Ok(());
        }
        self.write_all(stored)
    }

    fn write_pair(&self, access: &str, renewal: &str) -> Result<()> {
        let mut stored = self.read_all()?;
        stored.entries.insert(ACCESS_TOKEN_KEY.to_string(), access.to_string());
        stored.entries.insert(REFRESH_TOKEN_KEY.to_string(), renewal.to_string());
        self.write_all(stored)
    }

    fn delete_pair(&self) -> Result<()> {
        let mut stored = self.read_all()?;
        stored.entries.remove(ACCESS_TOKEN_KEY);
        stored.entries.remove(REFRESH_TOKEN_KEY);
        self.write_all(stored)
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// OS keychain storage, one keyring entry per credential.
pub struct KeyringBackend {
    service: String,
}

impl KeyringBackend {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).context("Failed to create keyring entry")
    }
}

impl Default for KeyringBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialBackend for KeyringBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve credential from keychain"),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .context("Failed to store credential in keychain")
    }

    fn delete(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }

    fn name(&self) -> &str {
        "keyring"
    }
}
