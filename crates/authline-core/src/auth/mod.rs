//! Authentication state: credential persistence and session queries.
//!
//! This module provides:
//! - `CredentialStore`: the owned access/refresh token pair, written through
//!   to a `CredentialBackend` (file, OS keyring or memory)
//! - `Session`: the derived "authenticated" view used by route guards
//! - `Navigator`: where a terminated session sends the user

pub mod backend;
pub mod credentials;
pub mod navigation;
pub mod session;

pub use backend::{CredentialBackend, FileBackend, KeyringBackend, MemoryBackend};
pub use credentials::{CredentialPair, CredentialStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
pub use navigation::{HardRedirect, Navigator};
pub use session::{Session, SessionStatus};
