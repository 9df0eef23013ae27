//! authline core - an authenticated API client with transparent
//! credential renewal.
//!
//! - [`auth`]: credential store, persistence backends, session view
//! - [`api`]: request pipeline, renewal coordinator, transport
//! - [`models`]: auth and user service payloads
//! - [`locale`]: active locale sent as `Accept-Language`
//! - [`config`]: on-disk configuration with environment overrides

pub mod api;
pub mod auth;
pub mod config;
pub mod locale;
pub mod models;

pub use api::{ApiClient, ApiError, ApiRequest, ApiResponse, Attempt, RenewalError, RenewalState};
pub use auth::{CredentialPair, CredentialStore, Navigator, Session};
pub use config::Config;
pub use locale::LocaleStore;
