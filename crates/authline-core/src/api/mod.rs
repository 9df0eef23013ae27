//! REST API client module for the auth and user services.
//!
//! This module provides the `ApiClient`, whose request pipeline attaches
//! the stored bearer token to every call, renews it through the refresh
//! endpoint when the server answers 401, and replays the request once.
//!
//! Tokens are obtained through OTP verification and kept in the
//! `CredentialStore`.

pub mod augment;
pub mod client;
mod endpoints;
pub mod error;
pub mod renewal;
pub mod request;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use augment::RequestAugmenter;
pub use client::{ApiClient, ApiClientBuilder};
pub use error::{ApiError, RenewalError};
pub use renewal::{
    RenewalCoordinator, RenewalEndpoints, RenewalState, DEFAULT_LOGIN_PATH, DEFAULT_REFRESH_PATH,
};
pub use request::{ApiRequest, ApiResponse, Attempt};
pub use transport::{ReqwestTransport, Transport, TransportError, TransportErrorKind};
