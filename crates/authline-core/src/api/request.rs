//! Request and response values passed through the pipeline.

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::warn;

/// Which send of a request this is.
///
/// A request starts as `First` and becomes `Replay` exactly once, right
/// before it is resent after a credential renewal. A `Replay` is never
/// renewed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    Replay,
}

impl Attempt {
    pub fn is_replay(self) -> bool {
        matches!(self, Attempt::Replay)
    }
}

/// An outbound request. Values are immutable once built: the pipeline
/// derives new requests rather than editing the caller's.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Option<serde_json::Value>,
    attempt: Attempt,
}

impl ApiRequest {
    /// `url` is either absolute or a path resolved against the transport's
    /// base URL.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            attempt: Attempt::First,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attach a JSON body. Requests with a body default to
    /// `Content-Type: application/json`.
    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        if !self.headers.contains_key(header::CONTENT_TYPE) {
            self.headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }
        self.body = Some(body);
        self
    }

    pub fn with_attempt(mut self, attempt: Attempt) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn attempt(&self) -> Attempt {
        self.attempt
    }

    /// Token carried in the `Authorization: Bearer` header, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(header::AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")
    }

    /// Copy of this request authorized with `token`, replacing any previous
    /// `Authorization` header. A token that cannot be a header value leaves
    /// the request unauthenticated.
    pub fn with_bearer(mut self, token: &str) -> Self {
        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                self.headers.insert(header::AUTHORIZATION, value);
            }
            Err(_) => {
                warn!(url = %self.url, "Access token is not a valid header value, sending without it");
                self.headers.remove(header::AUTHORIZATION);
            }
        }
        self
    }

    /// The one-time replay of this request after a renewal.
    pub(crate) fn into_replay(self, access: &str) -> Self {
        self.with_bearer(access).with_attempt(Attempt::Replay)
    }
}

/// A fully received response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl ApiResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<String>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> &str {
        &self.body
    }

    pub fn into_text(self) -> String {
        self.body
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}
