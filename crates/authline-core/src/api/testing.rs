//! In-process test doubles for the pipeline.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::json;

use super::request::{ApiRequest, ApiResponse};
use super::transport::{Transport, TransportError};
use crate::auth::Navigator;

pub(crate) const REFRESH_PATH: &str = "/auth/refresh";

/// What the fake server does with a refresh call.
#[derive(Clone)]
pub(crate) enum RefreshBehavior {
    /// Rotate the pair; each refresh token works once
    Rotate,
    Fail(TransportError),
    Status(u16),
    Body(serde_json::Value),
}

struct FakeState {
    valid_access: String,
    valid_refresh: String,
    used_refresh: HashSet<String>,
    issued: u32,
}

/// A fake API server: protected paths accept only the current access
/// token, the refresh endpoint rotates single-use refresh tokens.
pub(crate) struct FakeApi {
    state: Mutex<FakeState>,
    refresh: RefreshBehavior,
    refresh_delay: Option<Duration>,
    reject_all: bool,
    sent: Mutex<Vec<ApiRequest>>,
}

impl FakeApi {
    /// Server whose current valid pair is `(access, refresh)`.
    pub(crate) fn new(access: &str, refresh: &str) -> Self {
        Self {
            state: Mutex::new(FakeState {
                valid_access: access.to_string(),
                valid_refresh: refresh.to_string(),
                used_refresh: HashSet::new(),
                issued: 1,
            }),
            refresh: RefreshBehavior::Rotate,
            refresh_delay: None,
            reject_all: false,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_refresh(mut self, behavior: RefreshBehavior) -> Self {
        self.refresh = behavior;
        self
    }

    pub(crate) fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    /// Answer 401 to every protected request, even with a fresh token.
    pub(crate) fn rejecting_all(mut self) -> Self {
        self.reject_all = true;
        self
    }

    pub(crate) fn sent(&self) -> Vec<ApiRequest> {
        self.sent.lock().clone()
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.sent.lock().iter().filter(|r| r.url() == REFRESH_PATH).count()
    }

    pub(crate) fn calls_to(&self, path: &str) -> Vec<ApiRequest> {
        self.sent.lock().iter().filter(|r| r.url() == path).cloned().collect()
    }

    fn handle_refresh(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        match &self.refresh {
            RefreshBehavior::Fail(e) => Err(e.clone()),
            RefreshBehavior::Status(status) => Ok(respond(*status, json!({"detail": "refresh rejected"}))),
            RefreshBehavior::Body(body) => Ok(respond(200, body.clone())),
            RefreshBehavior::Rotate => {
                let presented = request
                    .body()
                    .and_then(|b| b.get("refresh_token"))
                    .and_then(|t| t.as_str())
                    .unwrap_or_default()
                    .to_string();

                let mut state = self.state.lock();
                if presented != state.valid_refresh || state.used_refresh.contains(&presented) {
                    return Ok(respond(401, json!({"detail": "Invalid refresh token"})));
                }
                state.used_refresh.insert(presented);
                state.issued += 1;
                state.valid_access = format!("a{}", state.issued);
                state.valid_refresh = format!("r{}", state.issued);
                Ok(respond(
                    200,
                    json!({
                        "access_token": state.valid_access,
                        "refresh_token": state.valid_refresh,
                    }),
                ))
            }
        }
    }

    fn handle_protected(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let state = self.state.lock();
        if self.reject_all || request.bearer_token() != Some(state.valid_access.as_str()) {
            return Ok(respond(401, json!({"detail": "Invalid token"})));
        }
        Ok(respond(200, json!({"path": request.url(), "token": state.valid_access})))
    }
}

#[async_trait]
impl Transport for FakeApi {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.sent.lock().push(request.clone());

        if request.url() == REFRESH_PATH {
            if let Some(delay) = self.refresh_delay {
                tokio::time::sleep(delay).await;
            }
            return self.handle_refresh(request);
        }
        if request.url().starts_with("/offline") {
            return Err(TransportError::connect("connection refused"));
        }
        self.handle_protected(request)
    }
}

pub(crate) fn respond(status: u16, body: serde_json::Value) -> ApiResponse {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    ApiResponse::new(status, HeaderMap::new(), body.to_string())
}

/// Navigator that remembers every redirect.
#[derive(Default)]
pub(crate) struct RecordingNavigator {
    targets: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub(crate) fn targets(&self) -> Vec<String> {
        self.targets.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, target: &str) {
        self.targets.lock().push(target.to_string());
    }
}
