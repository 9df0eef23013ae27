//! Credential renewal after an authorization failure.
//!
//! All requests that hit a 401 while a renewal is running wait on the same
//! shared future, so a burst of expired requests costs one refresh call and
//! one redirect at most. Single-use refresh tokens are never presented
//! twice.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, info, warn};

use super::error::{ApiError, RenewalError};
use super::request::ApiRequest;
use super::transport::Transport;
use crate::auth::{CredentialStore, Navigator};
use crate::models::TokenResponse;

/// Default refresh endpoint
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

/// Default re-authentication entry point
pub const DEFAULT_LOGIN_PATH: &str = "/auth/login";

type RenewalFuture = Shared<BoxFuture<'static, Result<TokenResponse, RenewalError>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalState {
    Idle,
    Renewing,
    /// The last renewal failed and nobody has logged in since
    Failed,
}

/// Where renewal requests go and where a failed renewal sends the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewalEndpoints {
    pub refresh_path: String,
    pub login_path: String,
}

impl Default for RenewalEndpoints {
    fn default() -> Self {
        Self {
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
        }
    }
}

/// Exchanges the refresh token for a new pair. Clone is cheap and clones
/// share the in-flight renewal.
#[derive(Clone)]
pub struct RenewalCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
    navigator: Arc<dyn Navigator>,
    endpoints: RenewalEndpoints,
    in_flight: Mutex<Option<RenewalFuture>>,
    failed: AtomicBool,
}

impl RenewalCoordinator {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<CredentialStore>,
        navigator: Arc<dyn Navigator>,
        endpoints: RenewalEndpoints,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                store,
                navigator,
                endpoints,
                in_flight: Mutex::new(None),
                failed: AtomicBool::new(false),
            }),
        }
    }

    pub fn state(&self) -> RenewalState {
        if self.inner.in_flight.lock().is_some() {
            RenewalState::Renewing
        } else if self.inner.failed.load(Ordering::Acquire) && !self.inner.store.is_authenticated() {
            RenewalState::Failed
        } else {
            RenewalState::Idle
        }
    }

    pub fn endpoints(&self) -> &RenewalEndpoints {
        &self.inner.endpoints
    }

    /// Obtain credentials newer than `rejected`, the access token the
    /// server just refused.
    ///
    /// Joins the running renewal if there is one. If the store already
    /// holds a different access token (a renewal or login finished after
    /// the rejected request was sent), that pair is returned without a
    /// network call.
    pub async fn renew(&self, rejected: Option<&str>) -> Result<TokenResponse, RenewalError> {
        let flight = {
            let mut slot = self.inner.in_flight.lock();
            match slot.as_ref() {
                Some(flight) => {
                    debug!("Joining in-flight token refresh");
                    flight.clone()
                }
                None => {
                    let current = self.inner.store.get();
                    if let (Some(access), Some(renewal)) = (current.access(), current.renewal()) {
                        if Some(access) != rejected {
                            debug!("Credentials already renewed, skipping refresh");
                            return Ok(TokenResponse::new(access, renewal));
                        }
                    }

                    let renewal = current.renewal.ok_or(RenewalError::MissingCredential)?;
                    // The exchange runs on its own task so it finishes even
                    // when every waiter is dropped.
                    let task = tokio::spawn(self.inner.clone().run(renewal));
                    let flight = task
                        .map(|joined| {
                            joined.unwrap_or_else(|e| Err(RenewalError::Interrupted(e.to_string())))
                        })
                        .boxed()
                        .shared();
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };

        flight.await
    }
}

impl Inner {
    async fn run(self: Arc<Self>, renewal: String) -> Result<TokenResponse, RenewalError> {
        let _slot = ClearSlot(self.clone());
        let outcome = self.exchange(&renewal).await;

        match &outcome {
            Ok(tokens) => {
                self.store.set(&tokens.access_token, &tokens.refresh_token);
                self.failed.store(false, Ordering::Release);
                info!("Token refreshed successfully");
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, ending session");
                self.store.clear();
                self.failed.store(true, Ordering::Release);
                self.navigator.navigate(&self.endpoints.login_path);
            }
        }

        outcome
    }

    // Goes straight to the transport: the rejected access token must not
    // be attached to the refresh call.
    async fn exchange(&self, renewal: &str) -> Result<TokenResponse, RenewalError> {
        debug!(path = %self.endpoints.refresh_path, "Refreshing access token");
        let request = ApiRequest::post(self.endpoints.refresh_path.as_str())
            .with_json(json!({ "refresh_token": renewal }));

        let response = self
            .transport
            .send(&request)
            .await
            .map_err(RenewalError::Transport)?;

        if !response.is_success() {
            return Err(RenewalError::Rejected {
                status: response.status().as_u16(),
                body: ApiError::truncate_body(response.text()),
            });
        }

        let tokens: TokenResponse = response
            .json()
            .map_err(|e| RenewalError::InvalidResponse(e.to_string()))?;
        if tokens.access_token.is_empty() || tokens.refresh_token.is_empty() {
            return Err(RenewalError::InvalidResponse("empty token in refresh response".into()));
        }
        Ok(tokens)
    }
}

/// Empties the in-flight slot when the renewal task ends, including by
/// panic, so the next trigger starts a fresh exchange.
struct ClearSlot(Arc<Inner>);

impl Drop for ClearSlot {
    fn drop(&mut self) {
        self.0.in_flight.lock().take();
    }
}

impl fmt::Debug for RenewalCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenewalCoordinator")
            .field("endpoints", &self.inner.endpoints)
            .field("state", &self.state())
            .finish()
    }
}
