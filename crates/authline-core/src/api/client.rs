//! API client: the authenticated request pipeline.
//!
//! Every request goes through the same steps:
//! 1. the `RequestAugmenter` adds the access token and locale
//! 2. the `Transport` sends it
//! 3. on a 401 with a refresh token stored, the `RenewalCoordinator`
//!    obtains a new pair and the request is replayed once
//!
//! A replay that is refused again is returned as `RetryExhausted` and is
//! never renewed a second time.

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::augment::RequestAugmenter;
use super::renewal::{RenewalCoordinator, RenewalEndpoints, RenewalState};
use super::request::{ApiRequest, ApiResponse};
use super::transport::{ReqwestTransport, Transport};
use super::ApiError;
use crate::auth::{CredentialStore, HardRedirect, Navigator, Session};
use crate::config::Config;
use crate::locale::LocaleStore;

/// Authenticated API client.
/// Clone is cheap - clones share the transport, store and in-flight renewal.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    pub(crate) store: Arc<CredentialStore>,
    locale: Arc<LocaleStore>,
    augmenter: RequestAugmenter,
    renewal: RenewalCoordinator,
}

pub struct ApiClientBuilder {
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
    locale: Option<Arc<LocaleStore>>,
    navigator: Option<Arc<dyn Navigator>>,
    endpoints: RenewalEndpoints,
}

impl ApiClientBuilder {
    pub fn locale(mut self, locale: Arc<LocaleStore>) -> Self {
        self.locale = Some(locale);
        self
    }

    /// Called with the login path when a failed renewal ends the session.
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn endpoints(mut self, endpoints: RenewalEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn build(self) -> ApiClient {
        let locale = self.locale.unwrap_or_default();
        let navigator = self
            .navigator
            .unwrap_or_else(|| Arc::new(HardRedirect) as Arc<dyn Navigator>);
        let augmenter = RequestAugmenter::new(self.store.clone(), locale.clone());
        let renewal = RenewalCoordinator::new(
            self.transport.clone(),
            self.store.clone(),
            navigator,
            self.endpoints,
        );

        ApiClient {
            transport: self.transport,
            store: self.store,
            locale,
            augmenter,
            renewal,
        }
    }
}

impl ApiClient {
    pub fn builder(transport: Arc<dyn Transport>, store: Arc<CredentialStore>) -> ApiClientBuilder {
        ApiClientBuilder {
            transport,
            store,
            locale: None,
            navigator: None,
            endpoints: RenewalEndpoints::default(),
        }
    }

    /// Client over `reqwest` configured from `config`.
    pub fn from_config(
        config: &Config,
        store: Arc<CredentialStore>,
        navigator: Option<Arc<dyn Navigator>>,
    ) -> Result<Self> {
        let transport = ReqwestTransport::with_timeout(&config.api_base_url, config.request_timeout())
            .context("Failed to build HTTP client")?;
        let mut builder = Self::builder(Arc::new(transport), store)
            .locale(Arc::new(config.locale_store()?))
            .endpoints(config.endpoints());
        if let Some(navigator) = navigator {
            builder = builder.navigator(navigator);
        }
        Ok(builder.build())
    }

    pub fn session(&self) -> Session {
        Session::new(self.store.clone())
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn locale(&self) -> &Arc<LocaleStore> {
        &self.locale
    }

    pub fn renewal_state(&self) -> RenewalState {
        self.renewal.state()
    }

    /// Send `request` through the pipeline. A non-2xx status is an error;
    /// an expired access token is renewed and the request replayed once.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut request = self.augmenter.augment(request);

        loop {
            let response = self.transport.send(&request).await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return Self::check_response(response);
            }

            if request.attempt().is_replay() {
                warn!(url = %request.url(), "Still unauthorized after token refresh");
                return Err(ApiError::RetryExhausted(ApiError::truncate_body(response.text())));
            }
            if self.store.refresh_token().is_none() {
                debug!(url = %request.url(), "Unauthorized and no refresh token stored");
                return Err(ApiError::Unauthorized);
            }

            debug!(url = %request.url(), "Access token rejected, refreshing");
            let tokens = self.renewal.renew(request.bearer_token()).await?;
            request = request.into_replay(&tokens.access_token);
        }
    }

    /// Send once with the augmenter but without renewal. Used for the
    /// endpoints that establish or end a session.
    pub(crate) async fn execute_once(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let request = self.augmenter.augment(request);
        let response = self.transport.send(&request).await?;
        Self::check_response(response)
    }

    /// Check if response is successful, returning an error with body if not.
    fn check_response(response: ApiResponse) -> Result<ApiResponse, ApiError> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_status(response.status(), response.text()))
        }
    }

    pub(crate) fn decode<T: DeserializeOwned>(response: &ApiResponse, url: &str) -> Result<T, ApiError> {
        response.json().map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e))
        })
    }

    pub(crate) fn encode<B: Serialize>(body: &B) -> Result<serde_json::Value, ApiError> {
        serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let response = self.execute(ApiRequest::get(url)).await?;
        Self::decode(&response, url)
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, url: &str, body: &B) -> Result<T, ApiError> {
        let request = ApiRequest::post(url).with_json(Self::encode(body)?);
        let response = self.execute(request).await?;
        Self::decode(&response, url)
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize>(&self, url: &str, body: &B) -> Result<T, ApiError> {
        let request = ApiRequest::patch(url).with_json(Self::encode(body)?);
        let response = self.execute(request).await?;
        Self::decode(&response, url)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("store", &self.store)
            .field("renewal", &self.renewal)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::header;
    use serde_json::Value;

    use super::*;
    use crate::api::testing::{FakeApi, RecordingNavigator, RefreshBehavior, REFRESH_PATH};
    use crate::api::{Attempt, RenewalError, TransportError, DEFAULT_LOGIN_PATH};

    struct Fixture {
        api: Arc<FakeApi>,
        store: Arc<CredentialStore>,
        navigator: Arc<RecordingNavigator>,
        client: ApiClient,
    }

    /// Store holds a1/r1. Which of those the server accepts is up to `api`.
    fn fixture(api: FakeApi) -> Fixture {
        let api = Arc::new(api);
        let store = Arc::new(CredentialStore::in_memory());
        store.set("a1", "r1");
        let navigator = Arc::new(RecordingNavigator::default());
        let client = ApiClient::builder(api.clone(), store.clone())
            .locale(Arc::new(LocaleStore::new("en").unwrap()))
            .navigator(navigator.clone())
            .build();
        Fixture {
            api,
            store,
            navigator,
            client,
        }
    }

    fn body(response: &ApiResponse) -> Value {
        response.json().unwrap()
    }

    #[tokio::test]
    async fn test_valid_token_needs_no_renewal() {
        let f = fixture(FakeApi::new("a1", "r1"));

        let response = f.client.execute(ApiRequest::get("/items")).await.unwrap();
        assert_eq!(body(&response)["token"], "a1");
        assert_eq!(f.api.refresh_calls(), 0);

        let sent = f.api.sent();
        assert_eq!(sent[0].headers().get(header::ACCEPT_LANGUAGE).unwrap(), "en");
    }

    #[tokio::test]
    async fn test_expired_token_is_renewed_and_replayed() {
        let f = fixture(FakeApi::new("a0", "r1"));

        let response = f.client.execute(ApiRequest::get("/items")).await.unwrap();
        assert_eq!(body(&response)["token"], "a2");

        let items = f.api.calls_to("/items");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].bearer_token(), Some("a1"));
        assert_eq!(items[0].attempt(), Attempt::First);
        assert_eq!(items[1].headers().get(header::AUTHORIZATION).unwrap(), "Bearer a2");
        assert_eq!(items[1].attempt(), Attempt::Replay);

        // Exactly one refresh, before the replay
        let sent = f.api.sent();
        assert_eq!(f.api.refresh_calls(), 1);
        assert_eq!(sent[1].url(), REFRESH_PATH);
        assert_eq!(sent[2].url(), "/items");

        assert_eq!(f.store.access_token().as_deref(), Some("a2"));
        assert_eq!(f.store.refresh_token().as_deref(), Some("r2"));
    }

    #[tokio::test]
    async fn test_failed_renewal_ends_session() {
        let f = fixture(
            FakeApi::new("a0", "r1")
                .with_refresh(RefreshBehavior::Fail(TransportError::connect("connection refused"))),
        );

        let err = f.client.execute(ApiRequest::get("/items")).await.unwrap_err();
        match err {
            ApiError::RenewalFailed(RenewalError::Transport(e)) => {
                assert_eq!(e, TransportError::connect("connection refused"))
            }
            other => panic!("expected renewal failure, got {:?}", other),
        }

        assert!(!f.client.session().is_authenticated());
        assert_eq!(f.navigator.targets(), vec![DEFAULT_LOGIN_PATH.to_string()]);
        assert_eq!(f.client.renewal_state(), RenewalState::Failed);
        // No replay after a failed renewal
        assert_eq!(f.api.calls_to("/items").len(), 1);
    }

    #[tokio::test]
    async fn test_replay_request_is_not_renewed() {
        let f = fixture(FakeApi::new("a0", "r1"));

        let request = ApiRequest::get("/items").with_attempt(Attempt::Replay);
        let err = f.client.execute(request).await.unwrap_err();

        assert!(matches!(err, ApiError::RetryExhausted(_)));
        assert!(err.is_authorization_failure());
        assert_eq!(f.api.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_second_401_after_renewal_is_terminal() {
        let f = fixture(FakeApi::new("a0", "r1").rejecting_all());

        let err = f.client.execute(ApiRequest::get("/items")).await.unwrap_err();
        assert!(matches!(err, ApiError::RetryExhausted(_)));
        assert_eq!(f.api.refresh_calls(), 1);
        assert_eq!(f.api.calls_to("/items").len(), 2);

        // The renewed session is kept on this path
        assert!(f.store.is_authenticated());
        assert!(f.navigator.targets().is_empty());
    }

    #[tokio::test]
    async fn test_no_refresh_token_propagates_401() {
        let f = fixture(FakeApi::new("a0", "r1"));
        f.store.clear();

        let err = f.client.execute(ApiRequest::get("/items")).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
        assert_eq!(f.api.refresh_calls(), 0);
        assert!(f.api.sent()[0].bearer_token().is_none());
        assert!(f.navigator.targets().is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_never_renews() {
        let f = fixture(FakeApi::new("a0", "r1"));

        let err = f.client.execute(ApiRequest::get("/offline/items")).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(ref e) if e == &TransportError::connect("connection refused")));
        assert_eq!(f.api.refresh_calls(), 0);
        assert!(f.store.is_authenticated());
    }

    #[tokio::test]
    async fn test_concurrent_401s_share_single_use_refresh() {
        let f = fixture(FakeApi::new("a0", "r1").with_refresh_delay(Duration::from_millis(20)));

        let (first, second) = tokio::join!(
            f.client.execute(ApiRequest::get("/items")),
            f.client.execute(ApiRequest::get("/orders")),
        );

        assert_eq!(body(&first.unwrap())["token"], "a2");
        assert_eq!(body(&second.unwrap())["token"], "a2");
        assert_eq!(f.api.refresh_calls(), 1);
        assert!(f.client.session().is_authenticated());
        assert!(f.navigator.targets().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_failures_redirect_once() {
        let f = fixture(
            FakeApi::new("a0", "r1")
                .with_refresh(RefreshBehavior::Status(401))
                .with_refresh_delay(Duration::from_millis(20)),
        );

        let (first, second, third) = tokio::join!(
            f.client.execute(ApiRequest::get("/items")),
            f.client.execute(ApiRequest::get("/orders")),
            f.client.execute(ApiRequest::get("/users/profile")),
        );

        for result in [first, second, third] {
            assert!(result.unwrap_err().ends_session());
        }
        assert_eq!(f.api.refresh_calls(), 1);
        assert_eq!(f.navigator.targets().len(), 1);
        assert!(!f.store.is_authenticated());
    }

    #[test]
    fn test_not_found_maps_to_typed_error() {
        let response = crate::api::testing::respond(404, serde_json::json!({"detail": "missing"}));
        let err = ApiClient::check_response(response).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(ref b) if b.contains("missing")));
        assert!(!err.is_authorization_failure());
    }

    #[tokio::test]
    async fn test_json_helpers() {
        let f = fixture(FakeApi::new("a0", "r1"));

        let value: Value = f.client.get("/items").await.unwrap();
        assert_eq!(value["path"], "/items");

        let value: Value = f
            .client
            .post("/orders", &serde_json::json!({"qty": 2}))
            .await
            .unwrap();
        assert_eq!(value["token"], "a2");

        let posted = f.api.calls_to("/orders");
        assert_eq!(posted[0].body().unwrap()["qty"], 2);
        assert_eq!(
            posted[0].headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn test_decode_failure_is_invalid_response() {
        let response = crate::api::testing::respond(200, serde_json::json!([1, 2, 3]));
        let err = ApiClient::decode::<crate::models::UserProfile>(&response, "/users/profile").unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(ref m) if m.contains("/users/profile")));
    }
}
