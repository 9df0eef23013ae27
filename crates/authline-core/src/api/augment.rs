use std::sync::Arc;

use reqwest::header::{self, HeaderValue};
use tracing::warn;

use super::request::ApiRequest;
use crate::auth::CredentialStore;
use crate::locale::LocaleStore;

/// Adds the stored access token and the active locale to every outbound
/// pipeline request. Never fails: without a token the request goes out
/// unauthenticated and the server decides.
#[derive(Debug, Clone)]
pub struct RequestAugmenter {
    store: Arc<CredentialStore>,
    locale: Arc<LocaleStore>,
}

impl RequestAugmenter {
    pub fn new(store: Arc<CredentialStore>, locale: Arc<LocaleStore>) -> Self {
        Self { store, locale }
    }

    pub fn augment(&self, request: ApiRequest) -> ApiRequest {
        let request = match self.store.access_token() {
            Some(token) => request.with_bearer(&token),
            None => request,
        };

        let locale = self.locale.get();
        match HeaderValue::from_str(&locale) {
            Ok(value) => request.with_header(header::ACCEPT_LANGUAGE, value),
            Err(_) => {
                warn!(locale = %locale, "Locale is not a valid header value");
                request
            }
        }
    }
}
