//! Auth and user service endpoints.

use tracing::{info, warn};

use super::client::ApiClient;
use super::request::ApiRequest;
use super::ApiError;
use crate::models::{
    CheckUserResponse, LogoutResponse, ProfileUpdate, RefreshRequest, RequestOtpRequest,
    RequestOtpResponse, UserProfile, VerifyOtpRequest, VerifyOtpResponse,
};

const REQUEST_OTP_PATH: &str = "/auth/request-otp";
const VERIFY_OTP_PATH: &str = "/auth/verify-otp";
const CHECK_USER_PATH: &str = "/auth/check-user";
const LOGOUT_PATH: &str = "/auth/logout";
const PROFILE_PATH: &str = "/users/profile";

impl ApiClient {
    /// Ask the server to send a one-time code to `identifier` (phone or email).
    pub async fn request_otp(&self, identifier: &str) -> Result<RequestOtpResponse, ApiError> {
        let body = RequestOtpRequest {
            identifier: identifier.trim().to_string(),
        };
        let request = ApiRequest::post(REQUEST_OTP_PATH).with_json(Self::encode(&body)?);
        let response = self.execute_once(request).await?;
        Self::decode(&response, REQUEST_OTP_PATH)
    }

    /// Exchange a one-time code for a credential pair and store it.
    pub async fn verify_otp(&self, identifier: &str, otp_code: &str) -> Result<VerifyOtpResponse, ApiError> {
        let body = VerifyOtpRequest {
            identifier: identifier.trim().to_string(),
            otp_code: otp_code.trim().to_string(),
        };
        let request = ApiRequest::post(VERIFY_OTP_PATH).with_json(Self::encode(&body)?);
        let response = self.execute_once(request).await?;
        let verified: VerifyOtpResponse = Self::decode(&response, VERIFY_OTP_PATH)?;

        if verified.access_token.is_empty() || verified.refresh_token.is_empty() {
            return Err(ApiError::InvalidResponse("Verification returned an empty token".into()));
        }
        self.store.set(&verified.access_token, &verified.refresh_token);
        info!(is_new_user = verified.is_new_user, "Logged in");
        Ok(verified)
    }

    /// Ask the server whether the current access token is still accepted.
    pub async fn check_user(&self) -> Result<String, ApiError> {
        let response = self.execute(ApiRequest::post(CHECK_USER_PATH)).await?;
        let checked: CheckUserResponse = Self::decode(&response, CHECK_USER_PATH)?;
        Ok(checked.msg)
    }

    /// Revoke the refresh token on the server and clear local credentials.
    ///
    /// Local credentials are cleared even when the server call fails.
    /// Returns `Ok(None)` when there was no refresh token to revoke.
    pub async fn logout(&self) -> Result<Option<LogoutResponse>, ApiError> {
        let Some(refresh_token) = self.store.refresh_token() else {
            self.store.clear();
            return Ok(None);
        };

        let body = RefreshRequest { refresh_token };
        let outcome = match Self::encode(&body) {
            Ok(json) => self.execute_once(ApiRequest::post(LOGOUT_PATH).with_json(json)).await,
            Err(e) => Err(e),
        };
        self.store.clear();

        match outcome {
            Ok(response) => {
                info!("Logged out");
                Self::decode(&response, LOGOUT_PATH).map(Some)
            }
            Err(e) => {
                warn!(error = %e, "Server logout failed, local credentials cleared");
                Err(e)
            }
        }
    }

    pub async fn fetch_profile(&self) -> Result<UserProfile, ApiError> {
        self.get(PROFILE_PATH).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, ApiError> {
        self.patch(PROFILE_PATH, update).await
    }
}
