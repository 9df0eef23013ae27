use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct RequestOtpRequest {
    pub identifier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestOtpResponse {
    pub message: String,
    pub identifier_type: String,
    /// Only populated by development servers
    #[serde(default)]
    pub otp_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyOtpRequest {
    pub identifier: String,
    pub otp_code: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserData {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Clone, Deserialize)]
pub struct VerifyOtpResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub user_data: UserData,
    #[serde(default)]
    pub is_new_user: bool,
}

impl fmt::Debug for VerifyOtpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifyOtpResponse")
            .field("user_data", &self.user_data)
            .field("is_new_user", &self.is_new_user)
            .finish_non_exhaustive()
    }
}

/// Body sent to the refresh and logout endpoints.
#[derive(Clone, Serialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Fresh credential pair returned by the refresh endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenResponse {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenResponse { .. }")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub msg: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckUserResponse {
    pub msg: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verify_response() {
        let json = r#"{"access_token":"a1","refresh_token":"r1","user_data":{"name":"Sara","avatar_url":null},"is_new_user":false}"#;
        let resp: VerifyOtpResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.access_token, "a1");
        assert_eq!(resp.user_data.name.as_deref(), Some("Sara"));
        assert!(!resp.is_new_user);
        assert!(!format!("{:?}", resp).contains("a1"));
    }

    #[test]
    fn test_parse_request_otp_without_code() {
        let json = r#"{"message":"OTP sent","identifier_type":"phone"}"#;
        let resp: RequestOtpResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.identifier_type, "phone");
        assert!(resp.otp_code.is_none());
    }

    #[test]
    fn test_token_response_requires_both_fields() {
        assert!(serde_json::from_str::<TokenResponse>(r#"{"access_token":"a2"}"#).is_err());
    }
}
