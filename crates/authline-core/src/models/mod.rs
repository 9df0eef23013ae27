//! Wire models for the auth and user services.
//!
//! - Auth: OTP request/verification, token refresh, logout
//! - User: `UserProfile` and `ProfileUpdate`

pub mod auth;
pub mod user;

pub use auth::{
    CheckUserResponse, LogoutResponse, RefreshRequest, RequestOtpRequest, RequestOtpResponse,
    TokenResponse, UserData, VerifyOtpRequest, VerifyOtpResponse,
};
pub use user::{ProfileUpdate, Role, UserProfile};
