//! Error taxonomy for the authentication service
//!
//! Every failure ends in "no session": none of these variants carries a
//! partially trusted session along with it.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Authentication and session errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Unknown email or wrong password, indistinguishable to the caller
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// OAuth code exchange, state check or profile fetch failed
    #[error("Identity provider handshake failed: {0}")]
    ProviderHandshakeFailed(String),

    /// Creating the local user record on first external sign-in failed
    #[error("User provisioning failed: {0}")]
    ProvisioningFailed(String),

    /// Authenticated identity has no local role record
    #[error("Role resolution failed: {0}")]
    RoleResolutionFailed(String),

    /// Provider rejected or could not process the refresh-token exchange
    #[error("Access token refresh failed: {0}")]
    RefreshFailed(String),

    /// Session token is malformed, tampered with, expired or revoked
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Email is already registered")]
    AlreadyRegistered,

    #[error("Too many login attempts")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// Status code and client-facing message; internal detail stays in the logs
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AuthError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "Invalid email or password".to_string(),
            ),
            AuthError::ProviderHandshakeFailed(_) => (
                StatusCode::UNAUTHORIZED,
                "Sign-in with the identity provider failed".to_string(),
            ),
            AuthError::ProvisioningFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not create your account".to_string(),
            ),
            AuthError::RoleResolutionFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Account has no assigned role".to_string(),
            ),
            AuthError::RefreshFailed(_) => (
                StatusCode::UNAUTHORIZED,
                "Session expired, please sign in again".to_string(),
            ),
            AuthError::InvalidSession(_) => {
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            AuthError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AuthError::AlreadyRegistered => (
                StatusCode::CONFLICT,
                "Email is already registered".to_string(),
            ),
            AuthError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many login attempts".to_string(),
            ),
            AuthError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        }
    }
}

impl From<aegis_common::CacheError> for AuthError {
    fn from(err: aegis_common::CacheError) -> Self {
        AuthError::Internal(err.into())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();

        if status.is_server_error() {
            error!("{}", self);
        }

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
