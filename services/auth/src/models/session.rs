//! Session claims and the reduced view exposed to the application

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Role;

/// Claims carried by the signed session token
///
/// `exp` bounds the session itself. `expires_at` bounds the provider access
/// token only; refreshing the access token never moves `exp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Local user id
    pub sub: String,
    pub email: String,
    pub roles: Vec<Role>,
    /// Provider subject id for externally authenticated sessions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Access token expiry, unix seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    /// Session id, the revocation handle
    pub jti: Uuid,
    pub iat: u64,
    pub exp: u64,
}

impl SessionClaims {
    /// Whether the provider access token needs refreshing at `now`
    pub fn access_token_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }

    /// Reduced view handed to the rest of the application
    pub fn view(&self) -> SessionView {
        SessionView {
            roles: self.roles.clone(),
            provider_id: self.provider_id.clone(),
        }
    }
}

/// What downstream handlers get to see of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub roles: Vec<Role>,
    pub provider_id: Option<String>,
}
