//! Password credentials for the email/password sign-in path

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Stored credential entity
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub user_id: String,
    pub email: String,
    /// Full display name as entered at registration
    pub name: String,
    /// Argon2 PHC string
    pub password_hash: String,
    /// Written at registration; not enforced by the login flow
    pub session_expires_at: Option<DateTime<Utc>>,
}

/// New credential creation payload
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub session_expires_at: Option<DateTime<Utc>>,
}

/// User login credentials
#[derive(Clone, Default, Deserialize)]
pub struct LoginCredentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Self-service registration payload
#[derive(Clone, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}
