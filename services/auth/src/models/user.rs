//! Local user record referenced by session claims

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Role;

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub roles: Vec<Role>,
    /// Set by an administrator once the alumni status has been checked
    pub verified: bool,
    pub google_id: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New user creation payload
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub roles: Vec<Role>,
    pub verified: bool,
    pub google_id: Option<String>,
    pub refresh_token: Option<String>,
}

impl NewUser {
    /// Unverified alumni member, the state every self-service sign-up starts in
    pub fn pending_alumni(email: &str, first_name: &str, last_name: &str) -> Self {
        Self {
            email: email.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            roles: vec![Role::Alumni],
            verified: false,
            google_id: None,
            refresh_token: None,
        }
    }
}
