//! Persistence seams for users and credentials
//!
//! The traits are what the authenticators and the provisioning gate depend
//! on; the Postgres types implement them with `sqlx`.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{CredentialRecord, NewCredential, NewUser, UserRecord};

pub mod credential;
pub mod user;

pub use credential::CredentialRepository;
pub use user::UserRepository;

/// Lookup and creation of local user records
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a user by email (case-insensitive)
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    /// Create a user; `None` means a user with this email already exists
    async fn create(&self, new_user: &NewUser) -> Result<Option<UserRecord>>;

    /// Remove a user by id, returning whether it existed
    async fn delete(&self, user_id: &str) -> Result<bool>;
}

/// Lookup and creation of password credentials
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find a credential by email (case-insensitive)
    async fn find_by_email(&self, email: &str) -> Result<Option<CredentialRecord>>;

    /// Create a credential; `None` means one already exists for this email
    async fn create(&self, new_credential: &NewCredential) -> Result<Option<CredentialRecord>>;
}
