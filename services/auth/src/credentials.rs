//! Email/password authentication

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::{
    error::AuthError,
    models::LoginCredentials,
    password::{PasswordProvider, hash_off_thread, verify_off_thread},
    repositories::CredentialStore,
};

/// Hashed once and verified against when the email is unknown
const DUMMY_PASSWORD: &str = "aegis-unknown-account";

/// Identity established by a successful password check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Validates email/password pairs against stored credentials
#[derive(Clone)]
pub struct CredentialAuthenticator {
    credentials: Arc<dyn CredentialStore>,
    passwords: Arc<dyn PasswordProvider>,
    dummy_hash: Arc<OnceCell<String>>,
}

impl CredentialAuthenticator {
    pub fn new(credentials: Arc<dyn CredentialStore>, passwords: Arc<dyn PasswordProvider>) -> Self {
        Self {
            credentials,
            passwords,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// Check a login attempt
    ///
    /// Unknown email and wrong password both yield
    /// [`AuthError::InvalidCredentials`] after one full hash verification, so
    /// neither the error nor the response time tells them apart.
    pub async fn authenticate(
        &self,
        login: &LoginCredentials,
    ) -> Result<AuthenticatedUser, AuthError> {
        let email = login.email.trim();
        if email.is_empty() || login.password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let record = self
            .credentials
            .find_by_email(email)
            .await
            .map_err(AuthError::Internal)?;

        let Some(record) = record else {
            self.verify_unknown_account(&login.password).await?;
            warn!("Rejected password sign-in");
            return Err(AuthError::InvalidCredentials);
        };

        let verified = verify_off_thread(
            self.passwords.clone(),
            login.password.clone(),
            record.password_hash.clone(),
        )
        .await?;

        if !verified {
            warn!("Rejected password sign-in");
            return Err(AuthError::InvalidCredentials);
        }

        info!("Password sign-in accepted for user {}", record.user_id);

        let (first_name, last_name) = split_name(&record.name);
        Ok(AuthenticatedUser {
            user_id: record.user_id,
            email: record.email,
            first_name,
            last_name,
        })
    }

    async fn verify_unknown_account(&self, plaintext: &str) -> Result<(), AuthError> {
        let dummy_hash = self
            .dummy_hash
            .get_or_try_init(|| {
                hash_off_thread(self.passwords.clone(), DUMMY_PASSWORD.to_string())
            })
            .await?;

        verify_off_thread(
            self.passwords.clone(),
            plaintext.to_string(),
            dummy_hash.clone(),
        )
        .await?;
        Ok(())
    }
}

/// Split a display name into first name and the remainder
pub fn split_name(name: &str) -> (String, String) {
    let name = name.trim();
    match name.split_once(char::is_whitespace) {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None => (name.to_string(), String::new()),
    }
}
