//! Password hashing

use std::sync::Arc;

use anyhow::Result;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use tracing::warn;

/// Hashes and verifies plaintext passwords
pub trait PasswordProvider: Send + Sync {
    /// Produce a self-describing hash for storage
    fn hash(&self, plaintext: &str) -> Result<String>;

    /// Check a plaintext password against a stored hash
    fn verify(&self, plaintext: &str, hash: &str) -> bool;
}

/// Argon2id with the crate's default parameters
#[derive(Debug, Clone, Default)]
pub struct Argon2Passwords;

impl PasswordProvider for Argon2Passwords {
    fn hash(&self, plaintext: &str) -> Result<String> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        let hash = Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, plaintext: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Stored password hash could not be parsed: {}", e);
                return false;
            }
        };

        Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

/// [`PasswordProvider::hash`] on the blocking thread pool
pub async fn hash_off_thread(
    passwords: Arc<dyn PasswordProvider>,
    plaintext: String,
) -> Result<String> {
    tokio::task::spawn_blocking(move || passwords.hash(&plaintext))
        .await
        .map_err(|e| anyhow::anyhow!("Password hashing task failed: {}", e))?
}

/// [`PasswordProvider::verify`] on the blocking thread pool
pub async fn verify_off_thread(
    passwords: Arc<dyn PasswordProvider>,
    plaintext: String,
    hash: String,
) -> Result<bool> {
    tokio::task::spawn_blocking(move || passwords.verify(&plaintext, &hash))
        .await
        .map_err(|e| anyhow::anyhow!("Password verification task failed: {}", e))
}
