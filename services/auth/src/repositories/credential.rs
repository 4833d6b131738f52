//! Credential repository for database operations

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;

use super::CredentialStore;
use crate::models::{CredentialRecord, NewCredential};

/// Credential repository
#[derive(Clone)]
pub struct CredentialRepository {
    pool: PgPool,
}

impl CredentialRepository {
    /// Create a new credential repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn credential_from_row(row: &PgRow) -> Result<CredentialRecord> {
    Ok(CredentialRecord {
        user_id: row.try_get("user_id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        password_hash: row.try_get("password_hash")?,
        session_expires_at: row.try_get("session_expires_at")?,
    })
}

#[async_trait]
impl CredentialStore for CredentialRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<CredentialRecord>> {
        let row = sqlx::query(
            r#"
            SELECT user_id::text AS user_id, email, name, password_hash, session_expires_at
            FROM credentials
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(credential_from_row).transpose()
    }

    async fn create(&self, new_credential: &NewCredential) -> Result<Option<CredentialRecord>> {
        info!("Creating credential record for user {}", new_credential.user_id);

        let row = sqlx::query(
            r#"
            INSERT INTO credentials (user_id, email, name, password_hash, session_expires_at)
            VALUES ($1::uuid, lower($2), $3, $4, $5)
            ON CONFLICT (email) DO NOTHING
            RETURNING user_id::text AS user_id, email, name, password_hash, session_expires_at
            "#,
        )
        .bind(&new_credential.user_id)
        .bind(&new_credential.email)
        .bind(&new_credential.name)
        .bind(&new_credential.password_hash)
        .bind(new_credential.session_expires_at)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(credential_from_row).transpose()
    }
}
