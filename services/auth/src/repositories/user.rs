//! User repository for database operations

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{info, warn};

use super::UserStore;
use crate::models::{NewUser, Role, UserRecord};

const USER_COLUMNS: &str = "id::text AS id, email, first_name, last_name, roles, verified, \
     google_id, refresh_token, created_at, updated_at";

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &PgRow) -> Result<UserRecord> {
    let role_names: Vec<String> = row.try_get("roles")?;
    let roles = role_names
        .iter()
        .filter_map(|name| match name.parse::<Role>() {
            Ok(role) => Some(role),
            Err(e) => {
                warn!("Ignoring stored role: {}", e);
                None
            }
        })
        .collect();

    Ok(UserRecord {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        roles,
        verified: row.try_get("verified")?,
        google_id: row.try_get("google_id")?,
        refresh_token: row.try_get("refresh_token")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl UserStore for UserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let query = format!("SELECT {} FROM users WHERE lower(email) = lower($1)", USER_COLUMNS);
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn create(&self, new_user: &NewUser) -> Result<Option<UserRecord>> {
        info!("Creating user record");

        let roles: Vec<String> = new_user.roles.iter().map(|r| r.as_str().to_string()).collect();
        let query = format!(
            r#"
            INSERT INTO users (email, first_name, last_name, roles, verified, google_id, refresh_token)
            VALUES (lower($1), $2, $3, $4, $5, $6, $7)
            ON CONFLICT (email) DO NOTHING
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(&new_user.email)
            .bind(&new_user.first_name)
            .bind(&new_user.last_name)
            .bind(&roles)
            .bind(new_user.verified)
            .bind(&new_user.google_id)
            .bind(&new_user.refresh_token)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn delete(&self, user_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1::uuid")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
