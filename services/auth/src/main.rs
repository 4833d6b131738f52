use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod credentials;
mod error;
mod jwt;
mod middleware;
mod models;
mod oauth;
mod password;
mod provisioning;
mod rate_limiter;
mod repositories;
mod routes;
mod session;
mod sign_in;
mod validation;

#[cfg(test)]
mod test_support;

use aegis_common::{RedisConfig, RedisPool, database};
use tokio::net::TcpListener;

use crate::{
    config::AuthConfig,
    jwt::SessionCodec,
    oauth::GoogleProvider,
    password::Argon2Passwords,
    rate_limiter::{RateLimiter, RateLimiterConfig},
    repositories::{CredentialRepository, UserRepository},
    session::SessionManager,
    sign_in::{SignInDeps, SignInService},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sign_in: Arc<SignInService>,
    pub sessions: Arc<SessionManager>,
    pub login_route: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting authentication service");

    let config = AuthConfig::from_env()?;

    // Database
    let db_config = database::DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    database::run_migrations(&pool, &sqlx::migrate!()).await?;

    // Redis backs pending OAuth state and session revocation
    let redis_config = RedisConfig::from_env()?;
    let redis_pool = Arc::new(RedisPool::new(&redis_config)?);
    if !redis_pool.health_check().await? {
        anyhow::bail!("Failed to connect to Redis");
    }

    let users = Arc::new(UserRepository::new(pool.clone()));
    let credentials = Arc::new(CredentialRepository::new(pool));
    let provider = Arc::new(GoogleProvider::new(&config.oauth)?);
    let codec = SessionCodec::new(&config.session.keys)?;

    let sessions = Arc::new(SessionManager::new(
        codec,
        users.clone(),
        provider.clone(),
        redis_pool.clone(),
        config.session.max_age,
    ));

    let sign_in = SignInService::new(SignInDeps {
        users,
        credentials,
        passwords: Arc::new(Argon2Passwords),
        provider,
        pending: redis_pool,
        sessions: sessions.clone(),
        rate_limiter: RateLimiter::new(RateLimiterConfig::default()),
        completion_route: config.completion_route.clone(),
        credential_session_ttl: config.session.credential_session_ttl,
    });

    let app_state = AppState {
        sign_in: Arc::new(sign_in),
        sessions,
        login_route: config.login_route.clone(),
    };

    info!("Authentication service initialized successfully");

    let app = routes::create_router(app_state);

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("Authentication service listening on {}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
