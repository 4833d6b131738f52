//! Error types for the shared infrastructure layer
//!
//! Services wrap these into their own error enums; the variants here only
//! describe what went wrong talking to PostgreSQL or Redis.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Errors raised while configuring or talking to PostgreSQL
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Could not establish a connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// A query failed to execute
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Applying schema migrations failed
    #[error("Database migration error: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),

    /// Invalid or missing configuration
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

/// Errors raised by key-value store backends
#[derive(Error, Debug)]
pub enum CacheError {
    /// Redis client or command failure
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Invalid or missing configuration
    #[error("Cache configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Type alias for Result with CacheError
pub type CacheResult<T> = Result<T, CacheError>;
