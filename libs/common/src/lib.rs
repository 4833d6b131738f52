//! Shared infrastructure for AEGIS services
//!
//! PostgreSQL pooling and migrations, a key-value store abstraction with a
//! Redis backend, and the error types both raise.
//!
//! ```rust,no_run
//! use aegis_common::database::{DatabaseConfig, health_check, init_pool};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from_env()?;
//!     let pool = init_pool(&config).await?;
//!     println!("Database reachable: {}", health_check(&pool).await?);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod database;
pub mod error;

pub use cache::{KeyValueStore, MemoryStore, RedisConfig, RedisPool};
pub use error::{CacheError, DatabaseError};
