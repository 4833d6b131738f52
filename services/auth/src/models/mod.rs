//! Authentication service models

pub mod credential;
pub mod role;
pub mod session;
pub mod user;

// Re-export for convenience
pub use credential::{CredentialRecord, LoginCredentials, NewCredential, Registration};
pub use role::Role;
pub use session::{SessionClaims, SessionView};
pub use user::{NewUser, UserRecord};
