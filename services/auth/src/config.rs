//! Service configuration loaded from the environment
//!
//! Everything is read once at startup and validated there; a missing client
//! secret should stop the process, not the first user who tries to sign in.

use anyhow::{Context, Result, bail};
use std::path::PathBuf;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Default session lifetime: 30 days
const DEFAULT_SESSION_MAX_AGE: u64 = 30 * 24 * 60 * 60;

/// Upper bound for configured lifetimes: 10 years
const MAX_LIFETIME: u64 = 10 * 365 * 24 * 60 * 60;

/// OAuth2 client configuration for the external identity provider
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl OAuthConfig {
    /// Create a new OAuthConfig from environment variables
    ///
    /// # Environment Variables
    /// - `GOOGLE_CLIENT_ID`: OAuth client id (required)
    /// - `GOOGLE_CLIENT_SECRET`: OAuth client secret (required)
    /// - `GOOGLE_REDIRECT_URL`: Callback URL registered with the provider
    /// - `GOOGLE_AUTH_URL`, `GOOGLE_TOKEN_URL`, `GOOGLE_USERINFO_URL`: endpoint overrides
    pub fn from_env() -> Result<Self> {
        Ok(OAuthConfig {
            client_id: required_var("GOOGLE_CLIENT_ID")?,
            client_secret: required_var("GOOGLE_CLIENT_SECRET")?,
            redirect_url: var_or(
                "GOOGLE_REDIRECT_URL",
                "http://localhost:3000/auth/google/callback",
            ),
            auth_url: var_or("GOOGLE_AUTH_URL", GOOGLE_AUTH_URL),
            token_url: var_or("GOOGLE_TOKEN_URL", GOOGLE_TOKEN_URL),
            userinfo_url: var_or("GOOGLE_USERINFO_URL", GOOGLE_USERINFO_URL),
        })
    }
}

/// Key material used to sign session tokens
#[derive(Clone)]
pub enum SigningKeys {
    /// HS256 shared secret
    Hmac(String),
    /// RS256 key pair in PEM format
    Rsa {
        private_key: String,
        public_key: String,
    },
}

impl std::fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SigningKeys::Hmac(_) => f.write_str("SigningKeys::Hmac(..)"),
            SigningKeys::Rsa { .. } => f.write_str("SigningKeys::Rsa(..)"),
        }
    }
}

/// Session token configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub keys: SigningKeys,
    /// Session lifetime in seconds, independent of provider token expiry
    pub max_age: u64,
    /// Lifetime stamped on new credential records, in seconds
    pub credential_session_ttl: u64,
}

impl SessionConfig {
    /// Create a new SessionConfig from environment variables
    ///
    /// # Environment Variables
    /// - `SESSION_SECRET`: HS256 signing secret, at least 32 bytes
    /// - `SESSION_PRIVATE_KEY` / `SESSION_PUBLIC_KEY`: RS256 keys (PEM or path), used when no secret is set
    /// - `SESSION_MAX_AGE`: Session lifetime in seconds (default: 2592000, at most 10 years)
    /// - `CREDENTIAL_SESSION_TTL`: Credential record session expiry in seconds (default: `SESSION_MAX_AGE`, at most 10 years)
    pub fn from_env() -> Result<Self> {
        let keys = match optional_var("SESSION_SECRET") {
            Some(secret) => {
                if secret.len() < 32 {
                    bail!("SESSION_SECRET must be at least 32 bytes long");
                }
                SigningKeys::Hmac(secret)
            }
            None => {
                let private_key = required_var("SESSION_PRIVATE_KEY")
                    .context("set SESSION_SECRET or an RS256 key pair")?;
                let public_key = required_var("SESSION_PUBLIC_KEY")
                    .context("set SESSION_SECRET or an RS256 key pair")?;
                SigningKeys::Rsa {
                    private_key: read_key_material(&private_key)?,
                    public_key: read_key_material(&public_key)?,
                }
            }
        };

        let max_age = parse_var("SESSION_MAX_AGE", DEFAULT_SESSION_MAX_AGE)?;
        if max_age == 0 {
            bail!("SESSION_MAX_AGE must be greater than zero");
        }
        if max_age > MAX_LIFETIME {
            bail!("SESSION_MAX_AGE must be at most {} seconds", MAX_LIFETIME);
        }
        let credential_session_ttl = parse_var("CREDENTIAL_SESSION_TTL", max_age)?;
        if credential_session_ttl > MAX_LIFETIME {
            bail!("CREDENTIAL_SESSION_TTL must be at most {} seconds", MAX_LIFETIME);
        }

        Ok(SessionConfig {
            keys,
            max_age,
            credential_session_ttl,
        })
    }
}

/// Top-level service configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub oauth: OAuthConfig,
    pub session: SessionConfig,
    /// Where failed external sign-ins are sent back to
    pub login_route: String,
    /// Where first-time external users finish onboarding
    pub completion_route: String,
    pub bind_address: String,
}

impl AuthConfig {
    /// Create a new AuthConfig from environment variables
    ///
    /// # Environment Variables
    /// - `AUTH_LOGIN_ROUTE`: Login entry point (default: "/login")
    /// - `AUTH_COMPLETION_ROUTE`: Onboarding route for new external users (default: "/complete-profile")
    /// - `BIND_ADDRESS`: Listen address (default: "0.0.0.0:3000")
    pub fn from_env() -> Result<Self> {
        Ok(AuthConfig {
            oauth: OAuthConfig::from_env()?,
            session: SessionConfig::from_env()?,
            login_route: var_or("AUTH_LOGIN_ROUTE", "/login"),
            completion_route: var_or("AUTH_COMPLETION_ROUTE", "/complete-profile"),
            bind_address: var_or("BIND_ADDRESS", "0.0.0.0:3000"),
        })
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required_var(name: &str) -> Result<String> {
    optional_var(name).ok_or_else(|| anyhow::anyhow!("{} environment variable not set", name))
}

fn var_or(name: &str, default: &str) -> String {
    optional_var(name).unwrap_or_else(|| default.to_string())
}

fn parse_var(name: &str, default: u64) -> Result<u64> {
    match optional_var(name) {
        Some(value) => value
            .parse()
            .with_context(|| format!("{} must be a number of seconds, got {:?}", name, value)),
        None => Ok(default),
    }
}

/// Accept inline PEM or a path to a PEM file (CWD first, then the crate root)
fn read_key_material(value: &str) -> Result<String> {
    if value.starts_with("-----BEGIN") {
        return Ok(value.to_string());
    }

    std::fs::read_to_string(value)
        .or_else(|_| {
            let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
            path.push(value);
            std::fs::read_to_string(path)
        })
        .map(|key| key.trim().to_string())
        .with_context(|| format!("Failed to read key file {}", value))
}
