//! Session token lifecycle
//!
//! Issuing → Active → Refreshing → Active … → Expired/LoggedOut.
//!
//! Sessions are stateless: every request decodes its own token, refreshes
//! the provider access token at most once when it has expired, and gets the
//! re-encoded token back. Two concurrent requests holding the same expired
//! token will both try to refresh; whichever loses the provider's rotation
//! sees [`AuthError::RefreshFailed`] and the next request uses the new token.

use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use aegis_common::KeyValueStore;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    credentials::AuthenticatedUser,
    error::AuthError,
    jwt::SessionCodec,
    models::{SessionClaims, SessionView, UserRecord},
    oauth::{ExternalIdentity, IdentityProvider, ProviderTokens},
    repositories::UserStore,
};

/// Current unix time in seconds
pub fn unix_now() -> Result<u64, AuthError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .map_err(|e| AuthError::Internal(anyhow::anyhow!("Failed to get current time: {}", e)))
}

fn revocation_key(jti: &Uuid) -> String {
    format!("revoked_session:{}", jti)
}

/// Authenticated identity ready to be turned into a session
#[derive(Debug, Clone)]
pub struct SessionSubject {
    pub user_id: String,
    pub email: String,
    pub provider_id: Option<String>,
    pub tokens: Option<ProviderTokens>,
}

impl From<AuthenticatedUser> for SessionSubject {
    fn from(user: AuthenticatedUser) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email,
            provider_id: None,
            tokens: None,
        }
    }
}

impl SessionSubject {
    /// Subject for an external sign-in backed by an existing local user
    pub fn external(user: &UserRecord, identity: ExternalIdentity) -> Self {
        Self {
            user_id: user.id.clone(),
            email: user.email.clone(),
            provider_id: Some(identity.provider_id),
            tokens: Some(identity.tokens),
        }
    }
}

/// Freshly minted session
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    /// Seconds until the session itself expires
    pub expires_in: u64,
    pub view: SessionView,
}

/// Result of checking a session on an incoming request
#[derive(Debug, Clone)]
pub struct CheckedSession {
    claims: SessionClaims,
    token: String,
    refreshed: bool,
}

impl CheckedSession {
    pub fn view(&self) -> SessionView {
        self.claims.view()
    }

    pub fn user_id(&self) -> &str {
        &self.claims.sub
    }

    /// Token to hand back to the client; unchanged unless a refresh happened
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn refreshed(&self) -> bool {
        self.refreshed
    }
}

/// Issues, checks, refreshes and revokes session tokens
#[derive(Clone)]
pub struct SessionManager {
    codec: SessionCodec,
    users: Arc<dyn UserStore>,
    provider: Arc<dyn IdentityProvider>,
    revocations: Arc<dyn KeyValueStore>,
    max_age: u64,
}

impl SessionManager {
    pub fn new(
        codec: SessionCodec,
        users: Arc<dyn UserStore>,
        provider: Arc<dyn IdentityProvider>,
        revocations: Arc<dyn KeyValueStore>,
        max_age: u64,
    ) -> Self {
        Self {
            codec,
            users,
            provider,
            revocations,
            max_age,
        }
    }

    /// Mint a session for an authenticated subject
    ///
    /// The role is read from the user store at this point; a subject without
    /// a user record or without any role gets no session.
    pub async fn issue(&self, subject: SessionSubject) -> Result<IssuedSession, AuthError> {
        let user = self
            .users
            .find_by_email(&subject.email)
            .await
            .map_err(|e| {
                error!("Role lookup failed: {}", e);
                AuthError::RoleResolutionFailed(e.to_string())
            })?
            .ok_or_else(|| {
                AuthError::RoleResolutionFailed(format!("no user record for {}", subject.user_id))
            })?;

        if user.roles.is_empty() {
            return Err(AuthError::RoleResolutionFailed(format!(
                "user {} has no role",
                user.id
            )));
        }

        let now = unix_now()?;
        let exp = now.checked_add(self.max_age).ok_or_else(|| {
            AuthError::Internal(anyhow::anyhow!(
                "Session lifetime {} overflows the clock",
                self.max_age
            ))
        })?;
        let (access_token, refresh_token, expires_at) = match subject.tokens {
            Some(tokens) => (
                Some(tokens.access_token),
                tokens.refresh_token,
                Some(tokens.expires_at),
            ),
            None => (None, None, None),
        };

        let claims = SessionClaims {
            sub: subject.user_id,
            email: subject.email,
            roles: user.roles,
            provider_id: subject.provider_id,
            access_token,
            refresh_token,
            expires_at,
            jti: Uuid::new_v4(),
            iat: now,
            exp,
        };

        let token = self.codec.encode(&claims)?;
        info!("Issued session {} for user {}", claims.jti, claims.sub);

        Ok(IssuedSession {
            token,
            expires_in: self.max_age,
            view: claims.view(),
        })
    }

    /// Validate a session token, refreshing the provider token if it expired
    pub async fn check(&self, token: &str) -> Result<CheckedSession, AuthError> {
        let claims = self.codec.decode(token)?;

        if self
            .revocations
            .get(&revocation_key(&claims.jti))
            .await?
            .is_some()
        {
            return Err(AuthError::InvalidSession("session was revoked".to_string()));
        }

        self.refresh_if_expired(claims, token, unix_now()?).await
    }

    /// Refresh the provider access token when `now` is past its expiry
    ///
    /// Within the expiry window the claims and the token string come back
    /// untouched and the provider is not called.
    pub async fn refresh_if_expired(
        &self,
        claims: SessionClaims,
        token: &str,
        now: u64,
    ) -> Result<CheckedSession, AuthError> {
        if !claims.access_token_expired(now) {
            return Ok(CheckedSession {
                claims,
                token: token.to_string(),
                refreshed: false,
            });
        }

        let Some(refresh_token) = claims.refresh_token.as_deref() else {
            return Err(AuthError::RefreshFailed(
                "session has no refresh token".to_string(),
            ));
        };

        let tokens = self.provider.refresh(refresh_token).await.map_err(|e| {
            warn!("Access token refresh failed for session {}: {}", claims.jti, e);
            match e {
                AuthError::RefreshFailed(_) => e,
                other => AuthError::RefreshFailed(other.to_string()),
            }
        })?;

        let refreshed = SessionClaims {
            access_token: Some(tokens.access_token),
            refresh_token: tokens.refresh_token.or(claims.refresh_token.clone()),
            expires_at: Some(tokens.expires_at),
            ..claims
        };

        let token = self.codec.encode(&refreshed)?;
        info!("Refreshed access token for session {}", refreshed.jti);

        Ok(CheckedSession {
            claims: refreshed,
            token,
            refreshed: true,
        })
    }

    /// Log out: the token stays cryptographically valid, so remember its id
    /// until it would have expired anyway
    pub async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        let claims = self.codec.decode(token)?;
        let remaining = claims.exp.saturating_sub(unix_now()?);

        self.revocations
            .set(&revocation_key(&claims.jti), "1", Some(remaining))
            .await?;

        info!("Revoked session {}", claims.jti);
        Ok(())
    }
}
