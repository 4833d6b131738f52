//! Sign-in orchestration
//!
//! Each flow is the same three explicit steps:
//! authenticate → provision-or-proceed → issue-claims.

use std::sync::Arc;

use aegis_common::KeyValueStore;
use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};

use crate::{
    credentials::CredentialAuthenticator,
    error::AuthError,
    models::{LoginCredentials, NewCredential, NewUser, Registration, UserRecord},
    oauth::{IdentityProvider, PendingAuthorization},
    password::{PasswordProvider, hash_off_thread},
    provisioning::{ProvisioningDecision, ProvisioningGate},
    rate_limiter::RateLimiter,
    repositories::{CredentialStore, UserStore},
    session::{IssuedSession, SessionManager, SessionSubject, unix_now},
    validation,
};

/// How long a user may take between the provider redirect and the callback
const PENDING_AUTHORIZATION_TTL: u64 = 600;

fn pending_key(state: &str) -> String {
    format!("oauth_state:{}", state)
}

/// Result of an external sign-in
#[derive(Debug, Clone)]
pub enum SignInOutcome {
    Session(IssuedSession),
    /// First sign-in; onboarding must be finished before a session is issued
    CompleteProfile { user_id: String, redirect_to: String },
}

/// Collaborators the orchestrator is assembled from
pub struct SignInDeps {
    pub users: Arc<dyn UserStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub passwords: Arc<dyn PasswordProvider>,
    pub provider: Arc<dyn IdentityProvider>,
    pub pending: Arc<dyn KeyValueStore>,
    pub sessions: Arc<SessionManager>,
    pub rate_limiter: RateLimiter,
    pub completion_route: String,
    pub credential_session_ttl: u64,
}

/// Composes the authenticators, the provisioning gate and the session manager
#[derive(Clone)]
pub struct SignInService {
    authenticator: CredentialAuthenticator,
    gate: ProvisioningGate,
    users: Arc<dyn UserStore>,
    credentials: Arc<dyn CredentialStore>,
    passwords: Arc<dyn PasswordProvider>,
    provider: Arc<dyn IdentityProvider>,
    pending: Arc<dyn KeyValueStore>,
    sessions: Arc<SessionManager>,
    rate_limiter: RateLimiter,
    credential_session_ttl: u64,
}

impl SignInService {
    pub fn new(deps: SignInDeps) -> Self {
        Self {
            authenticator: CredentialAuthenticator::new(
                deps.credentials.clone(),
                deps.passwords.clone(),
            ),
            gate: ProvisioningGate::new(deps.users.clone(), deps.completion_route),
            users: deps.users,
            credentials: deps.credentials,
            passwords: deps.passwords,
            provider: deps.provider,
            pending: deps.pending,
            sessions: deps.sessions,
            rate_limiter: deps.rate_limiter,
            credential_session_ttl: deps.credential_session_ttl,
        }
    }

    /// Email/password sign-in
    pub async fn sign_in_with_password(
        &self,
        login: &LoginCredentials,
    ) -> Result<IssuedSession, AuthError> {
        let key = login.email.trim().to_lowercase();
        if !self.rate_limiter.is_allowed(&key).await {
            warn!("Password sign-in rate limited");
            return Err(AuthError::RateLimited);
        }

        let user = self.authenticator.authenticate(login).await?;
        self.sessions.issue(SessionSubject::from(user)).await
    }

    /// Start an external sign-in and return the provider URL to redirect to
    pub async fn begin_external(&self) -> Result<String, AuthError> {
        let request = self.provider.authorization_request()?;
        let pending = PendingAuthorization {
            pkce_verifier: request.pkce_verifier,
            created_at: unix_now()?,
        };
        let value = serde_json::to_string(&pending)
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("Failed to encode state: {}", e)))?;

        self.pending
            .set(
                &pending_key(&request.csrf_state),
                &value,
                Some(PENDING_AUTHORIZATION_TTL),
            )
            .await?;

        Ok(request.url)
    }

    /// Finish an external sign-in from the provider callback
    pub async fn complete_external(
        &self,
        code: String,
        state: &str,
    ) -> Result<SignInOutcome, AuthError> {
        let pending = self
            .pending
            .take(&pending_key(state))
            .await?
            .ok_or_else(|| {
                AuthError::ProviderHandshakeFailed("unknown or reused state".to_string())
            })?;
        let pending: PendingAuthorization = serde_json::from_str(&pending)
            .map_err(|e| AuthError::ProviderHandshakeFailed(format!("corrupt state: {}", e)))?;

        let identity = self
            .provider
            .exchange_code(code, pending.pkce_verifier)
            .await
            .map_err(|e| match e {
                AuthError::ProviderHandshakeFailed(_) => e,
                other => AuthError::ProviderHandshakeFailed(other.to_string()),
            })?;

        match self.gate.provision_or_proceed(&identity).await? {
            ProvisioningDecision::Proceed(user) => {
                let session = self
                    .sessions
                    .issue(SessionSubject::external(&user, identity))
                    .await?;
                Ok(SignInOutcome::Session(session))
            }
            ProvisioningDecision::CompleteProfile { user, redirect_to } => {
                info!("User {} must complete onboarding", user.id);
                Ok(SignInOutcome::CompleteProfile {
                    user_id: user.id,
                    redirect_to,
                })
            }
        }
    }

    /// Create a pending alumni user with password credentials
    pub async fn register(&self, registration: &Registration) -> Result<UserRecord, AuthError> {
        let email = registration.email.trim().to_lowercase();
        let first_name = registration.first_name.trim();
        let last_name = registration.last_name.trim();

        validation::validate_email(&email).map_err(AuthError::Validation)?;
        validation::validate_password(&registration.password).map_err(AuthError::Validation)?;
        validation::validate_name(first_name).map_err(AuthError::Validation)?;

        // Externally provisioned users count too
        if self.credentials.find_by_email(&email).await?.is_some()
            || self.users.find_by_email(&email).await?.is_some()
        {
            return Err(AuthError::AlreadyRegistered);
        }

        let password_hash =
            hash_off_thread(self.passwords.clone(), registration.password.clone()).await?;
        let session_expires_at = self.credential_session_expiry()?;

        let user = self
            .users
            .create(&NewUser::pending_alumni(&email, first_name, last_name))
            .await?
            .ok_or(AuthError::AlreadyRegistered)?;

        let name = format!("{} {}", first_name, last_name).trim().to_string();

        let credential = NewCredential {
            user_id: user.id.clone(),
            email,
            name,
            password_hash,
            session_expires_at: Some(session_expires_at),
        };

        // No user row outlives a failed credential insert
        match self.credentials.create(&credential).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.discard_user(&user).await;
                return Err(AuthError::AlreadyRegistered);
            }
            Err(e) => {
                self.discard_user(&user).await;
                return Err(AuthError::Internal(e));
            }
        }

        info!("Registered password credentials for user {}", user.id);
        Ok(user)
    }

    fn credential_session_expiry(&self) -> Result<DateTime<Utc>, AuthError> {
        i64::try_from(self.credential_session_ttl)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| {
                AuthError::Internal(anyhow::anyhow!(
                    "Credential session lifetime {} is out of range",
                    self.credential_session_ttl
                ))
            })
    }

    async fn discard_user(&self, user: &UserRecord) {
        match self.users.delete(&user.id).await {
            Ok(_) => warn!("Rolled back user {} after credential creation failed", user.id),
            Err(e) => error!("Failed to roll back user {}: {}", user.id, e),
        }
    }
}
