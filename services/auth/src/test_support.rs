//! In-memory stores and a scripted identity provider for unit tests

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;

use aegis_common::MemoryStore;

use crate::{
    AppState,
    config::SigningKeys,
    error::AuthError,
    jwt::SessionCodec,
    models::{CredentialRecord, NewCredential, NewUser, Role, UserRecord},
    oauth::{AuthorizationRequest, ExternalIdentity, IdentityProvider, ProviderTokens},
    password::{Argon2Passwords, PasswordProvider},
    rate_limiter::{RateLimiter, RateLimiterConfig},
    repositories::{CredentialStore, UserStore},
    session::SessionManager,
    sign_in::{SignInDeps, SignInService},
};

/// Password of the credential seeded by [`app_state`]
pub const PASSWORD: &str = "Correct-Horse-9";

pub fn user(id: &str, email: &str, roles: Vec<Role>) -> UserRecord {
    UserRecord {
        id: id.to_string(),
        email: email.to_string(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        roles,
        verified: true,
        google_id: None,
        refresh_token: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn credential(user_id: &str, email: &str, name: &str, password: &str) -> CredentialRecord {
    CredentialRecord {
        user_id: user_id.to_string(),
        email: email.to_string(),
        name: name.to_string(),
        password_hash: Argon2Passwords.hash(password).unwrap(),
        session_expires_at: None,
    }
}

pub fn external_identity(provider_id: &str, email: &str, expires_at: u64) -> ExternalIdentity {
    ExternalIdentity {
        provider_id: provider_id.to_string(),
        email: email.to_string(),
        first_name: "New".to_string(),
        last_name: "Alumnus".to_string(),
        tokens: ProviderTokens {
            access_token: format!("access-{}", provider_id),
            refresh_token: Some(format!("refresh-{}", provider_id)),
            expires_at,
        },
    }
}

#[derive(Default)]
pub struct MemoryUsers {
    users: Mutex<Vec<UserRecord>>,
    creates: AtomicUsize,
    fail_creates: AtomicBool,
    fail_finds: AtomicBool,
    racing_insert: Mutex<Option<UserRecord>>,
}

impl MemoryUsers {
    pub fn with(users: Vec<UserRecord>) -> Arc<Self> {
        Arc::new(Self {
            users: Mutex::new(users),
            ..Self::default()
        })
    }

    pub fn add(&self, user: UserRecord) {
        self.users.lock().unwrap().push(user);
    }

    pub fn count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn find(&self, email: &str) -> Option<UserRecord> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    pub fn fail_creates(&self) {
        self.fail_creates.store(true, Ordering::SeqCst);
    }

    pub fn fail_finds(&self) {
        self.fail_finds.store(true, Ordering::SeqCst);
    }

    /// Simulate another request inserting `user` between our lookup and insert
    pub fn insert_before_next_create(&self, user: UserRecord) {
        *self.racing_insert.lock().unwrap() = Some(user);
    }
}

#[async_trait]
impl UserStore for MemoryUsers {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        if self.fail_finds.load(Ordering::SeqCst) {
            bail!("user store unavailable");
        }
        Ok(self.find(email.trim()))
    }

    async fn create(&self, new_user: &NewUser) -> Result<Option<UserRecord>> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_creates.load(Ordering::SeqCst) {
            bail!("user store unavailable");
        }
        if let Some(winner) = self.racing_insert.lock().unwrap().take() {
            self.add(winner);
        }
        if self.find(&new_user.email).is_some() {
            return Ok(None);
        }

        let record = UserRecord {
            id: format!("user-{}", self.count() + 1),
            email: new_user.email.to_lowercase(),
            first_name: new_user.first_name.clone(),
            last_name: new_user.last_name.clone(),
            roles: new_user.roles.clone(),
            verified: new_user.verified,
            google_id: new_user.google_id.clone(),
            refresh_token: new_user.refresh_token.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.add(record.clone());
        Ok(Some(record))
    }

    async fn delete(&self, user_id: &str) -> Result<bool> {
        let mut users = self.users.lock().unwrap();
        let before = users.len();
        users.retain(|user| user.id != user_id);
        Ok(users.len() < before)
    }
}

#[derive(Default)]
pub struct MemoryCredentials {
    credentials: Mutex<Vec<CredentialRecord>>,
    lookups: AtomicUsize,
    fail_next: AtomicBool,
    fail_next_create: AtomicBool,
}

impl MemoryCredentials {
    pub fn with(credentials: Vec<CredentialRecord>) -> Arc<Self> {
        Arc::new(Self {
            credentials: Mutex::new(credentials),
            ..Self::default()
        })
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }

    pub fn find(&self, email: &str) -> Option<CredentialRecord> {
        self.credentials
            .lock()
            .unwrap()
            .iter()
            .find(|credential| credential.email.eq_ignore_ascii_case(email))
            .cloned()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentials {
    async fn find_by_email(&self, email: &str) -> Result<Option<CredentialRecord>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            bail!("credential store unavailable");
        }
        Ok(self.find(email.trim()))
    }

    async fn create(&self, new_credential: &NewCredential) -> Result<Option<CredentialRecord>> {
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            bail!("credential store unavailable");
        }
        if self.find(&new_credential.email).is_some() {
            return Ok(None);
        }

        let record = CredentialRecord {
            user_id: new_credential.user_id.clone(),
            email: new_credential.email.to_lowercase(),
            name: new_credential.name.clone(),
            password_hash: new_credential.password_hash.clone(),
            session_expires_at: new_credential.session_expires_at,
        };
        self.credentials.lock().unwrap().push(record.clone());
        Ok(Some(record))
    }
}

/// Identity provider whose answers are set by the test
pub struct FakeProvider {
    identity: Mutex<Option<ExternalIdentity>>,
    refresh_result: Mutex<Option<ProviderTokens>>,
    refresh_calls: AtomicUsize,
    last_refresh_token: Mutex<Option<String>>,
    requests: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            identity: Mutex::new(None),
            refresh_result: Mutex::new(Some(ProviderTokens {
                access_token: "refreshed-access".to_string(),
                refresh_token: Some("rotated-refresh".to_string()),
                expires_at: u64::MAX / 2,
            })),
            refresh_calls: AtomicUsize::new(0),
            last_refresh_token: Mutex::new(None),
            requests: AtomicUsize::new(0),
        })
    }

    /// Make the next code exchange succeed with `identity`
    pub fn sign_in_as(&self, identity: ExternalIdentity) {
        *self.identity.lock().unwrap() = Some(identity);
    }

    pub fn succeed_refresh_with(&self, tokens: ProviderTokens) {
        *self.refresh_result.lock().unwrap() = Some(tokens);
    }

    pub fn fail_refresh(&self) {
        *self.refresh_result.lock().unwrap() = None;
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn last_refresh_token(&self) -> Option<String> {
        self.last_refresh_token.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn authorization_request(&self) -> Result<AuthorizationRequest, AuthError> {
        let n = self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(AuthorizationRequest {
            url: format!("https://provider.test/auth?state=state-{}", n),
            csrf_state: format!("state-{}", n),
            pkce_verifier: format!("verifier-{}", n),
        })
    }

    async fn exchange_code(
        &self,
        _code: String,
        _pkce_verifier: String,
    ) -> Result<ExternalIdentity, AuthError> {
        self.identity
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| AuthError::ProviderHandshakeFailed("invalid_grant".to_string()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<ProviderTokens, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_refresh_token.lock().unwrap() = Some(refresh_token.to_string());
        self.refresh_result
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AuthError::RefreshFailed("invalid_grant".to_string()))
    }
}

/// Application state over in-memory stores, seeded with one alumni
/// credential for `a@x.com`
pub fn app_state() -> (AppState, Arc<FakeProvider>) {
    let codec = SessionCodec::new(&SigningKeys::Hmac(
        "routes-test-secret-routes-test-secret".to_string(),
    ))
    .unwrap();
    let provider = FakeProvider::new();
    let users = MemoryUsers::with(vec![user("u1", "a@x.com", vec![Role::Alumni])]);
    let credentials =
        MemoryCredentials::with(vec![credential("u1", "a@x.com", "Ada Lovelace", PASSWORD)]);
    let store = Arc::new(MemoryStore::new());
    let sessions = Arc::new(SessionManager::new(
        codec,
        users.clone(),
        provider.clone(),
        store.clone(),
        3600,
    ));

    let sign_in = SignInService::new(SignInDeps {
        users,
        credentials,
        passwords: Arc::new(Argon2Passwords),
        provider: provider.clone(),
        pending: store,
        sessions: sessions.clone(),
        rate_limiter: RateLimiter::new(RateLimiterConfig::default()),
        completion_route: "/complete-profile".to_string(),
        credential_session_ttl: 600,
    });

    let state = AppState {
        sign_in: Arc::new(sign_in),
        sessions,
        login_route: "/login".to_string(),
    };
    (state, provider)
}
