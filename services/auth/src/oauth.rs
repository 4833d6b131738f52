//! OAuth2 integration with the external identity provider
//!
//! Authorization Code flow with PKCE. The authorization URL always asks for
//! `prompt=consent` and `access_type=offline` so the provider hands back a
//! refresh token even when the user has signed in before.

use anyhow::Result;
use async_trait::async_trait;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
    basic::{BasicClient, BasicTokenResponse},
    reqwest::async_http_client,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{config::OAuthConfig, error::AuthError, session::unix_now};

/// Access-token lifetime assumed when the provider omits `expires_in`
const DEFAULT_ACCESS_TOKEN_LIFETIME: u64 = 3600;

const SCOPES: &[&str] = &["openid", "email", "profile"];

/// Provider tokens attached to an externally authenticated session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderTokens {
    pub access_token: String,
    /// Absent when the provider keeps the previous refresh token valid
    pub refresh_token: Option<String>,
    /// Access token expiry, unix seconds
    pub expires_at: u64,
}

/// Identity proven by the provider at the end of the handshake
#[derive(Debug, Clone)]
pub struct ExternalIdentity {
    /// Provider subject id
    pub provider_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub tokens: ProviderTokens,
}

/// Everything needed to send the user to the provider and verify the callback
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub csrf_state: String,
    pub pkce_verifier: String,
}

/// In-flight authorization stored between redirect and callback
#[derive(Debug, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub pkce_verifier: String,
    pub created_at: u64,
}

/// External identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Build the authorization redirect for a new sign-in attempt
    fn authorization_request(&self) -> Result<AuthorizationRequest, AuthError>;

    /// Trade an authorization code for tokens and the user's identity
    async fn exchange_code(
        &self,
        code: String,
        pkce_verifier: String,
    ) -> Result<ExternalIdentity, AuthError>;

    /// Trade a refresh token for a new access token
    async fn refresh(&self, refresh_token: &str) -> Result<ProviderTokens, AuthError>;
}

/// Google OAuth2 client
#[derive(Clone)]
pub struct GoogleProvider {
    client: BasicClient,
    http: reqwest::Client,
    userinfo_url: String,
}

impl GoogleProvider {
    /// Create a new Google provider; malformed endpoint URLs fail here
    pub fn new(config: &OAuthConfig) -> Result<Self> {
        let client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            AuthUrl::new(config.auth_url.clone())?,
            Some(TokenUrl::new(config.token_url.clone())?),
        )
        .set_redirect_uri(RedirectUrl::new(config.redirect_url.clone())?)
        // client_id and client_secret travel in the form body
        .set_auth_type(AuthType::RequestBody);

        Ok(Self {
            client,
            http: reqwest::Client::new(),
            userinfo_url: config.userinfo_url.clone(),
        })
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<GoogleUser, AuthError> {
        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::ProviderHandshakeFailed(format!("userinfo request: {}", e)))?;

        if !response.status().is_success() {
            return Err(AuthError::ProviderHandshakeFailed(format!(
                "userinfo returned {}",
                response.status()
            )));
        }

        response
            .json::<GoogleUser>()
            .await
            .map_err(|e| AuthError::ProviderHandshakeFailed(format!("userinfo body: {}", e)))
    }
}

/// Absolute expiry for a token response, relative to `now`
fn provider_tokens(response: &BasicTokenResponse, now: u64) -> ProviderTokens {
    let lifetime = response
        .expires_in()
        .map(|duration| duration.as_secs())
        .unwrap_or(DEFAULT_ACCESS_TOKEN_LIFETIME);

    ProviderTokens {
        access_token: response.access_token().secret().clone(),
        refresh_token: response.refresh_token().map(|token| token.secret().clone()),
        expires_at: now + lifetime,
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn authorization_request(&self) -> Result<AuthorizationRequest, AuthError> {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut request = self
            .client
            .authorize_url(CsrfToken::new_random)
            .set_pkce_challenge(pkce_challenge)
            .add_extra_param("prompt", "consent")
            .add_extra_param("access_type", "offline");

        for scope in SCOPES {
            request = request.add_scope(Scope::new(scope.to_string()));
        }

        let (auth_url, csrf_token) = request.url();

        Ok(AuthorizationRequest {
            url: auth_url.to_string(),
            csrf_state: csrf_token.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
        })
    }

    async fn exchange_code(
        &self,
        code: String,
        pkce_verifier: String,
    ) -> Result<ExternalIdentity, AuthError> {
        info!("Exchanging authorization code with identity provider");

        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
            .request_async(async_http_client)
            .await
            .map_err(|e| AuthError::ProviderHandshakeFailed(format!("code exchange: {}", e)))?;

        let tokens = provider_tokens(&response, unix_now()?);
        let profile = self.fetch_profile(&tokens.access_token).await?;

        if !profile.verified_email {
            warn!("Identity provider reported an unverified email");
            return Err(AuthError::ProviderHandshakeFailed(
                "email address is not verified with the provider".to_string(),
            ));
        }

        Ok(ExternalIdentity {
            provider_id: profile.id,
            email: profile.email,
            first_name: profile.given_name.unwrap_or_default(),
            last_name: profile.family_name.unwrap_or_default(),
            tokens,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<ProviderTokens, AuthError> {
        info!("Refreshing provider access token");

        let response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        Ok(provider_tokens(&response, unix_now()?))
    }
}

/// Google userinfo response
#[derive(Debug, Deserialize)]
struct GoogleUser {
    id: String,
    email: String,
    #[serde(default)]
    verified_email: bool,
    given_name: Option<String>,
    family_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OAuthConfig {
        OAuthConfig {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            redirect_url: "http://localhost:3000/auth/google/callback".to_string(),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
        }
    }

    #[test]
    fn test_authorization_url_forces_consent_and_offline_access() {
        let provider = GoogleProvider::new(&config()).unwrap();
        let request = provider.authorization_request().unwrap();

        assert!(request.url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(request.url.contains("response_type=code"));
        assert!(request.url.contains("prompt=consent"));
        assert!(request.url.contains("access_type=offline"));
        assert!(request.url.contains("code_challenge_method=S256"));
        assert!(request.url.contains("client_id=client-id"));
        assert!(request.url.contains(&format!("state={}", request.csrf_state)));
        assert!(!request.url.contains("client-secret"));
        assert!(!request.url.contains(&request.pkce_verifier));
    }

    #[test]
    fn test_each_request_gets_fresh_state() {
        let provider = GoogleProvider::new(&config()).unwrap();
        let first = provider.authorization_request().unwrap();
        let second = provider.authorization_request().unwrap();

        assert_ne!(first.csrf_state, second.csrf_state);
        assert_ne!(first.pkce_verifier, second.pkce_verifier);
    }

    #[test]
    fn test_malformed_endpoint_fails_at_construction() {
        let mut config = config();
        config.token_url = "not a url".to_string();

        assert!(GoogleProvider::new(&config).is_err());
    }

    #[test]
    fn test_token_response_expiry_defaults() {
        let response: BasicTokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "new-access",
            "token_type": "Bearer"
        }))
        .unwrap();

        let tokens = provider_tokens(&response, 1_000);
        assert_eq!(tokens.access_token, "new-access");
        assert_eq!(tokens.refresh_token, None);
        assert_eq!(tokens.expires_at, 1_000 + DEFAULT_ACCESS_TOKEN_LIFETIME);
    }

    #[test]
    fn test_token_response_with_rotation() {
        let response: BasicTokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "new-access",
            "refresh_token": "new-refresh",
            "token_type": "Bearer",
            "expires_in": 3599
        }))
        .unwrap();

        let tokens = provider_tokens(&response, 1_000);
        assert_eq!(tokens.refresh_token.as_deref(), Some("new-refresh"));
        assert_eq!(tokens.expires_at, 4_599);
    }
}
