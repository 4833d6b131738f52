//! Session middleware for routes that need an authenticated caller

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use tracing::warn;

use crate::{AppState, error::AuthError, models::SessionView};

/// Response header carrying a session token re-issued after a refresh
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";

/// Session attached to the request by [`require_session`]
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub user_id: String,
    pub view: SessionView,
    /// Token as it stands after any refresh, used for logout
    pub token: String,
}

/// Validate the bearer session token and expose the session to handlers
///
/// When the provider access token had to be refreshed, the re-encoded
/// session token is returned in [`SESSION_TOKEN_HEADER`].
pub async fn require_session(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let TypedHeader(Authorization(bearer)) =
        bearer.ok_or_else(|| AuthError::InvalidSession("missing bearer token".to_string()))?;

    let checked = state.sessions.check(bearer.token()).await.map_err(|e| {
        warn!("Rejected session: {}", e);
        e
    })?;

    let refreshed_token = checked.refreshed().then(|| checked.token().to_string());

    req.extensions_mut().insert(CurrentSession {
        user_id: checked.user_id().to_string(),
        view: checked.view(),
        token: checked.token().to_string(),
    });

    let mut response = next.run(req).await;

    if let Some(token) = refreshed_token {
        let value = HeaderValue::from_str(&token)
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("Invalid session header: {}", e)))?;
        response.headers_mut().insert(SESSION_TOKEN_HEADER, value);
    }

    Ok(response)
}
