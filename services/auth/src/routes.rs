//! Authentication service routes

use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    AppState,
    error::AuthError,
    middleware::{CurrentSession, require_session},
    models::{LoginCredentials, Registration},
    session::IssuedSession,
    sign_in::SignInOutcome,
};

/// Response for a newly issued session
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub session_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

impl From<IssuedSession> for TokenResponse {
    fn from(session: IssuedSession) -> Self {
        Self {
            session_token: session.token,
            token_type: "Bearer".to_string(),
            expires_in: session.expires_in,
        }
    }
}

/// Response for a successful registration
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: String,
    pub message: String,
}

/// Query parameters the provider appends to the callback URL
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/auth/session", get(current_session))
        .route("/auth/logout", post(logout))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/google", get(google_login))
        .route("/auth/google/callback", get(google_callback))
        .merge(protected)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "aegis-auth"
    }))
}

/// Registration endpoint
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<Registration>,
) -> Result<impl IntoResponse, AuthError> {
    let user = state.sign_in.register(&payload).await?;

    let response = RegisterResponse {
        user_id: user.id,
        message: "Registration received; an administrator will verify your alumni status"
            .to_string(),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// Email/password login endpoint
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginCredentials>,
) -> Result<impl IntoResponse, AuthError> {
    let session = state.sign_in.sign_in_with_password(&payload).await?;
    Ok((StatusCode::OK, Json(TokenResponse::from(session))))
}

/// Redirect to the identity provider
pub async fn google_login(State(state): State<AppState>) -> Result<Redirect, AuthError> {
    let url = state.sign_in.begin_external().await?;
    Ok(Redirect::to(&url))
}

/// Provider callback endpoint
///
/// Handshake failures send the user back to the login page instead of
/// returning an error body, since this URL is hit by a browser redirect.
pub async fn google_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, AuthError> {
    let login_failed = Redirect::to(&format!("{}?error=OAuthCallback", state.login_route));

    if let Some(error) = params.error {
        warn!("Identity provider returned an error: {}", error);
        return Ok(login_failed.into_response());
    }

    let (Some(code), Some(csrf_state)) = (params.code, params.state) else {
        warn!("Callback without code or state");
        return Ok(login_failed.into_response());
    };

    match state.sign_in.complete_external(code, &csrf_state).await {
        Ok(SignInOutcome::Session(session)) => {
            Ok((StatusCode::OK, Json(TokenResponse::from(session))).into_response())
        }
        Ok(SignInOutcome::CompleteProfile {
            user_id,
            redirect_to,
        }) => {
            info!("Redirecting user {} to onboarding", user_id);
            Ok(Redirect::to(&redirect_to).into_response())
        }
        Err(AuthError::ProviderHandshakeFailed(reason)) => {
            warn!("External sign-in failed: {}", reason);
            Ok(login_failed.into_response())
        }
        Err(e) => Err(e),
    }
}

/// Current session endpoint
pub async fn current_session(Extension(session): Extension<CurrentSession>) -> impl IntoResponse {
    Json(session.view)
}

/// Logout endpoint
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Result<impl IntoResponse, AuthError> {
    state.sessions.revoke(&session.token).await?;
    info!("User {} logged out", session.user_id);

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({"message": "Logged out successfully"})),
    ))
}
