//! Auth routes — credential and OAuth flows, session snapshot, callback.

use axum::extract::{FromRef, FromRequestParts, Path, Query, State};
use axum::http::header::ORIGIN;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Redirect, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::gateway::OAuthProvider;
use crate::services::auth::{AuthAdapter, AuthError, AuthUser, SignUpStatus};
use crate::services::session::{SessionPhase, SessionState};
use crate::state::AppState;

// =============================================================================
// ERRORS
// =============================================================================

/// JSON error body `{ "error": <code>, "message": <text> }` with a mapped status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub(crate) fn unauthenticated() -> Self {
        Self { status: StatusCode::UNAUTHORIZED, code: "E_UNAUTHENTICATED", message: "Sign in required.".into() }
    }

    pub(crate) fn cross_origin() -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            code: "E_CROSS_ORIGIN",
            message: "Requests from another origin cannot use this session.".into(),
        }
    }

    pub(crate) fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, code, message: message.into() }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self { status: auth_error_to_status(&err), code: err.error_code(), message: err.user_message() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.code, "message": self.message });
        (self.status, Json(body)).into_response()
    }
}

pub(crate) fn auth_error_to_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AuthError::NotConfigured | AuthError::Unreachable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        AuthError::AuthProvider { .. } => StatusCode::BAD_GATEWAY,
    }
}

// =============================================================================
// AUTH EXTRACTORS
// =============================================================================

/// True when the request names an `Origin` other than the app's own.
/// Requests without the header (same-origin GETs, non-browser clients) pass.
pub(crate) fn is_foreign_origin(headers: &HeaderMap, origin: &str) -> bool {
    headers.get(ORIGIN).is_some_and(|value| {
        value
            .to_str()
            .map_or(true, |v| !v.trim_end_matches('/').eq_ignore_ascii_case(origin))
    })
}

/// Guard for routes that read or change the held session. Cross-origin
/// browser requests are refused even when CORS lets them through.
pub struct SameOrigin;

impl<S> FromRequestParts<S> for SameOrigin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        if is_foreign_origin(&parts.headers, &app_state.origin) {
            warn!(origin = ?parts.headers.get(ORIGIN), "cross-origin session access refused");
            return Err(ApiError::cross_origin());
        }
        Ok(Self)
    }
}

/// The user of the process-wide session. The server holds one gateway
/// session, so identity is whoever signed in last on this (loopback) host;
/// the request only has to come from the app's own origin.
/// Use as a handler parameter to require authentication.
pub struct SignedIn(pub AuthUser);

impl<S> FromRequestParts<S> for SignedIn
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        SameOrigin::from_request_parts(parts, state).await?;
        let app_state = AppState::from_ref(state);
        let user = app_state.session.state().user;
        user.map(Self).ok_or_else(ApiError::unauthenticated)
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Serialize)]
pub struct MeResponse {
    pub phase: SessionPhase,
    #[serde(flatten)]
    pub state: SessionState,
}

/// `GET /api/auth/me` — current session snapshot.
pub async fn me(_: SameOrigin, State(state): State<AppState>) -> Json<MeResponse> {
    let snapshot = state.session.state();
    Json(MeResponse { phase: snapshot.phase(), state: snapshot })
}

#[derive(Deserialize)]
pub struct CredentialsBody {
    pub email: String,
    pub password: String,
}

/// `POST /api/auth/sign-in`
pub async fn sign_in(
    _: SameOrigin,
    State(state): State<AppState>,
    Json(body): Json<CredentialsBody>,
) -> Result<StatusCode, ApiError> {
    state
        .session
        .sign_in(body.email.trim(), &body.password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct SignUpBody {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Serialize)]
pub struct SignUpResponse {
    pub status: SignUpStatus,
}

/// `POST /api/auth/sign-up`
pub async fn sign_up(
    _: SameOrigin,
    State(state): State<AppState>,
    Json(body): Json<SignUpBody>,
) -> Result<Json<SignUpResponse>, ApiError> {
    let status = state
        .session
        .sign_up(body.email.trim(), &body.password, body.full_name.as_deref())
        .await?;
    Ok(Json(SignUpResponse { status }))
}

/// `POST /api/auth/sign-out`
pub async fn sign_out(_: SameOrigin, State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.session.sign_out().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ResetPasswordBody {
    pub email: String,
}

/// `POST /api/auth/reset-password` — send the recovery email.
pub async fn reset_password(
    _: SameOrigin,
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordBody>,
) -> Result<StatusCode, ApiError> {
    state.auth.reset_password(body.email.trim()).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct UpdatePasswordBody {
    pub password: String,
}

/// `POST /api/auth/update-password` — only for the signed-in user.
pub async fn update_password(
    SignedIn(user): SignedIn,
    State(state): State<AppState>,
    Json(body): Json<UpdatePasswordBody>,
) -> Result<StatusCode, ApiError> {
    state.auth.update_password(&body.password).await?;
    info!(user_id = %user.id, "password updated");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /auth/{provider}` — redirect to the provider's authorization page.
pub async fn provider_redirect(State(state): State<AppState>, Path(provider): Path<String>) -> Response {
    let Ok(provider) = provider.parse::<OAuthProvider>() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match state.session.sign_in_with_provider(provider).await {
        Ok(url) => Redirect::temporary(&url).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

// =============================================================================
// CALLBACK
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Where the callback sends the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    SignedIn,
    NoSession,
    Unexpected,
    Config,
}

impl CallbackOutcome {
    #[must_use]
    pub fn location(self) -> &'static str {
        match self {
            Self::SignedIn => "/",
            Self::NoSession => "/?view=signin&error=auth",
            Self::Unexpected => "/?error=unexpected",
            Self::Config => "/?error=config",
        }
    }
}

/// Finish an OAuth redirect: exchange the code if one came back, then ask
/// the gateway whether a session now exists.
pub async fn complete_callback(adapter: &AuthAdapter, query: &CallbackQuery) -> CallbackOutcome {
    if !adapter.is_configured() {
        error!("auth callback reached without gateway configuration");
        return CallbackOutcome::Config;
    }

    if let Some(provider_error) = &query.error {
        warn!(error = %provider_error, description = ?query.error_description, "provider rejected oauth");
        return CallbackOutcome::NoSession;
    }

    if let Some(code) = query.code.as_deref().filter(|c| !c.is_empty()) {
        match adapter.complete_oauth(code).await {
            Ok(()) => {}
            Err(AuthError::NotConfigured | AuthError::Unreachable { .. }) => return CallbackOutcome::Config,
            Err(_) => return CallbackOutcome::NoSession,
        }
    }

    match adapter.has_session().await {
        Ok(true) => {
            info!("auth callback completed");
            CallbackOutcome::SignedIn
        }
        Ok(false) => CallbackOutcome::NoSession,
        Err(AuthError::NotConfigured | AuthError::Unreachable { .. }) => CallbackOutcome::Config,
        Err(e) => {
            error!(error = %e, "auth callback session query failed");
            CallbackOutcome::Unexpected
        }
    }
}

/// `GET /auth/callback`
pub async fn callback(State(state): State<AppState>, Query(query): Query<CallbackQuery>) -> Redirect {
    Redirect::temporary(complete_callback(&state.auth, &query).await.location())
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
