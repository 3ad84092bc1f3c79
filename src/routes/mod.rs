//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! JSON API routes for the front end plus the two browser-facing redirects
//! of the OAuth flow (`/auth/{provider}` out, `/auth/callback` back).

pub mod auth;
pub mod profile;
pub mod views;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router. `cors_allow_any` opens the API to any
/// origin for a front end served from a separate dev server.
pub fn app(state: AppState, cors_allow_any: bool) -> Router {
    let router = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/sign-in", post(auth::sign_in))
        .route("/api/auth/sign-up", post(auth::sign_up))
        .route("/api/auth/sign-out", post(auth::sign_out))
        .route("/api/auth/reset-password", post(auth::reset_password))
        .route("/api/auth/update-password", post(auth::update_password))
        .route("/auth/callback", get(auth::callback))
        .route("/auth/{provider}", get(auth::provider_redirect))
        .route("/api/view", get(views::current_view))
        .route("/api/profile", patch(profile::update_profile))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http());

    let router = if cors_allow_any {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router.layer(cors)
    } else {
        router
    };

    router.with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
