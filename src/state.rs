//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the auth adapter and the single session controller built at
//! bootstrap; both are shared, never rebuilt per request.
//!
//! `origin` is the app's own origin. Requests from any other origin may not
//! touch the held session.

use std::sync::Arc;

use crate::services::auth::AuthAdapter;
use crate::services::session::SessionController;

/// Clone is required by Axum; every field is Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthAdapter>,
    pub session: Arc<SessionController>,
    pub origin: Arc<str>,
}

impl AppState {
    #[must_use]
    pub fn new(session: Arc<SessionController>, origin: &str) -> Self {
        Self { auth: Arc::clone(session.adapter()), session, origin: Arc::from(origin) }
    }
}
