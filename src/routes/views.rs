//! View routing — which top-level screen the front end should show.
//!
//! The controller decides who is signed in; this module only maps that
//! snapshot plus the requested `?view=` onto a screen. Error markers set by
//! the callback (`?error=`) pass through untouched.

use axum::extract::{Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::services::session::SessionState;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Loading,
    Landing,
    SignIn,
    Dashboard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewDecision {
    pub view: View,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    pub view: Option<String>,
    pub error: Option<String>,
}

/// Loading wins over everything, a signed-in user always lands on the
/// dashboard, and otherwise only an explicit `signin` request leaves the
/// landing page.
#[must_use]
pub fn resolve_view(state: &SessionState, requested: Option<&str>, error: Option<&str>) -> ViewDecision {
    let view = if state.loading {
        View::Loading
    } else if state.user.is_some() {
        View::Dashboard
    } else if requested.is_some_and(|v| v.eq_ignore_ascii_case("signin")) {
        View::SignIn
    } else {
        View::Landing
    };
    let error = error.filter(|e| !e.is_empty()).map(str::to_owned);
    ViewDecision { view, error }
}

/// `GET /api/view`
pub async fn current_view(State(state): State<AppState>, Query(query): Query<ViewQuery>) -> Json<ViewDecision> {
    let snapshot = state.session.state();
    Json(resolve_view(&snapshot, query.view.as_deref(), query.error.as_deref()))
}

#[cfg(test)]
#[path = "views_test.rs"]
mod tests;
