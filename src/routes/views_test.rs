use super::*;
use crate::services::auth::AuthUser;

fn settled(user: Option<AuthUser>) -> SessionState {
    SessionState { user, loading: false, initialized: true, revision: 0 }
}

fn ada() -> AuthUser {
    AuthUser { id: "u1".into(), email: "a@b.com".into(), profile: None }
}

#[test]
fn loading_shows_loader() {
    let decision = resolve_view(&SessionState::initializing(), Some("signin"), None);
    assert_eq!(decision.view, View::Loading);
}

#[test]
fn signed_in_user_gets_dashboard() {
    assert_eq!(resolve_view(&settled(Some(ada())), None, None).view, View::Dashboard);
    assert_eq!(resolve_view(&settled(Some(ada())), Some("signin"), None).view, View::Dashboard);
}

#[test]
fn anonymous_defaults_to_landing() {
    assert_eq!(resolve_view(&settled(None), None, None).view, View::Landing);
    assert_eq!(resolve_view(&settled(None), Some("dashboard"), None).view, View::Landing);
}

#[test]
fn signin_request_shows_sign_in() {
    let decision = resolve_view(&settled(None), Some("signin"), Some("auth"));
    assert_eq!(decision.view, View::SignIn);
    assert_eq!(decision.error.as_deref(), Some("auth"));
}

#[test]
fn error_marker_passes_through_to_landing() {
    let decision = resolve_view(&settled(None), None, Some("config"));
    assert_eq!(decision, ViewDecision { view: View::Landing, error: Some("config".into()) });
}

#[test]
fn view_serializes_lowercase() {
    let decision = ViewDecision { view: View::SignIn, error: None };
    assert_eq!(serde_json::to_value(&decision).unwrap(), serde_json::json!({ "view": "signin" }));
}
