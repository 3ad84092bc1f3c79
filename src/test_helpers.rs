//! Scripted gateway and adapter builders shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::GatewaySettings;
use crate::gateway::{
    AuthChange, AuthEvent, AuthSubscription, ChangeFeed, GatewayError, GatewaySession, GatewayUser, OAuthProvider,
    Profile, ProfileStore, ProfileUpdate, SessionGateway, SignUpOutcome,
};
use crate::services::auth::{AuthAdapter, Backend, RedirectTargets};
use crate::services::session::SessionController;
use crate::state::AppState;

// =============================================================================
// MockGateway
// =============================================================================

/// In-memory gateway. Every trait call increments `calls`; queued failures
/// are returned by the next calls in order.
#[derive(Default)]
pub struct MockGateway {
    pub feed: ChangeFeed,
    calls: AtomicUsize,
    profile_calls: AtomicUsize,
    subscribe_calls: AtomicUsize,
    current: Mutex<Option<GatewayUser>>,
    failures: Mutex<VecDeque<GatewayError>>,
    sign_up_outcome: Mutex<Option<SignUpOutcome>>,
    profiles: Mutex<HashMap<String, Profile>>,
    profile_failure: AtomicBool,
    silent: AtomicBool,
    last_redirect: Mutex<Option<String>>,
}

impl MockGateway {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Start with `user` already signed in.
    pub fn with_user(self: &Arc<Self>, user: GatewayUser) -> Arc<Self> {
        *self.current.lock().unwrap() = Some(user);
        Arc::clone(self)
    }

    pub fn fail_next(&self, err: GatewayError) {
        self.failures.lock().unwrap().push_back(err);
    }

    pub fn set_profile(&self, profile: Profile) {
        self.profiles
            .lock()
            .unwrap()
            .insert(profile.id.clone(), profile);
    }

    pub fn fail_profiles(&self) {
        self.profile_failure.store(true, Ordering::SeqCst);
    }

    pub fn script_sign_up(&self, outcome: SignUpOutcome) {
        *self.sign_up_outcome.lock().unwrap() = Some(outcome);
    }

    /// Stop emitting change notifications from sign-in/sign-out calls.
    pub fn quiet(&self) {
        self.silent.store(true, Ordering::SeqCst);
    }

    pub fn emit(&self, change: AuthChange) {
        self.feed.emit(change);
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn last_redirect(&self) -> Option<String> {
        self.last_redirect.lock().unwrap().clone()
    }

    fn record(&self) -> Result<(), GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn notify(&self, change: AuthChange) {
        if !self.silent.load(Ordering::SeqCst) {
            self.feed.emit(change);
        }
    }

    fn start_session(&self, user: GatewayUser) -> GatewaySession {
        *self.current.lock().unwrap() = Some(user.clone());
        self.notify(AuthChange::signed_in(user.clone()));
        session_for(user)
    }
}

#[async_trait::async_trait]
impl SessionGateway for MockGateway {
    async fn current_session(&self) -> Result<Option<GatewaySession>, GatewayError> {
        self.record()?;
        Ok(self.current.lock().unwrap().clone().map(session_for))
    }

    async fn current_user(&self) -> Result<Option<GatewayUser>, GatewayError> {
        self.record()?;
        Ok(self.current.lock().unwrap().clone())
    }

    async fn sign_in_with_password(&self, email: &str, _password: &str) -> Result<GatewaySession, GatewayError> {
        self.record()?;
        Ok(self.start_session(GatewayUser::new(format!("user-{email}"), email)))
    }

    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        metadata: serde_json::Value,
    ) -> Result<SignUpOutcome, GatewayError> {
        self.record()?;
        if let Some(outcome) = self.sign_up_outcome.lock().unwrap().take() {
            return Ok(outcome);
        }
        let mut user = GatewayUser::new(format!("user-{email}"), email);
        user.user_metadata = metadata;
        let session = self.start_session(user.clone());
        Ok(SignUpOutcome { user: Some(user), session: Some(session) })
    }

    async fn sign_out(&self) -> Result<(), GatewayError> {
        self.record()?;
        *self.current.lock().unwrap() = None;
        self.notify(AuthChange::signed_out());
        Ok(())
    }

    async fn authorize_url(&self, provider: OAuthProvider, redirect_to: &str) -> Result<String, GatewayError> {
        self.record()?;
        *self.last_redirect.lock().unwrap() = Some(redirect_to.to_owned());
        Ok(format!("https://gateway.test/authorize?provider={provider}"))
    }

    async fn exchange_code(&self, auth_code: &str) -> Result<GatewaySession, GatewayError> {
        self.record()?;
        Ok(self.start_session(GatewayUser::new(format!("oauth-{auth_code}"), "oauth@example.com")))
    }

    async fn reset_password_for_email(&self, _email: &str, redirect_to: &str) -> Result<(), GatewayError> {
        self.record()?;
        *self.last_redirect.lock().unwrap() = Some(redirect_to.to_owned());
        Ok(())
    }

    async fn update_password(&self, _password: &str) -> Result<GatewayUser, GatewayError> {
        self.record()?;
        let user = self
            .current
            .lock()
            .unwrap()
            .clone()
            .ok_or(GatewayError::SessionMissing)?;
        self.notify(AuthChange::new(AuthEvent::UserUpdated, Some(user.clone())));
        Ok(user)
    }

    fn subscribe(&self) -> AuthSubscription {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.feed.subscribe()
    }
}

#[async_trait::async_trait]
impl ProfileStore for MockGateway {
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>, GatewayError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        self.record()?;
        if self.profile_failure.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("profile store down".into()));
        }
        Ok(self.profiles.lock().unwrap().get(user_id).cloned())
    }

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<Profile, GatewayError> {
        self.record()?;
        let mut profiles = self.profiles.lock().unwrap();
        let entry = profiles
            .entry(user_id.to_owned())
            .or_insert_with(|| profile(user_id, ""));
        if let Some(name) = &update.full_name {
            entry.full_name = Some(name.clone());
        }
        if let Some(done) = update.onboarding_completed {
            entry.onboarding_completed = done;
        }
        if let Some(tz) = &update.timezone {
            entry.timezone = tz.clone();
        }
        Ok(entry.clone())
    }
}

// =============================================================================
// BUILDERS
// =============================================================================

#[must_use]
pub fn session_for(user: GatewayUser) -> GatewaySession {
    GatewaySession {
        access_token: format!("token-{}", user.id),
        refresh_token: Some("refresh".into()),
        expires_at: None,
        expires_in: Some(3600),
        user,
    }
}

#[must_use]
pub fn profile(id: &str, full_name: &str) -> Profile {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "full_name": full_name,
        "timezone": "UTC",
        "theme_preference": "dark",
    }))
    .unwrap()
}

#[must_use]
pub fn configured_settings() -> GatewaySettings {
    GatewaySettings::new(Some("https://project.supabase.test".into()), Some("anon-key".into()))
}

#[must_use]
pub fn redirects() -> RedirectTargets {
    RedirectTargets {
        oauth_callback: format!("{APP_ORIGIN}/auth/callback"),
        password_reset: format!("{APP_ORIGIN}/auth/reset-password"),
    }
}

fn backend(mock: &Arc<MockGateway>) -> Backend {
    let gateway: Arc<dyn SessionGateway> = mock.clone();
    let profiles: Arc<dyn ProfileStore> = mock.clone();
    Backend { gateway, profiles }
}

/// Adapter wired to `mock` with both gateway settings present.
#[must_use]
pub fn adapter_with(mock: &Arc<MockGateway>) -> Arc<AuthAdapter> {
    Arc::new(AuthAdapter::new(configured_settings(), Some(backend(mock)), redirects()))
}

/// Adapter holding `mock` but with gateway settings unset.
#[must_use]
pub fn unconfigured_adapter_with(mock: &Arc<MockGateway>) -> Arc<AuthAdapter> {
    Arc::new(AuthAdapter::new(GatewaySettings::default(), Some(backend(mock)), redirects()))
}

/// App state over `mock` whose controller has finished its initial lookup.
pub async fn ready_state(mock: &Arc<MockGateway>) -> AppState {
    let session = Arc::new(SessionController::start(adapter_with(mock)));
    let mut rx = session.watch();
    tokio::time::timeout(std::time::Duration::from_secs(2), rx.wait_for(|s| s.initialized))
        .await
        .expect("controller did not initialize")
        .expect("session state channel closed");
    AppState::new(session, APP_ORIGIN)
}

/// Origin the test app state treats as its own.
pub const APP_ORIGIN: &str = "http://localhost:3000";

/// Serve `router` on an ephemeral loopback port and return its base URL.
pub async fn serve(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}
