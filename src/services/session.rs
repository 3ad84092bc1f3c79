//! Session controller — observable auth state for the whole process.
//!
//! ARCHITECTURE
//! ============
//! One controller is built at bootstrap and shared through `AppState`. It
//! owns the only change-notification subscription and a worker task that
//! applies notifications one at a time, in arrival order, publishing each
//! result on a `watch` channel. The first `get_current_user` resolution is
//! applied before any queued notification.
//!
//! DESIGN
//! ======
//! Explicit operations (`sign_in`, `sign_up`, `sign_out`, provider sign-in)
//! raise `loading` and then wait for the notification stream to settle it.
//! The user is never written from a call's return value. Each operation
//! takes a monotonic token; a failing call only clears `loading` when no
//! newer operation has started since.
//!
//! ERROR HANDLING
//! ==============
//! The controller never fails. An initial lookup error resolves to
//! unauthenticated, and a notification that cannot be resolved is logged and
//! skipped without touching the current user.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::gateway::{AuthChange, AuthSubscription, OAuthProvider, Profile, ProfileUpdate};
use crate::services::auth::{AuthAdapter, AuthError, AuthUser, SignUpStatus};

// =============================================================================
// STATE
// =============================================================================

/// Snapshot published to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub user: Option<AuthUser>,
    pub loading: bool,
    /// Set once the first current-user lookup has been applied.
    pub initialized: bool,
    /// Number of change notifications processed so far.
    pub revision: u64,
}

impl SessionState {
    #[must_use]
    pub fn initializing() -> Self {
        Self { user: None, loading: true, initialized: false, revision: 0 }
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        match (&self.user, self.initialized) {
            (_, false) => SessionPhase::Initializing,
            (Some(_), true) => SessionPhase::Authenticated,
            (None, true) => SessionPhase::Unauthenticated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Initializing,
    Unauthenticated,
    Authenticated,
}

struct Shared {
    state: watch::Sender<SessionState>,
    op_seq: AtomicU64,
}

struct Worker {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

// =============================================================================
// CONTROLLER
// =============================================================================

pub struct SessionController {
    adapter: Arc<AuthAdapter>,
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl SessionController {
    /// Subscribe to change notifications and spawn the worker task.
    ///
    /// Must be called from within a tokio runtime. An unconfigured adapter
    /// yields a controller that settles to unauthenticated and never
    /// subscribes.
    #[must_use]
    pub fn start(adapter: Arc<AuthAdapter>) -> Self {
        let (state, _) = watch::channel(SessionState::initializing());
        let shared = Arc::new(Shared { state, op_seq: AtomicU64::new(0) });

        let subscription = match adapter.subscribe() {
            Ok(sub) => Some(sub),
            Err(e) => {
                warn!(error = %e, "auth change notifications unavailable");
                None
            }
        };

        let (stop, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(run(Arc::clone(&shared), Arc::clone(&adapter), subscription, stop_rx));

        Self { adapter, shared, worker: Mutex::new(Some(Worker { stop, handle })) }
    }

    #[must_use]
    pub fn adapter(&self) -> &Arc<AuthAdapter> {
        &self.adapter
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.shared.state.borrow().clone()
    }

    /// Receiver that observes every published state.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// # Errors
    ///
    /// Whatever the adapter reports; `loading` is cleared on failure.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let token = self.begin();
        let result = self.adapter.sign_in(email, password).await;
        if result.is_err() {
            self.settle(token);
        }
        result
    }

    /// # Errors
    ///
    /// Whatever the adapter reports; `loading` is cleared on failure.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<SignUpStatus, AuthError> {
        let token = self.begin();
        let result = self.adapter.sign_up(email, password, display_name).await;
        // No session means no notification will arrive.
        if !matches!(result, Ok(SignUpStatus::SessionStarted)) {
            self.settle(token);
        }
        result
    }

    /// # Errors
    ///
    /// Whatever the adapter reports; `loading` is cleared on failure.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let token = self.begin();
        let result = self.adapter.sign_out().await;
        if result.is_err() || self.shared.state.borrow().user.is_none() {
            self.settle(token);
        }
        result
    }

    /// Returns the authorize URL; the session itself arrives via the callback.
    ///
    /// # Errors
    ///
    /// Whatever the adapter reports.
    pub async fn sign_in_with_provider(&self, provider: OAuthProvider) -> Result<String, AuthError> {
        let token = self.begin();
        let result = self.adapter.sign_in_with_provider(provider).await;
        self.settle(token);
        result
    }

    /// Persist a profile patch and republish it if `user_id` is still the
    /// signed-in user.
    ///
    /// # Errors
    ///
    /// Whatever the adapter reports.
    pub async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<Profile, AuthError> {
        let profile = self.adapter.update_profile(user_id, update).await?;
        self.shared.state.send_if_modified(|state| match &mut state.user {
            Some(user) if user.id == user_id => {
                user.profile = Some(profile.clone());
                true
            }
            _ => false,
        });
        Ok(profile)
    }

    /// Stop the worker and release the subscription. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(worker) = worker else {
            return;
        };
        let _ = worker.stop.send(());
        if let Err(e) = worker.handle.await {
            warn!(error = %e, "session worker ended abnormally");
        }
        info!("session controller stopped");
    }

    fn begin(&self) -> u64 {
        let token = self.shared.op_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.state.send_if_modified(|state| {
            let changed = !state.loading;
            state.loading = true;
            changed
        });
        token
    }

    fn settle(&self, token: u64) {
        if self.shared.op_seq.load(Ordering::SeqCst) != token {
            debug!(token, "newer operation in flight; leaving loading set");
            return;
        }
        self.shared.state.send_if_modified(|state| {
            if state.initialized && state.loading {
                state.loading = false;
                true
            } else {
                false
            }
        });
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        let worker = self
            .worker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            let _ = worker.stop.send(());
        }
    }
}

// =============================================================================
// WORKER
// =============================================================================

async fn run(
    shared: Arc<Shared>,
    adapter: Arc<AuthAdapter>,
    subscription: Option<AuthSubscription>,
    mut stop: oneshot::Receiver<()>,
) {
    let initial = tokio::select! {
        biased;
        _ = &mut stop => return,
        result = adapter.get_current_user() => result,
    };
    let user = initial.unwrap_or_else(|e| {
        warn!(error = %e, "initial session check failed; treating as signed out");
        None
    });
    info!(authenticated = user.is_some(), "session state initialized");
    shared.state.send_modify(|state| {
        state.user = user;
        state.loading = false;
        state.initialized = true;
    });

    let Some(mut subscription) = subscription else {
        return;
    };

    loop {
        let change = tokio::select! {
            biased;
            _ = &mut stop => break,
            change = subscription.next() => change,
        };
        let Some(change) = change else {
            debug!("auth change feed closed");
            break;
        };
        apply_change(&shared, &adapter, &change).await;
    }

    subscription.unsubscribe();
}

async fn apply_change(shared: &Shared, adapter: &AuthAdapter, change: &AuthChange) {
    debug!(event = %change.event, user_id = ?change.user_id(), "auth change");
    match adapter.resolve_change(change).await {
        Ok(user) => shared.state.send_modify(|state| {
            state.user = user;
            state.loading = false;
            state.revision += 1;
        }),
        Err(e) => {
            warn!(event = %change.event, error = %e, "skipping unresolvable auth change");
            shared.state.send_modify(|state| {
                state.loading = false;
                state.revision += 1;
            });
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
