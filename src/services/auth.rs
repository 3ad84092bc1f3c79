//! Auth adapter — the single point of contact with the identity gateway.
//!
//! ARCHITECTURE
//! ============
//! Every call checks configuration first and fails with `NotConfigured`
//! before touching the gateway. Gateway failures pass through
//! `classify_gateway_error` so callers only ever see `AuthError`.
//!
//! Sign-in style operations return `()`: the signed-in user is observed
//! through the change-notification stream, never through the call's return.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, GatewaySettings};
use crate::gateway::{
    AuthChange, AuthSubscription, GatewayError, GatewayUser, OAuthProvider, Profile, ProfileStore, ProfileUpdate,
    SessionGateway,
};

const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password. Please check your credentials and try again.";

// =============================================================================
// ERROR
// =============================================================================

/// Normalized auth failures surfaced to the controller and the UI.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Gateway URL or key is missing; no request was attempted.
    #[error("authentication is not configured")]
    NotConfigured,

    /// The gateway rejected the email/password pair.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Any other failure reported by the gateway.
    #[error("auth provider error: {message}")]
    AuthProvider { message: String },

    /// The gateway could not be reached at all.
    #[error("auth provider unreachable: {message}")]
    Unreachable { message: String },
}

impl AuthError {
    pub(crate) fn provider(message: impl Into<String>) -> Self {
        Self::AuthProvider { message: message.into() }
    }

    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotConfigured => "E_NOT_CONFIGURED",
            Self::InvalidCredentials => "E_INVALID_CREDENTIALS",
            Self::AuthProvider { .. } => "E_AUTH_PROVIDER",
            Self::Unreachable { .. } => "E_UNREACHABLE",
        }
    }

    /// Text suitable for an inline form error or toast.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotConfigured => "Authentication is not configured.".to_owned(),
            Self::InvalidCredentials => INVALID_CREDENTIALS_MESSAGE.to_owned(),
            Self::AuthProvider { message } => message.clone(),
            Self::Unreachable { .. } => "Could not reach the authentication service.".to_owned(),
        }
    }
}

/// The one place raw gateway errors become `AuthError`.
///
/// Credential rejection is recognized by the structured `invalid_credentials`
/// code. Older gateways only say so in prose, so the message is matched as a
/// fallback.
#[must_use]
pub fn classify_gateway_error(err: GatewayError) -> AuthError {
    match err {
        GatewayError::Api { code, message, .. } => {
            if code.as_deref() == Some("invalid_credentials")
                || message
                    .to_ascii_lowercase()
                    .contains("invalid login credentials")
            {
                AuthError::InvalidCredentials
            } else {
                AuthError::AuthProvider { message }
            }
        }
        GatewayError::Transport(message) | GatewayError::HttpClientBuild(message) => {
            AuthError::Unreachable { message }
        }
        GatewayError::Decode(message) | GatewayError::FlowState(message) => AuthError::AuthProvider { message },
        GatewayError::SessionMissing => AuthError::provider("auth session missing"),
    }
}

// =============================================================================
// TYPES
// =============================================================================

/// Authenticated user: gateway identity plus the optional profile row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub profile: Option<Profile>,
}

/// Whether a sign-up produced a live session or awaits email confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignUpStatus {
    SessionStarted,
    ConfirmationPending,
}

/// Gateway and profile store implementations backing the adapter.
#[derive(Clone)]
pub struct Backend {
    pub gateway: Arc<dyn SessionGateway>,
    pub profiles: Arc<dyn ProfileStore>,
}

/// Where the gateway should send the browser after external flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTargets {
    pub oauth_callback: String,
    pub password_reset: String,
}

impl RedirectTargets {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self { oauth_callback: config.callback_url(), password_reset: config.reset_password_url() }
    }
}

// =============================================================================
// ADAPTER
// =============================================================================

pub struct AuthAdapter {
    settings: GatewaySettings,
    backend: Option<Backend>,
    redirects: RedirectTargets,
}

impl AuthAdapter {
    #[must_use]
    pub fn new(settings: GatewaySettings, backend: Option<Backend>, redirects: RedirectTargets) -> Self {
        Self { settings, backend, redirects }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.settings.is_configured() && self.backend.is_some()
    }

    fn backend(&self) -> Result<&Backend, AuthError> {
        if !self.settings.is_configured() {
            return Err(AuthError::NotConfigured);
        }
        self.backend.as_ref().ok_or(AuthError::NotConfigured)
    }

    /// Current user with profile, or `None` when nobody is signed in.
    ///
    /// # Errors
    ///
    /// `NotConfigured`, or a normalized gateway failure. A failed profile
    /// lookup is not an error; the user is returned without a profile.
    pub async fn get_current_user(&self) -> Result<Option<AuthUser>, AuthError> {
        let backend = self.backend()?;
        let user = backend
            .gateway
            .current_user()
            .await
            .map_err(|e| normalize("get current user", e))?;
        match user {
            Some(user) => compose_user(backend, user).await.map(Some),
            None => Ok(None),
        }
    }

    /// Whether the gateway currently holds a session.
    ///
    /// # Errors
    ///
    /// `NotConfigured`, or a normalized gateway failure.
    pub async fn has_session(&self) -> Result<bool, AuthError> {
        let backend = self.backend()?;
        let session = backend
            .gateway
            .current_session()
            .await
            .map_err(|e| normalize("get session", e))?;
        Ok(session.is_some())
    }

    /// # Errors
    ///
    /// `InvalidCredentials` when the gateway rejects the pair; otherwise
    /// `NotConfigured` or a normalized gateway failure.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let backend = self.backend()?;
        backend
            .gateway
            .sign_in_with_password(email, password)
            .await
            .map_err(|e| normalize("sign in", e))?;
        Ok(())
    }

    /// Register a new account; `display_name` is stored as `full_name` metadata.
    ///
    /// # Errors
    ///
    /// `NotConfigured`, a normalized gateway failure, or `AuthProvider` when
    /// the gateway reports success without returning a user.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<SignUpStatus, AuthError> {
        let backend = self.backend()?;
        let metadata = serde_json::json!({ "full_name": display_name.unwrap_or_default() });
        let outcome = backend
            .gateway
            .sign_up(email, password, metadata)
            .await
            .map_err(|e| normalize("sign up", e))?;

        let Some(user) = outcome.user else {
            error!("sign up succeeded without a user object");
            return Err(AuthError::provider("No user returned from sign up"));
        };
        info!(user_id = %user.id, "user signed up");

        Ok(if outcome.session.is_some() { SignUpStatus::SessionStarted } else { SignUpStatus::ConfirmationPending })
    }

    /// # Errors
    ///
    /// `NotConfigured` or a normalized gateway failure.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let backend = self.backend()?;
        backend
            .gateway
            .sign_out()
            .await
            .map_err(|e| normalize("sign out", e))
    }

    /// Begin an OAuth redirect. Returns the URL to send the browser to;
    /// completion arrives later at the callback entry point.
    ///
    /// # Errors
    ///
    /// `NotConfigured` or a normalized gateway failure.
    pub async fn sign_in_with_provider(&self, provider: OAuthProvider) -> Result<String, AuthError> {
        let backend = self.backend()?;
        backend
            .gateway
            .authorize_url(provider, &self.redirects.oauth_callback)
            .await
            .map_err(|e| normalize("oauth sign in", e))
    }

    /// Trade the authorization code delivered to the callback for a session.
    ///
    /// # Errors
    ///
    /// `NotConfigured` or a normalized gateway failure.
    pub async fn complete_oauth(&self, auth_code: &str) -> Result<(), AuthError> {
        let backend = self.backend()?;
        backend
            .gateway
            .exchange_code(auth_code)
            .await
            .map_err(|e| normalize("oauth code exchange", e))?;
        Ok(())
    }

    /// # Errors
    ///
    /// `NotConfigured` or a normalized gateway failure.
    pub async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        let backend = self.backend()?;
        backend
            .gateway
            .reset_password_for_email(email, &self.redirects.password_reset)
            .await
            .map_err(|e| normalize("reset password", e))
    }

    /// # Errors
    ///
    /// `NotConfigured` or a normalized gateway failure.
    pub async fn update_password(&self, new_password: &str) -> Result<(), AuthError> {
        let backend = self.backend()?;
        backend
            .gateway
            .update_password(new_password)
            .await
            .map_err(|e| normalize("update password", e))?;
        Ok(())
    }

    /// # Errors
    ///
    /// `NotConfigured` or a normalized gateway failure.
    pub async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<Profile, AuthError> {
        let backend = self.backend()?;
        backend
            .profiles
            .update_profile(user_id, update)
            .await
            .map_err(|e| normalize("update profile", e))
    }

    /// Open the change-notification stream.
    ///
    /// # Errors
    ///
    /// `NotConfigured` when no gateway is available.
    pub fn subscribe(&self) -> Result<AuthSubscription, AuthError> {
        Ok(self.backend()?.gateway.subscribe())
    }

    /// Derive the user a change notification leaves behind.
    ///
    /// # Errors
    ///
    /// `NotConfigured`, or `AuthProvider` when the notification's session
    /// is malformed (e.g. lacks an email). Only this update fails.
    pub async fn resolve_change(&self, change: &AuthChange) -> Result<Option<AuthUser>, AuthError> {
        let backend = self.backend()?;
        match &change.session {
            Some(session) => compose_user(backend, session.user.clone()).await.map(Some),
            None => Ok(None),
        }
    }
}

fn normalize(operation: &'static str, err: GatewayError) -> AuthError {
    error!(operation, error = %err, "gateway call failed");
    classify_gateway_error(err)
}

/// Attach the profile row to a gateway user. Profile failures degrade to `None`.
async fn compose_user(backend: &Backend, user: GatewayUser) -> Result<AuthUser, AuthError> {
    let Some(email) = user.email.filter(|e| !e.is_empty()) else {
        return Err(AuthError::provider(format!("session user {} has no email", user.id)));
    };

    let profile = match backend.profiles.fetch_profile(&user.id).await {
        Ok(Some(profile)) => Some(profile),
        Ok(None) => {
            debug!(user_id = %user.id, "no profile row");
            None
        }
        Err(e) => {
            warn!(user_id = %user.id, error = %e, "profile lookup failed");
            None
        }
    };

    Ok(AuthUser { id: user.id, email, profile })
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
