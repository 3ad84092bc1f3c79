//! Identity gateway and profile store seams.
//!
//! ARCHITECTURE
//! ============
//! Session validation, token refresh, and credential storage belong to the
//! hosted backend. This module only describes the capability surface the
//! auth adapter needs (`SessionGateway`, `ProfileStore`) plus the Supabase
//! implementation used in production. Tests substitute scripted mocks at the
//! same trait boundary.

pub mod feed;
pub mod pkce;
pub mod supabase;
pub mod types;

pub use feed::{AuthSubscription, ChangeFeed};
pub use types::{
    AuthChange, AuthEvent, ChangeSession, GatewaySession, GatewayUser, OAuthProvider, Profile, ProfileUpdate,
    SignUpOutcome,
};

// =============================================================================
// ERROR
// =============================================================================

/// Raw failures reported by a gateway client. Never shown to users directly;
/// the auth adapter normalizes these first.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The request never produced an HTTP response (DNS, TLS, timeout).
    #[error("gateway request failed: {0}")]
    Transport(String),

    /// The gateway answered with a non-success status.
    #[error("gateway returned {status}: {message}")]
    Api { status: u16, code: Option<String>, message: String },

    /// A success response body did not match the expected shape.
    #[error("gateway response parse failed: {0}")]
    Decode(String),

    /// The operation needs a signed-in session and none is held.
    #[error("auth session missing")]
    SessionMissing,

    /// An OAuth callback arrived without a matching PKCE flow.
    #[error("oauth flow state missing: {0}")]
    FlowState(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

// =============================================================================
// TRAITS
// =============================================================================

/// Credential, OAuth, and session operations offered by the identity provider.
#[async_trait::async_trait]
pub trait SessionGateway: Send + Sync {
    /// Locally held session, refreshed if its access token has expired.
    async fn current_session(&self) -> Result<Option<GatewaySession>, GatewayError>;

    /// User for the current session, validated against the provider.
    async fn current_user(&self) -> Result<Option<GatewayUser>, GatewayError>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<GatewaySession, GatewayError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> Result<SignUpOutcome, GatewayError>;

    async fn sign_out(&self) -> Result<(), GatewayError>;

    /// Start an OAuth flow and return the provider URL the browser should visit.
    async fn authorize_url(&self, provider: OAuthProvider, redirect_to: &str) -> Result<String, GatewayError>;

    /// Finish an OAuth flow by trading the callback code for a session.
    async fn exchange_code(&self, auth_code: &str) -> Result<GatewaySession, GatewayError>;

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), GatewayError>;

    async fn update_password(&self, password: &str) -> Result<GatewayUser, GatewayError>;

    /// Register for auth change notifications, delivered in emission order.
    fn subscribe(&self) -> AuthSubscription;
}

/// Extended profile attributes keyed by user id.
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>, GatewayError>;

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<Profile, GatewayError>;
}
