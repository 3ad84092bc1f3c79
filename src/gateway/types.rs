//! Gateway wire types shared by the Supabase client, the auth adapter, and mocks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// USERS AND SESSIONS
// =============================================================================

/// Identity record as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl GatewayUser {
    #[must_use]
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self { id: id.into(), email: Some(email.into()), user_metadata: serde_json::Value::Null }
    }
}

/// Token-bearing session. `Debug` redacts both tokens.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewaySession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix seconds at which `access_token` stops being accepted.
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: GatewayUser,
}

impl GatewaySession {
    /// True when the access token expires within `margin_secs` of `now`.
    #[must_use]
    pub fn is_expired(&self, now: i64, margin_secs: i64) -> bool {
        self.expires_at
            .is_some_and(|at| at <= now + margin_secs)
    }

    /// Fill `expires_at` from `expires_in` when the provider only sent the latter.
    #[must_use]
    pub fn with_expiry_from(mut self, now: i64) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = self.expires_in.map(|secs| now + secs);
        }
        self
    }
}

impl fmt::Debug for GatewaySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewaySession")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Result of a sign-up call. Either field may be absent: email confirmation
/// flows return a user without a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignUpOutcome {
    pub user: Option<GatewayUser>,
    pub session: Option<GatewaySession>,
}

// =============================================================================
// CHANGE NOTIFICATIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

impl AuthEvent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitialSession => "INITIAL_SESSION",
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
            Self::PasswordRecovery => "PASSWORD_RECOVERY",
        }
    }
}

impl fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session portion of a change notification. Tokens are not carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSession {
    pub user: GatewayUser,
}

/// One auth change notification: an event tag plus the session it left behind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthChange {
    pub event: AuthEvent,
    #[serde(default)]
    pub session: Option<ChangeSession>,
}

impl AuthChange {
    #[must_use]
    pub fn new(event: AuthEvent, user: Option<GatewayUser>) -> Self {
        Self { event, session: user.map(|user| ChangeSession { user }) }
    }

    #[must_use]
    pub fn signed_in(user: GatewayUser) -> Self {
        Self::new(AuthEvent::SignedIn, Some(user))
    }

    #[must_use]
    pub fn signed_out() -> Self {
        Self::new(AuthEvent::SignedOut, None)
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user.id.as_str())
    }
}

// =============================================================================
// OAUTH PROVIDERS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Github,
    Apple,
}

impl OAuthProvider {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
            Self::Apple => "apple",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported oauth provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for OAuthProvider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "github" => Ok(Self::Github),
            "apple" => Ok(Self::Apple),
            _ => Err(UnknownProvider(s.to_owned())),
        }
    }
}

// =============================================================================
// PROFILES
// =============================================================================

/// Row of the `profiles` table. Columns the store omits decode to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub timezone: String,
    #[serde(default)]
    pub onboarding_completed: bool,
    #[serde(default)]
    pub focus_goal_daily: i32,
    #[serde(default)]
    pub focus_goal_weekly: i32,
    #[serde(default)]
    pub preferred_session_duration: i32,
    #[serde(default)]
    pub break_duration: i32,
    #[serde(default)]
    pub long_break_duration: i32,
    #[serde(default)]
    pub notification_preferences: serde_json::Value,
    #[serde(default)]
    pub theme_preference: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Partial profile patch. Only `Some` fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onboarding_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_goal_daily: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_goal_weekly: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_session_duration: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_duration: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_break_duration: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_preferences: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_preference: Option<String>,
}

impl ProfileUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
