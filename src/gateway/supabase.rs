//! Supabase gateway client — GoTrue auth endpoints and PostgREST profile rows.
//!
//! DESIGN
//! ======
//! Thin `reqwest` wrapper over `/auth/v1` and `/rest/v1`. The client holds the
//! current session in memory the way the browser SDK keeps it in storage, and
//! emits a change notification whenever that session is created, refreshed,
//! updated, or cleared. Response parsing lives in free functions so it can be
//! tested without a network.
//!
//! ERROR HANDLING
//! ==============
//! A refresh or user fetch rejected by the provider clears the local session
//! and emits `SIGNED_OUT` rather than surfacing an error: an expired session
//! is an ordinary sign-out, not a failure. Transport errors are returned as-is.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::feed::{AuthSubscription, ChangeFeed};
use super::pkce;
use super::types::{
    AuthChange, AuthEvent, GatewaySession, GatewayUser, OAuthProvider, Profile, ProfileUpdate, SignUpOutcome,
};
use super::{GatewayError, ProfileStore, SessionGateway};
use crate::config::GatewayTimeouts;

const REFRESH_MARGIN_SECS: i64 = 10;
const PGRST_SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

// =============================================================================
// CLIENT
// =============================================================================

pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    session: Mutex<Option<GatewaySession>>,
    pkce_verifier: Mutex<Option<String>>,
    feed: ChangeFeed,
}

impl SupabaseClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, anon_key: &str, timeouts: GatewayTimeouts) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| GatewayError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            anon_key: anon_key.to_owned(),
            session: Mutex::new(None),
            pkce_verifier: Mutex::new(None),
            feed: ChangeFeed::new(),
        })
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    /// Request carrying the project key, authorized as `bearer` or as the anon role.
    fn request(&self, method: Method, url: &str, bearer: Option<&str>) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.unwrap_or(&self.anon_key))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<String, GatewayError> {
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(parse_api_error(status, &text));
        }
        Ok(text)
    }

    // -------------------------------------------------------------------------
    // local session slot
    // -------------------------------------------------------------------------

    fn load_session(&self) -> Option<GatewaySession> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store_session(&self, session: GatewaySession) -> GatewaySession {
        let session = session.with_expiry_from(unix_now());
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        session
    }

    fn take_session(&self) -> Option<GatewaySession> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn drop_session(&self, reason: &str) {
        if let Some(old) = self.take_session() {
            info!(user_id = %old.user.id, reason, "session cleared");
            self.feed.emit(AuthChange::signed_out());
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<GatewaySession, GatewayError> {
        let body = self
            .execute(
                self.request(Method::POST, &self.auth_url("token"), None)
                    .query(&[("grant_type", "refresh_token")])
                    .json(&json!({ "refresh_token": refresh_token })),
            )
            .await?;
        Ok(self.store_session(decode_session(&body)?))
    }

    fn begin_session(&self, session: GatewaySession) -> GatewaySession {
        let session = self.store_session(session);
        info!(user_id = %session.user.id, "session started");
        self.feed.emit(AuthChange::signed_in(session.user.clone()));
        session
    }
}

#[async_trait::async_trait]
impl SessionGateway for SupabaseClient {
    async fn current_session(&self) -> Result<Option<GatewaySession>, GatewayError> {
        let Some(session) = self.load_session() else {
            return Ok(None);
        };
        if !session.is_expired(unix_now(), REFRESH_MARGIN_SECS) {
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token.clone() else {
            self.drop_session("expired without refresh token");
            return Ok(None);
        };

        match self.refresh(&refresh_token).await {
            Ok(fresh) => {
                debug!(user_id = %fresh.user.id, "session refreshed");
                self.feed
                    .emit(AuthChange::new(AuthEvent::TokenRefreshed, Some(fresh.user.clone())));
                Ok(Some(fresh))
            }
            // Only a 4xx rejects the refresh token; server errors leave the session for a retry.
            Err(GatewayError::Api { status: status @ 400..=499, message, .. }) => {
                warn!(status, %message, "session refresh rejected");
                self.drop_session("refresh rejected");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn current_user(&self) -> Result<Option<GatewayUser>, GatewayError> {
        let Some(session) = self.current_session().await? else {
            return Ok(None);
        };

        let result = self
            .execute(self.request(Method::GET, &self.auth_url("user"), Some(&session.access_token)))
            .await;
        match result {
            Ok(body) => serde_json::from_str::<GatewayUser>(&body)
                .map(Some)
                .map_err(|e| GatewayError::Decode(e.to_string())),
            Err(GatewayError::Api { status: 401 | 403, .. }) => {
                self.drop_session("access token rejected");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<GatewaySession, GatewayError> {
        let body = self
            .execute(
                self.request(Method::POST, &self.auth_url("token"), None)
                    .query(&[("grant_type", "password")])
                    .json(&json!({ "email": email, "password": password })),
            )
            .await?;
        Ok(self.begin_session(decode_session(&body)?))
    }

    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<SignUpOutcome, GatewayError> {
        let body = self
            .execute(
                self.request(Method::POST, &self.auth_url("signup"), None)
                    .json(&json!({ "email": email, "password": password, "data": metadata })),
            )
            .await?;
        let mut outcome = parse_sign_up(&body)?;
        if let Some(session) = outcome.session.take() {
            outcome.session = Some(self.begin_session(session));
        }
        Ok(outcome)
    }

    async fn sign_out(&self) -> Result<(), GatewayError> {
        if let Some(session) = self.load_session() {
            let result = self
                .execute(self.request(Method::POST, &self.auth_url("logout"), Some(&session.access_token)))
                .await;
            match result {
                // Token already revoked or expired upstream; the local sign-out still stands.
                Ok(_) | Err(GatewayError::Api { status: 401 | 403 | 404, .. }) => {}
                Err(e) => return Err(e),
            }
        }
        self.take_session();
        self.feed.emit(AuthChange::signed_out());
        Ok(())
    }

    async fn authorize_url(&self, provider: OAuthProvider, redirect_to: &str) -> Result<String, GatewayError> {
        let verifier = pkce::generate_code_verifier();
        let url = build_authorize_url(&self.base_url, provider, redirect_to, &pkce::code_challenge(&verifier))?;
        *self
            .pkce_verifier
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(verifier);
        Ok(url)
    }

    async fn exchange_code(&self, auth_code: &str) -> Result<GatewaySession, GatewayError> {
        let verifier = self
            .pkce_verifier
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| GatewayError::FlowState("no pending oauth flow".into()))?;

        let body = self
            .execute(
                self.request(Method::POST, &self.auth_url("token"), None)
                    .query(&[("grant_type", "pkce")])
                    .json(&json!({ "auth_code": auth_code, "code_verifier": verifier })),
            )
            .await?;
        Ok(self.begin_session(decode_session(&body)?))
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), GatewayError> {
        self.execute(
            self.request(Method::POST, &self.auth_url("recover"), None)
                .query(&[("redirect_to", redirect_to)])
                .json(&json!({ "email": email })),
        )
        .await?;
        Ok(())
    }

    async fn update_password(&self, password: &str) -> Result<GatewayUser, GatewayError> {
        let session = self
            .current_session()
            .await?
            .ok_or(GatewayError::SessionMissing)?;
        let body = self
            .execute(
                self.request(Method::PUT, &self.auth_url("user"), Some(&session.access_token))
                    .json(&json!({ "password": password })),
            )
            .await?;
        let user: GatewayUser = serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))?;

        if let Some(mut held) = self.load_session() {
            held.user = user.clone();
            self.store_session(held);
        }
        self.feed
            .emit(AuthChange::new(AuthEvent::UserUpdated, Some(user.clone())));
        Ok(user)
    }

    fn subscribe(&self) -> AuthSubscription {
        self.feed.subscribe()
    }
}

#[async_trait::async_trait]
impl ProfileStore for SupabaseClient {
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>, GatewayError> {
        let token = self.load_session().map(|s| s.access_token);
        let result = self
            .execute(
                self.request(Method::GET, &self.rest_url("profiles"), token.as_deref())
                    .header(ACCEPT, PGRST_SINGLE_OBJECT)
                    .query(&[("id", format!("eq.{user_id}")), ("select", "*".to_owned())]),
            )
            .await;
        match result {
            Ok(body) => serde_json::from_str::<Profile>(&body)
                .map(Some)
                .map_err(|e| GatewayError::Decode(e.to_string())),
            // Single-object requests answer 406 when no row matched.
            Err(GatewayError::Api { status: 406, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<Profile, GatewayError> {
        let token = self.load_session().map(|s| s.access_token);
        let body = profile_patch_body(update, &now_rfc3339()?)?;
        let text = self
            .execute(
                self.request(Method::PATCH, &self.rest_url("profiles"), token.as_deref())
                    .header(ACCEPT, PGRST_SINGLE_OBJECT)
                    .header("Prefer", "return=representation")
                    .query(&[("id", format!("eq.{user_id}"))])
                    .json(&body),
            )
            .await?;
        serde_json::from_str(&text).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

// =============================================================================
// PARSING
// =============================================================================

fn unix_now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

fn now_rfc3339() -> Result<String, GatewayError> {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .map_err(|e| GatewayError::Decode(e.to_string()))
}

/// Build a `GatewayError::Api` from a non-success response.
///
/// GoTrue has used several error shapes over time (`error_code`/`msg`,
/// `error`/`error_description`), and PostgREST uses `code`/`message`.
pub(crate) fn parse_api_error(status: u16, body: &str) -> GatewayError {
    let value: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let field = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_owned)
    };

    let code = field("error_code")
        .or_else(|| field("code"))
        .or_else(|| field("error"));
    let message = field("msg")
        .or_else(|| field("message"))
        .or_else(|| field("error_description"))
        .or_else(|| field("error"))
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() { format!("HTTP {status}") } else { trimmed.to_owned() }
        });

    GatewayError::Api { status, code, message }
}

pub(crate) fn decode_session(body: &str) -> Result<GatewaySession, GatewayError> {
    serde_json::from_str(body).map_err(|e| GatewayError::Decode(format!("session: {e}")))
}

/// Sign-up answers with a full session when confirmation is off, and with a
/// bare user object when the address must be confirmed first.
pub(crate) fn parse_sign_up(body: &str) -> Result<SignUpOutcome, GatewayError> {
    let value: Value = serde_json::from_str(body).map_err(|e| GatewayError::Decode(e.to_string()))?;

    if value.get("access_token").is_some() {
        let session: GatewaySession =
            serde_json::from_value(value).map_err(|e| GatewayError::Decode(format!("session: {e}")))?;
        return Ok(SignUpOutcome { user: Some(session.user.clone()), session: Some(session) });
    }

    let user_value = if let Some(user) = value.get("user").filter(|u| u.is_object()) {
        Some(user.clone())
    } else if value.get("id").and_then(Value::as_str).is_some() {
        Some(value.clone())
    } else {
        None
    };
    let user = user_value
        .map(serde_json::from_value::<GatewayUser>)
        .transpose()
        .map_err(|e| GatewayError::Decode(format!("user: {e}")))?;

    Ok(SignUpOutcome { user, session: None })
}

pub(crate) fn build_authorize_url(
    base_url: &str,
    provider: OAuthProvider,
    redirect_to: &str,
    code_challenge: &str,
) -> Result<String, GatewayError> {
    let url = reqwest::Url::parse_with_params(
        &format!("{base_url}/auth/v1/authorize"),
        &[
            ("provider", provider.as_str()),
            ("redirect_to", redirect_to),
            ("code_challenge", code_challenge),
            ("code_challenge_method", "s256"),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| GatewayError::FlowState(format!("invalid authorize url: {e}")))?;
    Ok(url.into())
}

fn profile_patch_body(update: &ProfileUpdate, updated_at: &str) -> Result<Value, GatewayError> {
    let mut body = serde_json::to_value(update).map_err(|e| GatewayError::Decode(e.to_string()))?;
    if let Some(obj) = body.as_object_mut() {
        obj.insert("updated_at".into(), Value::String(updated_at.to_owned()));
    }
    Ok(body)
}

#[cfg(test)]
#[path = "supabase_test.rs"]
mod tests;
