//! Runtime configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! Missing gateway credentials are not a startup error. The server still
//! boots and every auth operation answers `NotConfigured`, so a fresh
//! checkout without a `.env` renders the landing page instead of crashing.
//!
//! The process holds one gateway session for one user, so the listener
//! defaults to loopback. `BIND_ADDR` widens it explicitly.

use std::net::{IpAddr, Ipv4Addr};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
pub const DEFAULT_GATEWAY_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_GATEWAY_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

// =============================================================================
// GATEWAY SETTINGS
// =============================================================================

/// The two external settings the identity gateway needs.
///
/// Either value may be absent; [`GatewaySettings::credentials`] only yields
/// when both are present and non-blank.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewaySettings {
    pub url: Option<String>,
    pub anon_key: Option<String>,
}

impl GatewaySettings {
    #[must_use]
    pub fn new(url: Option<String>, anon_key: Option<String>) -> Self {
        Self {
            url: non_blank(url).map(|u| u.trim_end_matches('/').to_owned()),
            anon_key: non_blank(anon_key),
        }
    }

    /// Base URL and public key, or `None` if either is missing.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        Some((self.url.as_deref()?, self.anon_key.as_deref()?))
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.credentials().is_some()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for GatewayTimeouts {
    fn default() -> Self {
        Self {
            request_secs: DEFAULT_GATEWAY_REQUEST_TIMEOUT_SECS,
            connect_secs: DEFAULT_GATEWAY_CONNECT_TIMEOUT_SECS,
        }
    }
}

// =============================================================================
// APP CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    /// Public origin used to build OAuth and password-reset redirect targets.
    pub origin: String,
    pub gateway: GatewaySettings,
    pub timeouts: GatewayTimeouts,
    pub cors_allow_any: bool,
}

impl AppConfig {
    /// Build typed config from the process environment.
    ///
    /// Gateway:
    /// - `SUPABASE_URL`, `SUPABASE_ANON_KEY`
    ///
    /// Optional:
    /// - `BIND_ADDR`: default `127.0.0.1`
    /// - `PORT`: default 3000
    /// - `APP_ORIGIN`: default `http://localhost:<PORT>`
    /// - `GATEWAY_REQUEST_TIMEOUT_SECS`: default 30
    /// - `GATEWAY_CONNECT_TIMEOUT_SECS`: default 10
    /// - `CORS_ALLOW_ANY`: default false
    ///
    /// # Errors
    ///
    /// Returns an error if `BIND_ADDR`, `PORT` or `APP_ORIGIN` is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] with an injectable variable source.
    ///
    /// # Errors
    ///
    /// Returns an error if `BIND_ADDR`, `PORT` or `APP_ORIGIN` is present but malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = match non_blank(lookup("BIND_ADDR")) {
            Some(raw) => raw
                .parse::<IpAddr>()
                .map_err(|_| ConfigError::Invalid { var: "BIND_ADDR", value: raw })?,
            None => DEFAULT_BIND_ADDR,
        };

        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { var: "PORT", value: raw })?,
            None => DEFAULT_PORT,
        };

        let origin = match non_blank(lookup("APP_ORIGIN")) {
            Some(raw) if raw.starts_with("http://") || raw.starts_with("https://") => {
                raw.trim_end_matches('/').to_owned()
            }
            Some(raw) => return Err(ConfigError::Invalid { var: "APP_ORIGIN", value: raw }),
            None => format!("http://localhost:{port}"),
        };

        let gateway = GatewaySettings::new(lookup("SUPABASE_URL"), lookup("SUPABASE_ANON_KEY"));
        let timeouts = GatewayTimeouts {
            request_secs: parse_or(&lookup, "GATEWAY_REQUEST_TIMEOUT_SECS", DEFAULT_GATEWAY_REQUEST_TIMEOUT_SECS),
            connect_secs: parse_or(&lookup, "GATEWAY_CONNECT_TIMEOUT_SECS", DEFAULT_GATEWAY_CONNECT_TIMEOUT_SECS),
        };
        let cors_allow_any = lookup("CORS_ALLOW_ANY")
            .as_deref()
            .and_then(parse_bool)
            .unwrap_or(false);

        Ok(Self { bind_addr, port, origin, gateway, timeouts, cors_allow_any })
    }

    #[must_use]
    pub fn callback_url(&self) -> String {
        format!("{}/auth/callback", self.origin)
    }

    #[must_use]
    pub fn reset_password_url(&self) -> String {
        format!("{}/auth/reset-password", self.origin)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + Copy,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
