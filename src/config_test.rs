use std::collections::HashMap;

use super::*;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key| map.get(key).cloned()
}

// =============================================================================
// GatewaySettings
// =============================================================================

#[test]
fn settings_with_both_values_are_configured() {
    let settings = GatewaySettings::new(Some("https://abc.supabase.co/".into()), Some("anon".into()));
    assert!(settings.is_configured());
    assert_eq!(settings.credentials(), Some(("https://abc.supabase.co", "anon")));
}

#[test]
fn settings_missing_url_not_configured() {
    let settings = GatewaySettings::new(None, Some("anon".into()));
    assert!(!settings.is_configured());
    assert!(settings.credentials().is_none());
}

#[test]
fn settings_missing_key_not_configured() {
    let settings = GatewaySettings::new(Some("https://abc.supabase.co".into()), None);
    assert!(!settings.is_configured());
}

#[test]
fn settings_blank_values_count_as_missing() {
    let settings = GatewaySettings::new(Some("   ".into()), Some(String::new()));
    assert_eq!(settings, GatewaySettings::default());
    assert!(!settings.is_configured());
}

// =============================================================================
// AppConfig::from_lookup
// =============================================================================

#[test]
fn from_lookup_defaults() {
    let cfg = AppConfig::from_lookup(lookup_from(&[])).unwrap();
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert!(cfg.bind_addr.is_loopback());
    assert_eq!(cfg.origin, "http://localhost:3000");
    assert!(!cfg.gateway.is_configured());
    assert_eq!(cfg.timeouts, GatewayTimeouts::default());
    assert!(!cfg.cors_allow_any);
}

#[test]
fn from_lookup_reads_overrides() {
    let cfg = AppConfig::from_lookup(lookup_from(&[
        ("PORT", "8080"),
        ("BIND_ADDR", "0.0.0.0"),
        ("APP_ORIGIN", "https://focus.example.com/"),
        ("SUPABASE_URL", "https://abc.supabase.co"),
        ("SUPABASE_ANON_KEY", "public-anon"),
        ("GATEWAY_REQUEST_TIMEOUT_SECS", "42"),
        ("GATEWAY_CONNECT_TIMEOUT_SECS", "7"),
        ("CORS_ALLOW_ANY", "yes"),
    ]))
    .unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.bind_addr, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    assert_eq!(cfg.origin, "https://focus.example.com");
    assert_eq!(cfg.gateway.credentials(), Some(("https://abc.supabase.co", "public-anon")));
    assert_eq!(cfg.timeouts, GatewayTimeouts { request_secs: 42, connect_secs: 7 });
    assert!(cfg.cors_allow_any);
}

#[test]
fn from_lookup_origin_follows_port() {
    let cfg = AppConfig::from_lookup(lookup_from(&[("PORT", "4100")])).unwrap();
    assert_eq!(cfg.origin, "http://localhost:4100");
    assert_eq!(cfg.callback_url(), "http://localhost:4100/auth/callback");
    assert_eq!(cfg.reset_password_url(), "http://localhost:4100/auth/reset-password");
}

#[test]
fn from_lookup_bad_port_errors() {
    let err = AppConfig::from_lookup(lookup_from(&[("PORT", "not-a-port")]))
        .unwrap_err()
        .to_string();
    assert!(err.contains("PORT"));
    assert!(err.contains("not-a-port"));
}

#[test]
fn from_lookup_bad_bind_addr_errors() {
    let err = AppConfig::from_lookup(lookup_from(&[("BIND_ADDR", "localhost")]))
        .unwrap_err()
        .to_string();
    assert!(err.contains("BIND_ADDR"));
}

#[test]
fn from_lookup_blank_bind_addr_stays_loopback() {
    let cfg = AppConfig::from_lookup(lookup_from(&[("BIND_ADDR", "  ")])).unwrap();
    assert_eq!(cfg.bind_addr, DEFAULT_BIND_ADDR);
}

#[test]
fn from_lookup_origin_without_scheme_errors() {
    let err = AppConfig::from_lookup(lookup_from(&[("APP_ORIGIN", "focus.example.com")]))
        .unwrap_err()
        .to_string();
    assert!(err.contains("APP_ORIGIN"));
}

#[test]
fn from_lookup_bad_timeout_falls_back_to_default() {
    let cfg = AppConfig::from_lookup(lookup_from(&[("GATEWAY_REQUEST_TIMEOUT_SECS", "soon")])).unwrap();
    assert_eq!(cfg.timeouts.request_secs, DEFAULT_GATEWAY_REQUEST_TIMEOUT_SECS);
}

// =============================================================================
// parse_bool
// =============================================================================

#[test]
fn parse_bool_true_variants() {
    for val in ["1", "true", "yes", "on", "TRUE", " On "] {
        assert_eq!(parse_bool(val), Some(true), "expected true for {val:?}");
    }
}

#[test]
fn parse_bool_false_variants() {
    for val in ["0", "false", "no", "off", "False"] {
        assert_eq!(parse_bool(val), Some(false), "expected false for {val:?}");
    }
}

#[test]
fn parse_bool_invalid_returns_none() {
    assert_eq!(parse_bool("maybe"), None);
    assert_eq!(parse_bool(""), None);
}
