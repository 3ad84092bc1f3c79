use super::*;

#[test]
fn verifier_is_43_url_safe_chars() {
    let verifier = generate_code_verifier();
    assert_eq!(verifier.len(), 43);
    assert!(
        verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    );
}

#[test]
fn verifier_two_calls_differ() {
    assert_ne!(generate_code_verifier(), generate_code_verifier());
}

#[test]
fn challenge_matches_rfc7636_vector() {
    assert_eq!(
        code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
        "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
    );
}

#[test]
fn challenge_is_stable_and_unpadded() {
    let a = code_challenge("abc");
    assert_eq!(a, code_challenge("abc"));
    assert!(!a.contains('='));
    assert_ne!(a, code_challenge("abd"));
}
