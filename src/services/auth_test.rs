use super::*;

fn config() -> GoogleConfig {
    GoogleConfig {
        client_id: "client-123".into(),
        client_secret: "secret".into(),
        redirect_uri: "https://shop.example.com/auth/google/callback".into(),
    }
}

fn profile(email: Option<&str>, verified: bool, name: Option<&str>) -> GoogleProfile {
    GoogleProfile {
        sub: "1098".into(),
        email: email.map(str::to_owned),
        email_verified: verified,
        name: name.map(str::to_owned),
        picture: None,
    }
}

// =============================================================================
// authorize_url
// =============================================================================

#[test]
fn authorize_url_encodes_parameters() {
    let url = config().authorize_url("abc123");
    assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
    assert!(url.contains("client_id=client-123"));
    assert!(url.contains("state=abc123"));
    assert!(url.contains("response_type=code"));
    assert!(url.contains("redirect_uri=https%3A%2F%2Fshop.example.com%2Fauth%2Fgoogle%2Fcallback"));
    assert!(url.contains("scope=openid+email+profile"));
}

// =============================================================================
// GoogleProfile
// =============================================================================

#[test]
fn verified_email_requires_verification() {
    assert_eq!(profile(Some("A@B.com"), false, None).verified_email(), None);
    assert_eq!(profile(Some(" A@B.com "), true, None).verified_email(), Some("a@b.com".into()));
}

#[test]
fn verified_email_rejects_malformed() {
    assert_eq!(profile(Some("not-an-email"), true, None).verified_email(), None);
}

#[test]
fn display_name_prefers_profile_name() {
    assert_eq!(profile(Some("jo@x.io"), true, Some("  Jo Doe ")).display_name(), "Jo Doe");
}

#[test]
fn display_name_falls_back_to_email_local_part() {
    assert_eq!(profile(Some("jo@x.io"), true, Some("   ")).display_name(), "jo");
}

#[test]
fn display_name_last_resort() {
    assert_eq!(profile(None, false, None).display_name(), "Shopper");
}

#[test]
fn profile_deserializes_without_verified_flag() {
    let json = r#"{"sub":"42","email":"x@y.z","name":"X"}"#;
    let p: GoogleProfile = serde_json::from_str(json).unwrap();
    assert_eq!(p.sub, "42");
    assert!(!p.email_verified);
    assert!(p.picture.is_none());
}
