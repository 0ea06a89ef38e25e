use proptest::prelude::*;
use serde_json::json;
use studio_core::validation::MAX_TITLE_LEN;
use studio_core::{redact, validate_patch, OwnerId, Profile, ProfileId, ProfilePatch, Tier};

#[test]
fn test_patch_wire_format_clears_nullable_fields() {
    let mut profile = Profile::new(ProfileId::new(), OwnerId::new());
    profile.avatar_url = Some("https://cdn.example.com/a.png".into());
    profile.cover_url = Some("https://cdn.example.com/c.png".into());

    let patch: ProfilePatch =
        serde_json::from_value(json!({ "avatar_url": null, "title": "Fresh" })).unwrap();
    assert!(validate_patch(&patch).is_ok());
    profile.apply_patch(&patch);

    assert_eq!(profile.avatar_url, None);
    assert_eq!(profile.cover_url.as_deref(), Some("https://cdn.example.com/c.png"));
    assert_eq!(profile.title, "Fresh");
}

#[test]
fn test_redacted_flush_body_keeps_profile_fields() {
    let body = json!({
        "patch": { "title": "Visible" },
        "token": "abc",
        "meta": [{ "api_key": "k" }]
    });

    let redacted = redact(&body);
    assert_eq!(redacted["patch"]["title"], "Visible");
    assert_eq!(redacted["token"], "[REDACTED]");
    assert_eq!(redacted["meta"][0]["api_key"], "[REDACTED]");
}

proptest! {
    #[test]
    fn prop_bounded_text_fields_validate(
        title in "[A-Za-z ]{1,100}",
        bio in "[a-z .,]{0,500}",
        price in 0u64..1_000_000,
    ) {
        let patch = ProfilePatch::new()
            .title(title)
            .bio(bio)
            .tiers(vec![Tier::new("basic", "Basic", price, "USD")]);
        prop_assert!(validate_patch(&patch).is_ok());
    }

    #[test]
    fn prop_overlong_title_always_rejected(extra in 1usize..200) {
        let patch = ProfilePatch::new().title("x".repeat(MAX_TITLE_LEN + extra));
        let err = validate_patch(&patch).unwrap_err();
        prop_assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn prop_redaction_never_leaks_secrets(secret in "[0-9]{8,24}") {
        let body = json!({ "password": secret.clone(), "nested": { "secret": secret.clone() } });
        let rendered = redact(&body).to_string();
        prop_assert!(!rendered.contains(&secret));
    }
}
