//! Profile edit validation
//!
//! Checks a [`ProfilePatch`] before it is accumulated or written. All problems
//! are collected so the client can highlight every offending field at once.

use crate::error::{ApiError, FieldError};
use crate::types::{ProfilePatch, Tier};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Maximum title length in characters
pub const MAX_TITLE_LEN: usize = 100;
/// Maximum bio length in characters
pub const MAX_BIO_LEN: usize = 500;
/// Maximum description length in characters
pub const MAX_DESCRIPTION_LEN: usize = 5_000;
/// Maximum URL length in bytes
pub const MAX_URL_LEN: usize = 2_048;
/// Maximum number of tiers per profile
pub const MAX_TIERS: usize = 10;
/// Maximum tier name length in characters
pub const MAX_TIER_NAME_LEN: usize = 60;
/// Maximum perks per tier
pub const MAX_PERKS: usize = 12;
/// Maximum perk length in characters
pub const MAX_PERK_LEN: usize = 140;
/// Highest accepted monthly price in minor units
pub const MAX_PRICE_MINOR: u64 = 10_000_000;

static HEX_COLOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid regex"));
static CURRENCY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{3}$").expect("valid regex"));
static TIER_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]{0,31}$").expect("valid regex"));

/// Validate a patch
///
/// # Errors
/// `ApiError::Validation` listing every invalid field
pub fn validate_patch(patch: &ProfilePatch) -> Result<(), ApiError> {
    let mut fields = Vec::new();

    if let Some(title) = &patch.title {
        check_len(&mut fields, "title", title, MAX_TITLE_LEN);
    }
    if let Some(bio) = &patch.bio {
        check_len(&mut fields, "bio", bio, MAX_BIO_LEN);
    }
    if let Some(description) = &patch.description {
        check_len(&mut fields, "description", description, MAX_DESCRIPTION_LEN);
    }
    if let Some(Some(url)) = &patch.avatar_url {
        check_url(&mut fields, "avatar_url", url);
    }
    if let Some(Some(url)) = &patch.cover_url {
        check_url(&mut fields, "cover_url", url);
    }
    if let Some(Some(color)) = &patch.accent_color {
        if !HEX_COLOR.is_match(color) {
            fields.push(FieldError::new("accent_color", "must be a #rrggbb color"));
        }
    }
    if let Some(tiers) = &patch.tiers {
        check_tiers(&mut fields, tiers);
    }

    if fields.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation {
            message: format!("{} field(s) invalid", fields.len()),
            fields,
        })
    }
}

fn check_len(fields: &mut Vec<FieldError>, name: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        fields.push(FieldError::new(name, format!("must be at most {max} characters")));
    }
}

/// Accepts absolute `http`/`https` URLs without whitespace
#[must_use]
pub fn is_valid_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));

    match rest {
        Some(rest) => {
            let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
            !host.is_empty() && !url.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn check_url(fields: &mut Vec<FieldError>, name: &str, url: &str) {
    if url.len() > MAX_URL_LEN {
        fields.push(FieldError::new(name, format!("must be at most {MAX_URL_LEN} bytes")));
    } else if !is_valid_url(url) {
        fields.push(FieldError::new(name, "must be an absolute http(s) URL"));
    }
}

fn check_tiers(fields: &mut Vec<FieldError>, tiers: &[Tier]) {
    if tiers.len() > MAX_TIERS {
        fields.push(FieldError::new("tiers", format!("at most {MAX_TIERS} tiers")));
    }

    let mut seen = HashSet::new();
    for (idx, tier) in tiers.iter().enumerate() {
        let at = |field: &str| format!("tiers[{idx}].{field}");

        if !TIER_ID.is_match(&tier.id) {
            fields.push(FieldError::new(at("id"), "must be a lowercase slug"));
        } else if !seen.insert(tier.id.as_str()) {
            fields.push(FieldError::new(at("id"), "duplicate tier id"));
        }

        if tier.name.trim().is_empty() {
            fields.push(FieldError::new(at("name"), "must not be empty"));
        } else {
            check_len(fields, &at("name"), &tier.name, MAX_TIER_NAME_LEN);
        }

        if tier.price_minor == 0 || tier.price_minor > MAX_PRICE_MINOR {
            fields.push(FieldError::new(
                at("price_minor"),
                format!("must be between 1 and {MAX_PRICE_MINOR}"),
            ));
        }

        if !CURRENCY.is_match(&tier.currency) {
            fields.push(FieldError::new(at("currency"), "must be an ISO 4217 code"));
        }

        if tier.perks.len() > MAX_PERKS {
            fields.push(FieldError::new(at("perks"), format!("at most {MAX_PERKS} perks")));
        }
        for (perk_idx, perk) in tier.perks.iter().enumerate() {
            check_len(fields, &format!("tiers[{idx}].perks[{perk_idx}]"), perk, MAX_PERK_LEN);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_names(err: ApiError) -> Vec<String> {
        match err {
            ApiError::Validation { fields, .. } => fields.into_iter().map(|f| f.field).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_reasonable_patch() {
        let patch = ProfilePatch::new()
            .title("Lo-fi beats")
            .avatar_url(Some("https://cdn.example.com/me.png".into()))
            .accent_color(Some("#ff8800".into()))
            .tiers(vec![Tier::new("fan", "Fan", 300, "USD").with_perks(["Shoutout"])]);

        assert!(validate_patch(&patch).is_ok());
    }

    #[test]
    fn clearing_nullable_fields_is_valid() {
        let patch = ProfilePatch::new().avatar_url(None).accent_color(None);
        assert!(validate_patch(&patch).is_ok());
    }

    #[test]
    fn reports_every_invalid_field() {
        let patch = ProfilePatch::new()
            .title("x".repeat(MAX_TITLE_LEN + 1))
            .cover_url(Some("ftp://files.example.com/c.png".into()))
            .accent_color(Some("orange".into()));

        let fields = field_names(validate_patch(&patch).unwrap_err());
        assert_eq!(fields, vec!["title", "cover_url", "accent_color"]);
    }

    #[test]
    fn rejects_bad_tiers() {
        let patch = ProfilePatch::new().tiers(vec![
            Tier::new("fan", "Fan", 300, "USD"),
            Tier::new("fan", "", 0, "usd"),
        ]);

        let fields = field_names(validate_patch(&patch).unwrap_err());
        assert_eq!(
            fields,
            vec![
                "tiers[1].id",
                "tiers[1].name",
                "tiers[1].price_minor",
                "tiers[1].currency"
            ]
        );
    }

    #[test]
    fn url_checks() {
        assert!(is_valid_url("https://example.com"));
        assert!(is_valid_url("http://example.com/a?b=c"));
        assert!(!is_valid_url("https://"));
        assert!(!is_valid_url("javascript:alert(1)"));
        assert!(!is_valid_url("https://exa mple.com"));
    }
}
