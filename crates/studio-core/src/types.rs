//! Core types for Studio
//!
//! Defines the records the editor works with:
//! - Identifiers for profiles, owners and mutations
//! - The creator profile record and its membership tiers
//! - Partial updates (patches) and their shallow merge
//! - Flush requests sent to the backing store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use ulid::Ulid;
use uuid::Uuid;

/// Unique profile identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub Ulid);

impl ProfileId {
    /// Generate new profile ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ProfileId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProfileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProfileId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

/// Account that owns one or more profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub Ulid);

impl OwnerId {
    /// Generate new owner ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OwnerId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

/// Client-generated id attached to every flush so the store can drop duplicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutationId(pub Uuid);

impl MutationId {
    /// Generate new random mutation ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MutationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MutationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Membership tier offered on a profile page
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tier {
    /// Stable tier id, unique within a profile
    pub id: String,
    /// Display name
    pub name: String,
    /// Monthly price in minor currency units
    pub price_minor: u64,
    /// ISO 4217 currency code
    pub currency: String,
    /// Perks listed on the tier card
    #[serde(default)]
    pub perks: Vec<String>,
}

impl Tier {
    /// Create new tier without perks
    #[inline]
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        price_minor: u64,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price_minor,
            currency: currency.into(),
            perks: Vec::new(),
        }
    }

    /// With perks
    #[inline]
    #[must_use]
    pub fn with_perks<I, S>(mut self, perks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.perks = perks.into_iter().map(Into::into).collect();
        self
    }
}

/// Creator profile record
///
/// `updated_at` is owned by the backend. A `None` value models a record whose
/// last-modified timestamp is missing or could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Record identifier
    pub id: ProfileId,
    /// Owning account
    pub owner: OwnerId,
    /// Page title
    #[serde(default)]
    pub title: String,
    /// Short bio shown under the title
    #[serde(default)]
    pub bio: String,
    /// Long-form description
    #[serde(default)]
    pub description: String,
    /// Avatar image URL
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Cover image URL
    #[serde(default)]
    pub cover_url: Option<String>,
    /// Page accent color (`#rrggbb`)
    #[serde(default)]
    pub accent_color: Option<String>,
    /// Membership tiers
    #[serde(default)]
    pub tiers: Vec<Tier>,
    /// Last-modified timestamp maintained by the backend
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// Create an empty profile for an owner
    #[inline]
    #[must_use]
    pub fn new(id: ProfileId, owner: OwnerId) -> Self {
        Self {
            id,
            owner,
            title: String::new(),
            bio: String::new(),
            description: String::new(),
            avatar_url: None,
            cover_url: None,
            accent_color: None,
            tiers: Vec::new(),
            updated_at: None,
        }
    }

    /// With title
    #[inline]
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// With tiers
    #[inline]
    #[must_use]
    pub fn with_tiers(mut self, tiers: Vec<Tier>) -> Self {
        self.tiers = tiers;
        self
    }

    /// With last-modified timestamp
    #[inline]
    #[must_use]
    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Last-modified timestamp as epoch milliseconds
    #[inline]
    #[must_use]
    pub fn updated_at_millis(&self) -> Option<i64> {
        self.updated_at.map(|ts| ts.timestamp_millis())
    }

    /// Overwrite exactly the fields present in `patch`
    pub fn apply_patch(&mut self, patch: &ProfilePatch) {
        if let Some(title) = &patch.title {
            self.title.clone_from(title);
        }
        if let Some(bio) = &patch.bio {
            self.bio.clone_from(bio);
        }
        if let Some(description) = &patch.description {
            self.description.clone_from(description);
        }
        if let Some(avatar_url) = &patch.avatar_url {
            self.avatar_url.clone_from(avatar_url);
        }
        if let Some(cover_url) = &patch.cover_url {
            self.cover_url.clone_from(cover_url);
        }
        if let Some(accent_color) = &patch.accent_color {
            self.accent_color.clone_from(accent_color);
        }
        if let Some(tiers) = &patch.tiers {
            self.tiers.clone_from(tiers);
        }
    }

    /// Copy of this profile with `patch` applied
    #[must_use]
    pub fn patched(&self, patch: &ProfilePatch) -> Self {
        let mut next = self.clone();
        next.apply_patch(patch);
        next
    }
}

/// Partial update to a profile
///
/// Every field is optional; an absent field leaves the record untouched.
/// Nullable fields use `Option<Option<_>>` so that an explicit `null` clears
/// the value while an absent key does not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilePatch {
    /// New title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New bio
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// New description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New avatar URL, or `Some(None)` to clear it
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub avatar_url: Option<Option<String>>,
    /// New cover URL, or `Some(None)` to clear it
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub cover_url: Option<Option<String>>,
    /// New accent color, or `Some(None)` to clear it
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub accent_color: Option<Option<String>>,
    /// Replacement tier list (the whole array, never merged per entry)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiers: Option<Vec<Tier>>,
}

/// Maps a present key (including `null`) to `Some`, so only a missing key
/// stays `None` via `#[serde(default)]`.
fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn take_later<T>(slot: &mut Option<T>, later: Option<T>) {
    if later.is_some() {
        *slot = later;
    }
}

impl ProfilePatch {
    /// Create empty patch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set title
    #[inline]
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set bio
    #[inline]
    #[must_use]
    pub fn bio(mut self, bio: impl Into<String>) -> Self {
        self.bio = Some(bio.into());
        self
    }

    /// Set description
    #[inline]
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set or clear avatar URL
    #[inline]
    #[must_use]
    pub fn avatar_url(mut self, url: Option<String>) -> Self {
        self.avatar_url = Some(url);
        self
    }

    /// Set or clear cover URL
    #[inline]
    #[must_use]
    pub fn cover_url(mut self, url: Option<String>) -> Self {
        self.cover_url = Some(url);
        self
    }

    /// Set or clear accent color
    #[inline]
    #[must_use]
    pub fn accent_color(mut self, color: Option<String>) -> Self {
        self.accent_color = Some(color);
        self
    }

    /// Replace the tier list
    #[inline]
    #[must_use]
    pub fn tiers(mut self, tiers: Vec<Tier>) -> Self {
        self.tiers = Some(tiers);
        self
    }

    /// True when no field is present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.field_names().is_empty()
    }

    /// Names of the fields present in this patch
    #[must_use]
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.title.is_some() {
            names.push("title");
        }
        if self.bio.is_some() {
            names.push("bio");
        }
        if self.description.is_some() {
            names.push("description");
        }
        if self.avatar_url.is_some() {
            names.push("avatar_url");
        }
        if self.cover_url.is_some() {
            names.push("cover_url");
        }
        if self.accent_color.is_some() {
            names.push("accent_color");
        }
        if self.tiers.is_some() {
            names.push("tiers");
        }
        names
    }

    /// Shallow merge: every field present in `later` replaces the one here
    pub fn merge(&mut self, later: ProfilePatch) {
        take_later(&mut self.title, later.title);
        take_later(&mut self.bio, later.bio);
        take_later(&mut self.description, later.description);
        take_later(&mut self.avatar_url, later.avatar_url);
        take_later(&mut self.cover_url, later.cover_url);
        take_later(&mut self.accent_color, later.accent_color);
        take_later(&mut self.tiers, later.tiers);
    }

    /// Owned variant of [`ProfilePatch::merge`]
    #[inline]
    #[must_use]
    pub fn merged(mut self, later: ProfilePatch) -> Self {
        self.merge(later);
        self
    }
}

/// One write issued by the synchronizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushRequest {
    /// Target record
    pub profile_id: ProfileId,
    /// Deduplication key
    pub mutation_id: MutationId,
    /// Wall-clock time the flush was issued
    pub client_time: DateTime<Utc>,
    /// Accumulated patch
    pub patch: ProfilePatch,
}

impl FlushRequest {
    /// Create request stamped with a fresh mutation id and the current time
    #[inline]
    #[must_use]
    pub fn new(profile_id: ProfileId, patch: ProfilePatch) -> Self {
        Self {
            profile_id,
            mutation_id: MutationId::new(),
            client_time: Utc::now(),
            patch,
        }
    }

    /// With explicit mutation id (retries reuse the original id)
    #[inline]
    #[must_use]
    pub fn with_mutation_id(mut self, mutation_id: MutationId) -> Self {
        self.mutation_id = mutation_id;
        self
    }
}
