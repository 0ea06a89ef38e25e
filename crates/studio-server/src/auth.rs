//! Request authentication
//!
//! The identity provider is an external collaborator; the server only needs
//! to turn an `Authorization` header into an owner id.

use std::collections::HashMap;
use studio_core::{ApiError, AuthConfig, OwnerId};

/// Maps request credentials to an owner
pub trait Authenticator: Send + Sync {
    /// Resolve the `Authorization` header value
    ///
    /// # Errors
    /// `ApiError::Authentication` for missing, malformed or unknown
    /// credentials
    fn authenticate(&self, authorization: Option<&str>) -> Result<OwnerId, ApiError>;
}

/// Static bearer-token table from configuration
#[derive(Clone, Default)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, OwnerId>,
}

impl StaticTokenAuthenticator {
    /// Create from a token table
    #[must_use]
    pub fn new(tokens: HashMap<String, OwnerId>) -> Self {
        Self { tokens }
    }

    /// Create from the `[auth]` config section
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.tokens.clone())
    }

    /// Register a token
    #[inline]
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, owner: OwnerId) -> Self {
        self.tokens.insert(token.into(), owner);
        self
    }
}

impl std::fmt::Debug for StaticTokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenAuthenticator")
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

impl Authenticator for StaticTokenAuthenticator {
    fn authenticate(&self, authorization: Option<&str>) -> Result<OwnerId, ApiError> {
        let header = authorization
            .ok_or_else(|| ApiError::Authentication("missing bearer token".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::Authentication("malformed authorization header".to_string()))?;

        self.tokens
            .get(token)
            .copied()
            .ok_or_else(|| ApiError::Authentication("unknown token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_bearer_token() {
        let owner = OwnerId::new();
        let auth = StaticTokenAuthenticator::default().with_token("s3cret", owner);

        assert_eq!(auth.authenticate(Some("Bearer s3cret")), Ok(owner));
        assert_eq!(auth.authenticate(Some("bearer s3cret ")), Ok(owner));
    }

    #[test]
    fn rejects_missing_malformed_and_unknown() {
        let auth = StaticTokenAuthenticator::default().with_token("s3cret", OwnerId::new());

        for header in [None, Some("s3cret"), Some("Bearer "), Some("Bearer nope")] {
            let err = auth.authenticate(header).unwrap_err();
            assert_eq!(err.status(), 401, "{header:?}");
        }
    }

    #[test]
    fn debug_hides_tokens() {
        let auth = StaticTokenAuthenticator::default().with_token("s3cret", OwnerId::new());
        assert!(!format!("{auth:?}").contains("s3cret"));
    }
}
