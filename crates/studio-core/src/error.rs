//! Error types for Studio
//!
//! Every failure a route or store can report belongs to one of seven kinds.
//! Each kind carries a fixed HTTP status and a stable string code; clients
//! receive it as a uniform JSON envelope:
//!
//! ```json
//! { "error": { "code": "not_found", "message": "profile not found: 01H..." } }
//! ```

use crate::types::ProfileId;
use serde::{Deserialize, Serialize};

/// Shared error taxonomy
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Request payload failed validation
    #[error("validation failed: {message}")]
    Validation {
        /// Summary message
        message: String,
        /// Per-field problems
        fields: Vec<FieldError>,
    },

    /// Missing or unknown credentials
    #[error("authentication required: {0}")]
    Authentication(String),

    /// Authenticated caller may not touch this resource
    #[error("forbidden: {0}")]
    Authorization(String),

    /// Resource does not exist
    #[error("{resource} not found: {id}")]
    NotFound {
        /// Resource kind
        resource: String,
        /// Requested identifier
        id: String,
    },

    /// Request conflicts with current state
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller exceeded its request budget
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds until the current window closes
        retry_after_secs: u64,
    },

    /// Anything else
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Validation error without field details
    #[inline]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Profile not found
    #[inline]
    #[must_use]
    pub fn profile_not_found(id: ProfileId) -> Self {
        Self::NotFound {
            resource: "profile".to_string(),
            id: id.to_string(),
        }
    }

    /// HTTP status code for this error
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::Authentication(_) => 401,
            Self::Authorization(_) => 403,
            Self::NotFound { .. } => 404,
            Self::Conflict(_) => 409,
            Self::RateLimited { .. } => 429,
            Self::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::Authentication(_) => "unauthorized",
            Self::Authorization(_) => "forbidden",
            Self::NotFound { .. } => "not_found",
            Self::Conflict(_) => "conflict",
            Self::RateLimited { .. } => "rate_limited",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Check if the caller caused the error
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status() < 500
    }

    /// Render the JSON envelope sent to clients
    ///
    /// Internal details never leave the process; the envelope carries a
    /// generic message for them.
    #[must_use]
    pub fn envelope(&self) -> ErrorEnvelope {
        let message = match self {
            Self::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        };
        let fields = match self {
            Self::Validation { fields, .. } => fields.clone(),
            _ => Vec::new(),
        };
        let retry_after_secs = match self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };

        ErrorEnvelope {
            error: ErrorBody {
                code: self.code().to_string(),
                message,
                fields,
                retry_after_secs,
            },
        }
    }

    /// Rebuild an error from a status and envelope received over HTTP
    #[must_use]
    pub fn from_envelope(status: u16, envelope: ErrorEnvelope) -> Self {
        let ErrorBody {
            code,
            message,
            fields,
            retry_after_secs,
        } = envelope.error;

        match (status, code.as_str()) {
            (400, _) | (_, "validation_error") => Self::Validation { message, fields },
            (401, _) | (_, "unauthorized") => Self::Authentication(message),
            (403, _) | (_, "forbidden") => Self::Authorization(message),
            (404, _) | (_, "not_found") => Self::NotFound {
                resource: "remote".to_string(),
                id: message,
            },
            (409, _) | (_, "conflict") => Self::Conflict(message),
            (429, _) | (_, "rate_limited") => Self::RateLimited {
                retry_after_secs: retry_after_secs.unwrap_or(1),
            },
            _ => Self::Internal(format!("{status}: {message}")),
        }
    }
}

/// Validation problem attached to one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field path (`tiers[1].price_minor`)
    pub field: String,
    /// Human-readable message
    pub message: String,
}

impl FieldError {
    /// Create new field error
    #[inline]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Uniform JSON error envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Error body
    pub error: ErrorBody,
}

/// Body of [`ErrorEnvelope`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable code
    pub code: String,
    /// Message safe to show to clients
    pub message: String,
    /// Field details for validation errors
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
    /// Retry hint for rate-limited requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// Errors surfaced by profile stores
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store answered with a taxonomy error
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The store could not be reached
    #[error("transport failure: {0}")]
    Transport(String),
}

impl StoreError {
    /// Check if a later attempt may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::Api(ApiError::RateLimited { .. } | ApiError::Internal(_))
        )
    }
}
