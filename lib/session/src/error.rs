//! Error types for token verification.
//!
//! Both variants are recoverable: callers answer them by sending the browser
//! back through the redirect flow rather than failing the request outright.

use chrono::{DateTime, Utc};
use std::fmt;

/// Errors from decoding or verifying a signed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Malformed, unsigned, tampered, or wrong-version token.
    InvalidState { reason: String },
    /// Well-formed and correctly signed, but past its expiry.
    Expired { expired_at: DateTime<Utc> },
}

impl TokenError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }

    /// Returns true if the token verified but has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired { .. })
    }
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidState { reason } => write!(f, "invalid state: {reason}"),
            Self::Expired { expired_at } => {
                write!(f, "state expired at {}", expired_at.to_rfc3339())
            }
        }
    }
}

impl std::error::Error for TokenError {}
