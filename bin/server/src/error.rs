//! Error types for the request flows.
//!
//! Flows return `Report<FlowError>` so each step can be reported with its
//! cause. Every error that escapes a handler becomes a bare
//! `401 Unauthorized`; the detail goes to the log only.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gatehouse_session::TokenError;
use rootcause::prelude::Report;
use std::fmt;

/// Errors that abort a request.
#[derive(Debug)]
pub enum FlowError {
    /// A required query parameter was absent or empty.
    MissingParameter { name: &'static str },
    /// A required cookie was absent.
    MissingCookie { name: String },
    /// The request carried no usable host.
    MissingHost,
    /// A token failed to parse or verify, or a CSRF/host binding check failed.
    InvalidState { reason: String },
    /// A session token verified but has expired.
    Expired { reason: String },
    /// The authorization code could not be exchanged for an access token.
    TokenExchange { details: String },
    /// The identity provider's userinfo endpoint failed.
    UserInfo { details: String },
    /// The user lacks a group the proxy demanded.
    MissingGroups {
        username: String,
        required: Vec<String>,
    },
    /// A response could not be assembled.
    Internal { details: String },
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingParameter { name } => write!(f, "missing {} parameter", name),
            Self::MissingCookie { name } => write!(f, "missing {} cookie", name),
            Self::MissingHost => write!(f, "request has no host"),
            Self::InvalidState { reason } => write!(f, "invalid state: {}", reason),
            Self::Expired { reason } => write!(f, "expired state: {}", reason),
            Self::TokenExchange { details } => write!(f, "token exchange failed: {}", details),
            Self::UserInfo { details } => write!(f, "userinfo request failed: {}", details),
            Self::MissingGroups { username, required } => write!(
                f,
                "user '{}' missing required groups: {}",
                username,
                required.join(",")
            ),
            Self::Internal { details } => write!(f, "internal error: {}", details),
        }
    }
}

impl std::error::Error for FlowError {}

impl FlowError {
    pub(crate) fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }
}

impl From<TokenError> for FlowError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidState { reason } => Self::InvalidState { reason },
            expired @ TokenError::Expired { .. } => Self::Expired {
                reason: expired.to_string(),
            },
        }
    }
}

/// Response for any failed flow: logs the report, renders `401`.
#[derive(Debug)]
pub struct Unauthorized(pub Report<FlowError>);

impl From<Report<FlowError>> for Unauthorized {
    fn from(report: Report<FlowError>) -> Self {
        Self(report)
    }
}

impl From<FlowError> for Unauthorized {
    fn from(err: FlowError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for Unauthorized {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self.0, "request failed");
        (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
    }
}
