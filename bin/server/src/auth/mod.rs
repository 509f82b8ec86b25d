//! Authentication module for the gatehouse server.
//!
//! This module provides:
//! - The authorization-code flow against the identity provider
//! - Cross-domain session delegation
//! - Forward-auth access verification for the reverse proxy
//!
//! # Session Model
//!
//! Nothing is stored server-side. A session is a signed `UserState` cookie;
//! redirect state is a signed `UrlState` carried in a query parameter and
//! bound to a CSRF cookie. Both verify against the process-wide master
//! secret held in [`AppState`], so a restart invalidates every session.
//!
//! # Domains
//!
//! The *authentication domain* (`ACCESS_BASE_URL`) talks to the identity
//! provider and holds the canonical session cookie. Every other host is a
//! *protected domain*: it cannot read the authentication domain's cookies, so
//! it receives its own copy of the session through a one-hop delegation
//! redirect to its delegation path.

pub mod access;
pub mod authorize;
pub mod cookies;
pub mod delegation;
pub mod middleware;
pub mod oidc;
pub mod routes;
pub mod whoami;

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use gatehouse_session::MasterSecret;
use url::Url;

use crate::config::ServerConfig;

pub use middleware::ForwardedRequest;
pub use oidc::OidcClient;

/// Shared application state.
pub struct AppState {
    /// Server configuration.
    pub config: ServerConfig,
    /// Signing secret for every token this process issues.
    pub secret: MasterSecret,
    /// Identity provider client.
    pub oidc_client: OidcClient,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(config: ServerConfig, secret: MasterSecret, oidc_client: OidcClient) -> Self {
        Self {
            config,
            secret,
            oidc_client,
        }
    }
}

/// `302 Found` to `location`.
pub(crate) fn found(location: &Url) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.as_str())]).into_response()
}
