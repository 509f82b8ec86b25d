//! Authorization-code callback on the authentication domain.
//!
//! The flow is a chain of states, each consumed by the step that produces
//! the next:
//!
//! `AwaitingCode` → `ExchangingCode` → `FetchingIdentity` → `IssuingSession`
//! → `Redirecting`
//!
//! Any step failing aborts the request with `401` and no cookies.

use chrono::{DateTime, Duration, Utc};
use gatehouse_session::{IdentityClaims, MasterSecret, UrlState, UserState};
use rootcause::prelude::Report;
use serde::Deserialize;
use tracing::info;
use url::Url;

use super::delegation::delegation_url;
use super::oidc::OidcClient;
use crate::error::FlowError;

/// Query parameters the identity provider sends back.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// Callback received; nothing checked yet.
pub struct AwaitingCode {
    query: CallbackQuery,
}

/// CSRF binding verified; holds the code to redeem.
pub struct ExchangingCode {
    code: String,
    url_state: UrlState,
}

/// Code redeemed for an access token.
pub struct FetchingIdentity {
    access_token: String,
    url_state: UrlState,
}

/// Identity known; ready to mint a session.
pub struct IssuingSession {
    claims: IdentityClaims,
    url_state: UrlState,
}

/// Session minted; ready to hand it to the protected domain.
pub struct Redirecting {
    session_token: String,
    url_state: UrlState,
}

impl AwaitingCode {
    pub fn new(query: CallbackQuery) -> Self {
        Self { query }
    }

    /// Checks the callback against the CSRF cookie.
    ///
    /// The cookie holds a URL-State signed with this host's domain key; the
    /// provider's `state` parameter must equal its nonce.
    pub fn accept(
        self,
        csrf_cookie: Option<&str>,
        host: &str,
        secret: &MasterSecret,
    ) -> Result<ExchangingCode, Report<FlowError>> {
        let code =
            non_empty(self.query.code).ok_or(FlowError::MissingParameter { name: "code" })?;
        let state =
            non_empty(self.query.state).ok_or(FlowError::MissingParameter { name: "state" })?;
        let cookie = csrf_cookie.ok_or_else(|| FlowError::MissingCookie {
            name: "csrf".to_string(),
        })?;

        let url_state =
            UrlState::verify(cookie, &secret.domain_key(host)).map_err(FlowError::from)?;
        if !url_state.nonce_matches(&state) {
            return Err(
                FlowError::invalid_state("state parameter does not match CSRF cookie").into(),
            );
        }

        Ok(ExchangingCode { code, url_state })
    }
}

impl ExchangingCode {
    /// Redeems the code. `redirect_uri` must be the callback URL without its
    /// query, exactly as sent in the authorization request.
    pub async fn exchange(
        self,
        client: &OidcClient,
        redirect_uri: &Url,
    ) -> Result<FetchingIdentity, Report<FlowError>> {
        let access_token = client.exchange_code(&self.code, redirect_uri).await?;
        Ok(FetchingIdentity {
            access_token,
            url_state: self.url_state,
        })
    }
}

impl FetchingIdentity {
    pub async fn fetch(self, client: &OidcClient) -> Result<IssuingSession, Report<FlowError>> {
        let claims = client.fetch_userinfo(&self.access_token).await?;
        Ok(IssuingSession {
            claims,
            url_state: self.url_state,
        })
    }
}

impl IssuingSession {
    pub fn issue(
        self,
        secret: &MasterSecret,
        now: DateTime<Utc>,
        duration: Duration,
    ) -> Redirecting {
        let user = UserState::issue(self.claims, now, duration);
        info!(
            username = %user.username(),
            expires = %user.expiration(),
            "issued session"
        );
        Redirecting {
            session_token: user.sign(secret),
            url_state: self.url_state,
        }
    }
}

impl Redirecting {
    /// The signed session, for the authentication domain's own cookie.
    #[must_use]
    pub fn session_token(&self) -> &str {
        &self.session_token
    }

    /// Delegation URL on the return URL's host. The URL-State is re-signed
    /// with that host's key so the protected domain can verify it.
    pub fn location(
        &self,
        secret: &MasterSecret,
        delegation_path: &str,
    ) -> Result<Url, Report<FlowError>> {
        let destination = self.url_state.destination().map_err(FlowError::from)?;
        let signed = self.url_state.sign(&secret.domain_key(&destination));
        delegation_url(&self.url_state, delegation_path, &signed, &self.session_token)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
