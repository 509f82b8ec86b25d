//! Identity provider client built on the oauth2 crate.
//!
//! The provider is an authentik-style OAuth2 server: an authorization
//! endpoint for the browser, plus a token endpoint and a userinfo endpoint
//! reached over the backchannel.

use gatehouse_session::IdentityClaims;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl,
    RequestTokenError, Scope, TokenResponse, TokenUrl, basic::BasicClient,
};
use rootcause::prelude::Report;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::ServerConfig;
use crate::error::FlowError;

const AUTHORIZE_PATH: &str = "/application/o/authorize/";
const TOKEN_PATH: &str = "/application/o/token/";
const USERINFO_PATH: &str = "/application/o/userinfo/";

/// Scopes requested from the provider.
const SCOPES: &[&str] = &["openid", "email", "profile", "groups", "entitlements"];

/// OAuth2 client for the identity provider.
#[derive(Clone)]
pub struct OidcClient {
    client_id: ClientId,
    client_secret: ClientSecret,
    authorize_endpoint: Url,
    token_endpoint: Url,
    userinfo_endpoint: Url,
    http_client: reqwest::Client,
}

impl OidcClient {
    /// Creates a client from server configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &ServerConfig) -> Result<Self, OidcError> {
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(config.provider_timeout_seconds))
            .build()
            .map_err(|e| {
                OidcError::Configuration(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client_id: ClientId::new(config.authentik_client_id.clone()),
            client_secret: ClientSecret::new(config.authentik_client_secret.clone()),
            authorize_endpoint: with_path(&config.authentik_base_url, AUTHORIZE_PATH),
            token_endpoint: with_path(config.backchannel_url(), TOKEN_PATH),
            userinfo_endpoint: with_path(config.backchannel_url(), USERINFO_PATH),
            http_client,
        })
    }

    /// Builds the provider URL that starts an authorization-code flow.
    ///
    /// `nonce` becomes the OAuth2 `state` parameter.
    #[must_use]
    pub fn authorization_url(&self, redirect_uri: &Url, nonce: &str) -> Url {
        let client = BasicClient::new(self.client_id.clone())
            .set_auth_uri(AuthUrl::from_url(self.authorize_endpoint.clone()))
            .set_redirect_uri(RedirectUrl::from_url(redirect_uri.clone()));

        let state = CsrfToken::new(nonce.to_string());
        let (auth_url, _) = client
            .authorize_url(move || state)
            .add_scopes(SCOPES.iter().map(|scope| Scope::new((*scope).to_string())))
            .url();

        auth_url
    }

    /// Exchanges an authorization code for an access token.
    ///
    /// Client credentials travel in the form body. A response without a
    /// usable `access_token` is logged verbatim and treated as a failure.
    #[instrument(skip_all)]
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &Url,
    ) -> Result<String, Report<FlowError>> {
        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_type(AuthType::RequestBody)
            .set_token_uri(TokenUrl::from_url(self.token_endpoint.clone()))
            .set_redirect_uri(RedirectUrl::from_url(redirect_uri.clone()));

        let token_response = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|err| {
                if let RequestTokenError::Parse(_, body) = &err {
                    warn!(
                        response = %String::from_utf8_lossy(body),
                        "unusable token response"
                    );
                }
                FlowError::TokenExchange {
                    details: err.to_string(),
                }
            })?;

        let access_token = token_response.access_token().secret();
        if access_token.is_empty() {
            warn!(
                response = %serde_json::to_string(&token_response).unwrap_or_default(),
                "token response has empty access_token"
            );
            return Err(FlowError::TokenExchange {
                details: "missing access_token in token response".to_string(),
            }
            .into());
        }

        debug!("exchanged authorization code");
        Ok(access_token.clone())
    }

    /// Fetches identity claims with `access_token` as a bearer credential.
    #[instrument(skip_all)]
    pub async fn fetch_userinfo(
        &self,
        access_token: &str,
    ) -> Result<IdentityClaims, Report<FlowError>> {
        let response = self
            .http_client
            .get(self.userinfo_endpoint.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| FlowError::UserInfo {
                details: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FlowError::UserInfo {
                details: format!("userinfo request returned status {}", status),
            }
            .into());
        }

        let claims: IdentityClaims = response.json().await.map_err(|e| FlowError::UserInfo {
            details: format!("failed to decode userinfo response: {}", e),
        })?;

        debug!(username = %claims.username, "fetched userinfo");
        Ok(claims)
    }
}

fn with_path(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    url.set_path(path);
    url.set_query(None);
    url
}

/// Identity provider client errors.
#[derive(Debug)]
pub enum OidcError {
    /// Configuration error (invalid URLs, HTTP client setup, etc.)
    Configuration(String),
}

impl std::fmt::Display for OidcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "identity provider configuration error: {}", msg),
        }
    }
}

impl std::error::Error for OidcError {}
