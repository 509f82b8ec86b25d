//! Request-context extractor for Axum.
//!
//! The sidecar sits behind a reverse proxy, so the host, scheme and (for
//! forward-auth checks) the path the browser actually requested arrive in
//! `X-Forwarded-*` headers rather than in the request line.

use axum::{
    extract::{FromRequestParts, Query},
    http::{HeaderMap, header, request::Parts},
};
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{FlowError, Unauthorized};

const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_FORWARDED_URI: &str = "x-forwarded-uri";

/// The client-facing URL of the current request.
#[derive(Debug, Clone)]
pub struct ForwardedRequest {
    url: Url,
    forwarded_uri: Option<String>,
}

impl<S> FromRequestParts<S> for ForwardedRequest
where
    S: Send + Sync,
{
    type Rejection = Unauthorized;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts)?)
    }
}

/// Query-string extractor that fails like the flows do: `401`, detail logged.
#[derive(Debug)]
pub struct FlowQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for FlowQuery<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = Unauthorized;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::try_from_uri(&parts.uri)
            .map_err(|e| FlowError::invalid_state(format!("malformed query string: {}", e)))?;
        Ok(Self(value))
    }
}

impl ForwardedRequest {
    fn from_parts(parts: &Parts) -> Result<Self, FlowError> {
        let host = effective_host(&parts.headers)
            .or_else(|| parts.uri.authority().map(|a| a.as_str()))
            .ok_or(FlowError::MissingHost)?;

        let scheme = first_value(&parts.headers, X_FORWARDED_PROTO).unwrap_or("http");
        if scheme != "http" && scheme != "https" {
            return Err(FlowError::invalid_state(format!(
                "unsupported forwarded scheme {:?}",
                scheme
            )));
        }

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        let url = Url::parse(&format!("{}://{}{}", scheme, host, path_and_query))
            .map_err(|e| FlowError::invalid_state(format!("invalid request URL: {}", e)))?;

        Ok(Self {
            url,
            forwarded_uri: first_value(&parts.headers, X_FORWARDED_URI).map(str::to_string),
        })
    }

    /// The request URL as seen by the client, path taken from the request line.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Host (and non-default port) the client addressed.
    #[must_use]
    pub fn host(&self) -> String {
        gatehouse_session::authority(&self.url).unwrap_or_default()
    }

    /// The request URL with its query removed.
    #[must_use]
    pub fn url_without_query(&self) -> Url {
        let mut url = self.url.clone();
        url.set_query(None);
        url
    }

    /// The URL the browser originally asked the proxy for.
    ///
    /// Path and query come from `X-Forwarded-Uri` when present; host and
    /// scheme are never taken from it. An unparsable value is logged and
    /// ignored.
    #[must_use]
    pub fn original_url(&self) -> Url {
        let mut url = self.url.clone();
        let Some(uri) = &self.forwarded_uri else {
            return url;
        };

        match Url::options().base_url(Some(&self.url)).parse(uri) {
            Ok(parsed) => {
                url.set_path(parsed.path());
                url.set_query(parsed.query());
            }
            Err(e) => {
                tracing::warn!(uri = %uri, error = %e, "failed to parse X-Forwarded-Uri");
            }
        }
        url
    }
}

/// Host from `X-Forwarded-Host`, falling back to `Host`.
pub(crate) fn effective_host(headers: &HeaderMap) -> Option<&str> {
    first_value(headers, X_FORWARDED_HOST).or_else(|| {
        headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    })
}

/// Normalized `host[:port]` of the effective host, default port omitted.
pub(crate) fn effective_authority(headers: &HeaderMap) -> Option<String> {
    let host = effective_host(headers)?;
    let scheme = first_value(headers, X_FORWARDED_PROTO).unwrap_or("http");
    let url = Url::parse(&format!("{}://{}/", scheme, host)).ok()?;
    gatehouse_session::authority(&url)
}

/// First comma-separated entry of a header, trimmed.
fn first_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
