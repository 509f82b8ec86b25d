//! Cross-domain session delegation.
//!
//! A protected domain cannot read the authentication domain's cookies, so
//! the session travels as the `u` query parameter of a single redirect to the
//! protected domain's delegation path, next to the URL-State `s` that proves
//! the redirect was requested by that domain.

use chrono::{DateTime, Utc};
use gatehouse_session::{MasterSecret, UrlState, UserState};
use rootcause::prelude::Report;
use tracing::debug;
use url::Url;

use crate::error::FlowError;

/// Outcome of the delegation entry point on the authentication domain.
#[derive(Debug)]
pub enum EntryDecision {
    /// A valid session exists; send it to the protected domain.
    Delegating(Url),
    /// No usable session; start the authorization-code flow.
    Authorizing(UrlState),
}

/// Decides what the authentication domain does with a delegation request.
///
/// `signed_state` is the `s` parameter, signed by the protected domain for
/// itself. A missing or invalid `s` is a hard error. A missing, invalid or
/// expired session is not: the user is sent to the identity provider.
pub fn decide_entry(
    secret: &MasterSecret,
    delegation_path: &str,
    signed_state: Option<&str>,
    session_cookie: Option<&str>,
    now: DateTime<Utc>,
) -> Result<EntryDecision, Report<FlowError>> {
    let signed_state = signed_state
        .filter(|s| !s.is_empty())
        .ok_or(FlowError::MissingParameter { name: "s" })?;
    let url_state =
        UrlState::verify_for_destination(signed_state, secret).map_err(FlowError::from)?;

    let Some(cookie) = session_cookie else {
        return Ok(EntryDecision::Authorizing(url_state));
    };

    match UserState::verify(cookie, secret, now) {
        Ok(user) => {
            debug!(username = %user.username(), "delegating existing session");
            let location = delegation_url(&url_state, delegation_path, signed_state, cookie)?;
            Ok(EntryDecision::Delegating(location))
        }
        Err(e) => {
            debug!(error = %e, "session unusable, re-authenticating");
            Ok(EntryDecision::Authorizing(url_state))
        }
    }
}

/// `{scheme}://{return host}{delegation_path}?s=..&u=..` for `url_state`.
pub fn delegation_url(
    url_state: &UrlState,
    delegation_path: &str,
    signed_state: &str,
    session_token: &str,
) -> Result<Url, Report<FlowError>> {
    let return_url = url_state.return_url();
    let destination = url_state.destination().map_err(FlowError::from)?;

    let mut url = Url::parse(&format!(
        "{}://{}{}",
        return_url.scheme(),
        destination,
        delegation_path
    ))
    .map_err(|e| FlowError::invalid_state(format!("invalid delegation URL: {}", e)))?;
    url.query_pairs_mut()
        .append_pair("s", signed_state)
        .append_pair("u", session_token);
    Ok(url)
}

/// A delegation that passed every check on the protected domain.
#[derive(Debug)]
pub struct Finalized {
    pub user: UserState,
    pub session_token: String,
    pub return_url: Url,
}

/// Inputs to the finalize step on a protected domain.
pub struct FinalizeRequest<'a> {
    pub host: &'a str,
    pub signed_state: Option<&'a str>,
    pub session_token: Option<&'a str>,
    pub csrf_cookie: Option<&'a str>,
}

/// Checks a delegation landing on `request.host`. All-or-nothing: any failed
/// check is an error and nothing from the request is trusted.
pub fn finalize(
    secret: &MasterSecret,
    request: FinalizeRequest<'_>,
    now: DateTime<Utc>,
) -> Result<Finalized, Report<FlowError>> {
    let signed_state = request
        .signed_state
        .filter(|s| !s.is_empty())
        .ok_or(FlowError::MissingParameter { name: "s" })?;
    let url_state =
        UrlState::verify(signed_state, &secret.domain_key(request.host)).map_err(FlowError::from)?;

    let destination = url_state.destination().map_err(FlowError::from)?;
    if destination != request.host {
        return Err(FlowError::invalid_state(format!(
            "delegation for {} arrived at {}",
            destination, request.host
        ))
        .into());
    }

    let csrf = request.csrf_cookie.ok_or_else(|| FlowError::MissingCookie {
        name: "csrf".to_string(),
    })?;
    if !url_state.nonce_matches(csrf) {
        return Err(FlowError::invalid_state("CSRF cookie does not match state nonce").into());
    }

    let session_token = request
        .session_token
        .filter(|u| !u.is_empty())
        .ok_or(FlowError::MissingParameter { name: "u" })?;
    let user = UserState::verify(session_token, secret, now).map_err(FlowError::from)?;

    Ok(Finalized {
        user,
        session_token: session_token.to_string(),
        return_url: url_state.return_url().clone(),
    })
}
