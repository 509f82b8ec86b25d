//! HTTP handlers for the authentication and protected domains.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use gatehouse_session::UrlState;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::{
    AppState, ForwardedRequest,
    access::{self, AccessDecision},
    authorize::{AwaitingCode, CallbackQuery},
    cookies::{self, Domain},
    delegation::{self, EntryDecision, FinalizeRequest},
    found,
    middleware::FlowQuery,
    whoami,
};
use crate::error::{FlowError, Unauthorized};

/// Query parameters of the delegation entry point.
#[derive(Debug, Default, Deserialize)]
pub struct EntryQuery {
    #[serde(default)]
    s: Option<String>,
}

fn cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name).map(|cookie| cookie.value().to_string())
}

/// Liveness probe.
pub async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Everything on the authentication domain that is not a known route.
pub async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Identity provider callback on the authentication domain.
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    request: ForwardedRequest,
    FlowQuery(query): FlowQuery<CallbackQuery>,
    jar: CookieJar,
) -> Result<(CookieJar, Response), Unauthorized> {
    let config = &state.config;
    let csrf = cookie_value(&jar, &config.csrf_cookie_name);

    let redirecting = AwaitingCode::new(query)
        .accept(csrf.as_deref(), &request.host(), &state.secret)?
        .exchange(&state.oidc_client, &request.url_without_query())
        .await?
        .fetch(&state.oidc_client)
        .await?
        .issue(&state.secret, Utc::now(), config.session_duration());

    let location = redirecting.location(&state.secret, &config.delegation_path)?;
    let jar = jar
        .add(cookies::session(
            config,
            redirecting.session_token().to_string(),
            Domain::Authentication,
        ))
        .add(cookies::clear_csrf(config));

    Ok((jar, found(&location)))
}

/// Delegation entry point (`/`) on the authentication domain.
pub async fn delegate(
    State(state): State<Arc<AppState>>,
    request: ForwardedRequest,
    FlowQuery(query): FlowQuery<EntryQuery>,
    jar: CookieJar,
) -> Result<(CookieJar, Response), Unauthorized> {
    let config = &state.config;
    let session = cookie_value(&jar, &config.cookie_name);

    let decision = delegation::decide_entry(
        &state.secret,
        &config.delegation_path,
        query.s.as_deref(),
        session.as_deref(),
        Utc::now(),
    )?;

    match decision {
        EntryDecision::Delegating(location) => Ok((jar, found(&location))),
        EntryDecision::Authorizing(url_state) => {
            let csrf = url_state.sign(&state.secret.domain_key(&request.host()));
            let location = state
                .oidc_client
                .authorization_url(&config.authorize_redirect_url(), url_state.nonce());
            debug!(return_url = %url_state.return_url(), "starting authorization");
            let jar = jar.add(cookies::csrf(config, csrf, Domain::Authentication));
            Ok((jar, found(&location)))
        }
    }
}

/// Current identity on the authentication domain.
pub async fn whoami(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let session = cookie_value(&jar, &state.config.cookie_name);
    whoami::whoami(&state.secret, session.as_deref(), Utc::now())
}

/// Delegation landing path on a protected domain.
///
/// `?whoami` reports the local session; anything else finalizes a delegation.
pub async fn finalize_delegation(
    State(state): State<Arc<AppState>>,
    request: ForwardedRequest,
    FlowQuery(query): FlowQuery<HashMap<String, String>>,
    jar: CookieJar,
) -> Result<Response, Unauthorized> {
    let config = &state.config;
    if query.contains_key("whoami") {
        let session = cookie_value(&jar, &config.cookie_name);
        return Ok(whoami::whoami(&state.secret, session.as_deref(), Utc::now()));
    }

    let host = request.host();
    let csrf = cookie_value(&jar, &config.csrf_cookie_name);
    let finalized = delegation::finalize(
        &state.secret,
        FinalizeRequest {
            host: &host,
            signed_state: query.get("s").map(String::as_str),
            session_token: query.get("u").map(String::as_str),
            csrf_cookie: csrf.as_deref(),
        },
        Utc::now(),
    )?;

    debug!(
        username = %finalized.user.username(),
        host = %host,
        "delegated session"
    );
    let jar = jar
        .add(cookies::session(
            config,
            finalized.session_token,
            Domain::Protected,
        ))
        .add(cookies::clear_csrf(config));

    Ok((jar, found(&finalized.return_url)).into_response())
}

/// Forward-auth check for any other request on a protected domain.
pub async fn verify_access(
    State(state): State<Arc<AppState>>,
    request: ForwardedRequest,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Response, Unauthorized> {
    let config = &state.config;
    let session = cookie_value(&jar, &config.cookie_name);

    match access::check_session(&state.secret, session.as_deref(), Utc::now()) {
        AccessDecision::Allow(user) => {
            let expected = headers
                .get(config.expected_groups_header())
                .and_then(|value| value.to_str().ok());
            access::enforce_groups(&user, expected)?;
            let identity = access::identity_headers(&user, &config.header_prefix)?;
            Ok((StatusCode::NO_CONTENT, identity).into_response())
        }
        AccessDecision::Reauthenticate => Ok(redirect_to_access(&state, &request, jar)?),
    }
}

/// Sends the browser to the authentication domain with a URL-State signed
/// for this host, and remembers its nonce in a host-only CSRF cookie.
fn redirect_to_access(
    state: &AppState,
    request: &ForwardedRequest,
    jar: CookieJar,
) -> Result<Response, FlowError> {
    let config = &state.config;
    let url_state = UrlState::new(request.original_url());
    let destination = url_state.destination()?;
    let signed = url_state.sign(&state.secret.domain_key(&destination));

    let mut location = config.access_base_url.clone();
    location.query_pairs_mut().append_pair("s", &signed);

    let jar = jar.add(cookies::csrf(
        config,
        url_state.nonce().to_string(),
        Domain::Protected,
    ));
    Ok((jar, found(&location)).into_response())
}
