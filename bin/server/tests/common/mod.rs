//! Shared harness for driving the router against a mock identity provider.

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use axum_extra::extract::cookie::Cookie;
use chrono::{Duration, Utc};
use gatehouse_server::{
    app,
    auth::{AppState, OidcClient},
    config::ServerConfig,
};
use gatehouse_session::{IdentityClaims, MasterSecret, UserState};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string_contains, header as header_matcher, method, path},
};

pub const ACCESS_HOST: &str = "access.test";
pub const APP_HOST: &str = "app.test";
pub const DELEGATION_PATH: &str = "/.well-known/gatehouse/";
pub const ACCESS_TOKEN: &str = "test-access-token";

/// Router plus the mock identity provider behind it.
pub struct TestHarness {
    pub idp: MockServer,
    pub state: Arc<AppState>,
    pub app: Router,
}

impl TestHarness {
    pub async fn start() -> Self {
        let idp = MockServer::start().await;
        let config: ServerConfig = serde_json::from_value(json!({
            "access_base_url": format!("http://{}/", ACCESS_HOST),
            "authentik_base_url": idp.uri(),
            "authentik_client_id": "test-client",
            "authentik_client_secret": "test-secret",
            "secure_cookies": false,
        }))
        .expect("config");
        config.validate().expect("valid config");

        let oidc_client = OidcClient::new(&config).expect("oidc client");
        let state = Arc::new(AppState::new(config, MasterSecret::generate(), oidc_client));
        let app = app::router(state.clone());

        Self { idp, state, app }
    }

    /// Token endpoint that accepts any code sent with the right credentials.
    pub async fn mock_token_success(&self) {
        Mock::given(method("POST"))
            .and(path("/application/o/token/"))
            .and(body_string_contains("client_secret=test-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": ACCESS_TOKEN,
                "token_type": "Bearer",
                "expires_in": 3600,
            })))
            .mount(&self.idp)
            .await;
    }

    pub async fn mock_token_error(&self) {
        Mock::given(method("POST"))
            .and(path("/application/o/token/"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Authorization code is invalid or expired",
            })))
            .mount(&self.idp)
            .await;
    }

    /// Token endpoint answering `200` with an arbitrary body.
    pub async fn mock_token_body(&self, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/application/o/token/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.idp)
            .await;
    }

    pub async fn mock_userinfo_status(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path("/application/o/userinfo/"))
            .respond_with(ResponseTemplate::new(status).set_body_string("upstream failure"))
            .mount(&self.idp)
            .await;
    }

    pub async fn mock_userinfo(&self) {
        Mock::given(method("GET"))
            .and(path("/application/o/userinfo/"))
            .and(header_matcher(
                "authorization",
                format!("Bearer {}", ACCESS_TOKEN).as_str(),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sub": "u1",
                "preferred_username": "alice",
                "groups": ["eng"],
            })))
            .mount(&self.idp)
            .await;
    }

    /// Sends a GET for `uri` as the proxy would forward it for `host`.
    pub async fn get(&self, host: &str, uri: &str, cookies: &[(&str, &str)]) -> Response<Body> {
        self.get_with_headers(host, uri, cookies, &[]).await
    }

    pub async fn get_with_headers(
        &self,
        host: &str,
        uri: &str,
        cookies: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Response<Body> {
        let mut builder = Request::builder().uri(uri).header(header::HOST, host);
        if !cookies.is_empty() {
            let cookie_header = cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(header::COOKIE, cookie_header);
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        self.app
            .clone()
            .oneshot(builder.body(Body::empty()).expect("request"))
            .await
            .expect("infallible")
    }

    /// A signed session for alice, as if issued by this server.
    pub fn session_for(&self, groups: &[&str]) -> String {
        let claims = IdentityClaims {
            subject_id: "u1".to_string(),
            username: "alice".to_string(),
            groups: groups.iter().map(|g| g.to_string()).collect(),
            ..IdentityClaims::default()
        };
        UserState::issue(claims, Utc::now(), Duration::minutes(60)).sign(&self.state.secret)
    }
}

/// Cookies set by `response`.
pub fn set_cookies(response: &Response<Body>) -> Vec<Cookie<'static>> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| Cookie::parse(value.to_string()).ok())
        .collect()
}

pub fn set_cookie(response: &Response<Body>, name: &str) -> Option<Cookie<'static>> {
    set_cookies(response)
        .into_iter()
        .find(|cookie| cookie.name() == name)
}

/// The `Location` header, parsed.
pub fn location(response: &Response<Body>) -> url::Url {
    let value = response
        .headers()
        .get(header::LOCATION)
        .expect("location header")
        .to_str()
        .expect("ascii location");
    url::Url::parse(value).expect("absolute location")
}

/// Path and query of `url`, for replaying a redirect.
pub fn path_and_query(url: &url::Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

pub fn query_param(url: &url::Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}
