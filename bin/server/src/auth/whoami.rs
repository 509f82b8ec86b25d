//! Identity introspection.

use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use gatehouse_session::{MasterSecret, UserState};

const NOBODY: &str = "nobody";

/// The current session as indented JSON, or `nobody` without a valid one.
pub fn whoami(secret: &MasterSecret, session_cookie: Option<&str>, now: DateTime<Utc>) -> Response {
    let user = session_cookie.and_then(|token| UserState::verify(token, secret, now).ok());
    let Some(user) = user else {
        return NOBODY.into_response();
    };

    match serde_json::to_string_pretty(&user) {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to serialize session");
            NOBODY.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use gatehouse_session::IdentityClaims;

    async fn body(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    #[tokio::test]
    async fn nobody_without_session() {
        let secret = MasterSecret::generate();
        assert_eq!(body(whoami(&secret, None, Utc::now())).await, "nobody");
        assert_eq!(
            body(whoami(&secret, Some("1.bad.token"), Utc::now())).await,
            "nobody"
        );
    }

    #[tokio::test]
    async fn pretty_json_with_session() {
        let secret = MasterSecret::generate();
        let claims = IdentityClaims {
            subject_id: "u1".to_string(),
            username: "alice".to_string(),
            groups: vec!["eng".to_string()],
            entitlements: vec!["read".to_string()],
            email: "alice@example.com".to_string(),
            display_name: "Alice".to_string(),
        };
        let token = UserState::issue(claims, Utc::now(), Duration::minutes(5)).sign(&secret);

        let response = whoami(&secret, Some(&token), Utc::now());
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let text = body(response).await;
        assert!(text.contains('\n'));

        let json: serde_json::Value = serde_json::from_str(&text).expect("json");
        assert_eq!(json["preferred_username"], "alice");
        assert_eq!(json["sub"], "u1");
        assert_eq!(json["groups"], serde_json::json!(["eng"]));
        assert_eq!(json["entitlements"], serde_json::json!(["read"]));
        assert_eq!(json["email"], "alice@example.com");
        assert_eq!(json["name"], "Alice");
    }
}
