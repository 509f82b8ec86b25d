//! Forward-auth access verification for protected domains.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use chrono::{DateTime, Utc};
use gatehouse_session::{MasterSecret, UserState};
use tracing::debug;

use crate::error::FlowError;

/// Result of inspecting a protected request's session cookie.
#[derive(Debug)]
pub enum AccessDecision {
    /// The session is valid.
    Allow(UserState),
    /// No usable session; re-authenticate silently.
    Reauthenticate,
}

/// Verifies the session cookie. Absent, malformed and expired sessions all
/// lead to re-authentication rather than an error.
pub fn check_session(
    secret: &MasterSecret,
    session_cookie: Option<&str>,
    now: DateTime<Utc>,
) -> AccessDecision {
    let Some(token) = session_cookie else {
        return AccessDecision::Reauthenticate;
    };
    match UserState::verify(token, secret, now) {
        Ok(user) => AccessDecision::Allow(user),
        Err(e) => {
            debug!(error = %e, "session cookie rejected");
            AccessDecision::Reauthenticate
        }
    }
}

/// Enforces a comma-separated group requirement, if one was sent.
pub fn enforce_groups(user: &UserState, expected: Option<&str>) -> Result<(), FlowError> {
    let Some(expected) = expected.map(str::trim).filter(|e| !e.is_empty()) else {
        return Ok(());
    };
    let required: Vec<&str> = expected
        .split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .collect();

    if user.has_groups(required.as_slice()) {
        Ok(())
    } else {
        Err(FlowError::MissingGroups {
            username: user.username().to_string(),
            required: required.into_iter().map(str::to_string).collect(),
        })
    }
}

/// Identity headers for the proxy to forward upstream.
pub fn identity_headers(user: &UserState, prefix: &str) -> Result<HeaderMap, FlowError> {
    let mut headers = HeaderMap::new();
    for (name, value) in user.to_headers(prefix) {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| FlowError::Internal {
            details: format!("invalid header name {:?}: {}", name, e),
        })?;
        let value = HeaderValue::from_bytes(value.as_bytes()).map_err(|e| FlowError::Internal {
            details: format!("invalid value for {}: {}", name, e),
        })?;
        headers.insert(name, value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use gatehouse_session::IdentityClaims;

    fn user(groups: &[&str]) -> UserState {
        let claims = IdentityClaims {
            subject_id: "u1".to_string(),
            username: "alice".to_string(),
            groups: groups.iter().map(|g| g.to_string()).collect(),
            entitlements: vec!["read".to_string(), "write".to_string()],
            email: "alice@example.com".to_string(),
            display_name: "Alice".to_string(),
        };
        UserState::issue(claims, Utc::now(), Duration::minutes(60))
    }

    #[test]
    fn missing_cookie_reauthenticates() {
        let secret = MasterSecret::generate();
        assert!(matches!(
            check_session(&secret, None, Utc::now()),
            AccessDecision::Reauthenticate
        ));
    }

    #[test]
    fn garbage_and_expired_cookies_reauthenticate() {
        let secret = MasterSecret::generate();
        assert!(matches!(
            check_session(&secret, Some("1.garbage.cookie"), Utc::now()),
            AccessDecision::Reauthenticate
        ));

        let token = user(&["eng"]).sign(&secret);
        let later = Utc::now() + Duration::hours(2);
        assert!(matches!(
            check_session(&secret, Some(&token), later),
            AccessDecision::Reauthenticate
        ));
    }

    #[test]
    fn valid_cookie_allows() {
        let secret = MasterSecret::generate();
        let token = user(&["eng"]).sign(&secret);
        match check_session(&secret, Some(&token), Utc::now()) {
            AccessDecision::Allow(user) => assert_eq!(user.username(), "alice"),
            AccessDecision::Reauthenticate => panic!("expected Allow"),
        }
    }

    #[test]
    fn groups_are_enforced() {
        let alice = user(&["eng", "ops"]);
        assert!(enforce_groups(&alice, None).is_ok());
        assert!(enforce_groups(&alice, Some("")).is_ok());
        assert!(enforce_groups(&alice, Some("eng")).is_ok());
        assert!(enforce_groups(&alice, Some("ops, eng")).is_ok());

        let err = enforce_groups(&alice, Some("eng,admins")).unwrap_err();
        match err {
            FlowError::MissingGroups { username, required } => {
                assert_eq!(username, "alice");
                assert_eq!(required, vec!["eng", "admins"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn headers_carry_identity() {
        let headers = identity_headers(&user(&["eng", "ops"]), "X-authentik-").expect("headers");
        assert_eq!(headers["x-authentik-username"], "alice");
        assert_eq!(headers["x-authentik-uid"], "u1");
        assert_eq!(headers["x-authentik-groups"], "eng,ops");
        assert_eq!(headers["x-authentik-entitlements"], "read,write");
        assert_eq!(headers["x-authentik-email"], "alice@example.com");
        assert_eq!(headers["x-authentik-name"], "Alice");
    }
}
