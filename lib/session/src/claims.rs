//! Identity claims returned by the identity provider's userinfo endpoint.

use serde::{Deserialize, Deserializer, Serialize};

/// Identity claims for an authenticated user.
///
/// Absent claims decode as empty values; the provider decides which scopes
/// it honours.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Stable subject identifier (`sub`).
    #[serde(rename = "sub", default)]
    pub subject_id: String,
    #[serde(rename = "preferred_username", default)]
    pub username: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub entitlements: Vec<String>,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "name", default)]
    pub display_name: String,
}

/// Accepts either `"a"` or `["a", "b"]`.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(value)) if value.is_empty() => Vec::new(),
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_minimal_userinfo() {
        let claims: IdentityClaims = serde_json::from_str(
            r#"{"sub":"u1","preferred_username":"alice","groups":["eng"]}"#,
        )
        .expect("deserialize");

        assert_eq!(claims.subject_id, "u1");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.groups, vec!["eng"]);
        assert!(claims.entitlements.is_empty());
        assert_eq!(claims.email, "");
        assert_eq!(claims.display_name, "");
    }

    #[test]
    fn decodes_full_userinfo_and_ignores_extra_claims() {
        let claims: IdentityClaims = serde_json::from_str(
            r#"{
                "sub": "u2",
                "preferred_username": "bob",
                "name": "Bob Example",
                "email": "bob@example.com",
                "email_verified": true,
                "groups": ["ops", "eng"],
                "entitlements": ["billing", "deploy"]
            }"#,
        )
        .expect("deserialize");

        assert_eq!(claims.display_name, "Bob Example");
        assert_eq!(claims.email, "bob@example.com");
        assert_eq!(claims.entitlements, vec!["billing", "deploy"]);
    }

    #[test]
    fn entitlements_accepts_single_string() {
        let claims: IdentityClaims =
            serde_json::from_str(r#"{"sub":"u1","entitlements":"billing"}"#).expect("deserialize");
        assert_eq!(claims.entitlements, vec!["billing"]);
    }

    #[test]
    fn entitlements_accepts_null_and_empty_string() {
        let null: IdentityClaims =
            serde_json::from_str(r#"{"sub":"u1","entitlements":null}"#).expect("deserialize");
        let empty: IdentityClaims =
            serde_json::from_str(r#"{"sub":"u1","entitlements":""}"#).expect("deserialize");
        assert!(null.entitlements.is_empty());
        assert!(empty.entitlements.is_empty());
    }
}
