//! Signed session state carried in the session cookie.
//!
//! Token format: `1.<base64(json)>.<base64(HMAC-SHA256(master_secret, json))>`.
//!
//! The signature uses the unscoped master secret rather than a domain key, so
//! a session minted on the authentication domain verifies unchanged on every
//! protected domain it is delegated to.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::claims::IdentityClaims;
use crate::envelope;
use crate::error::TokenError;
use crate::secret::{MasterSecret, hmac_sha256};

/// An authenticated identity with a fixed expiry.
///
/// Immutable once issued; the expiry is part of the signed payload, so a
/// holder cannot extend it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserState {
    #[serde(rename = "preferred_username")]
    username: String,
    groups: Vec<String>,
    entitlements: Vec<String>,
    email: String,
    #[serde(rename = "name")]
    display_name: String,
    #[serde(rename = "sub")]
    subject_id: String,
    #[serde(rename = "exp")]
    expiration: DateTime<Utc>,
}

impl UserState {
    /// Creates session state for `claims` that expires `duration` after `now`.
    #[must_use]
    pub fn issue(claims: IdentityClaims, now: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            username: claims.username,
            groups: claims.groups,
            entitlements: claims.entitlements,
            email: claims.email,
            display_name: claims.display_name,
            subject_id: claims.subject_id,
            expiration: now + duration,
        }
    }

    /// Returns the preferred username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the group memberships, in provider order.
    #[must_use]
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Returns the entitlements.
    #[must_use]
    pub fn entitlements(&self) -> &[String] {
        &self.entitlements
    }

    /// Returns the email address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the provider's subject identifier.
    #[must_use]
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Returns when this session stops verifying.
    #[must_use]
    pub fn expiration(&self) -> DateTime<Utc> {
        self.expiration
    }

    /// Returns true if every entry of `required`, trimmed, is one of this
    /// user's groups. Exact match, order-insensitive, no wildcards.
    #[must_use]
    pub fn has_groups<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required
            .iter()
            .map(|group| group.as_ref().trim())
            .all(|group| self.groups.iter().any(|own| own == group))
    }

    /// Projects the identity into `prefix`-named headers for the upstream.
    #[must_use]
    pub fn to_headers(&self, prefix: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            (format!("{prefix}username"), self.username.clone()),
            (format!("{prefix}groups"), self.groups.join(",")),
            (format!("{prefix}entitlements"), self.entitlements.join(",")),
            (format!("{prefix}email"), self.email.clone()),
            (format!("{prefix}name"), self.display_name.clone()),
            (format!("{prefix}uid"), self.subject_id.clone()),
        ])
    }

    /// Serializes and signs this state with the master secret.
    #[must_use]
    pub fn sign(&self, secret: &MasterSecret) -> String {
        let payload = serde_json::to_vec(self).expect("serialize user state");
        let signature = hmac_sha256(secret.as_bytes(), &[payload.as_slice()]);
        let encoded_payload = envelope::encode(&payload);
        let encoded_signature = envelope::encode(&signature);
        envelope::seal(&[encoded_payload.as_str(), encoded_signature.as_str()])
    }

    /// Parses `token`, checks its signature, and checks it has not expired
    /// as of `now`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` for malformed or tampered tokens, and
    /// `Expired` for correctly signed tokens with `now >= expiration`.
    pub fn verify(
        token: &str,
        secret: &MasterSecret,
        now: DateTime<Utc>,
    ) -> Result<Self, TokenError> {
        let [encoded_payload, encoded_signature] = envelope::open::<2>(token)?;

        let payload = envelope::decode(encoded_payload, "state")?;
        let presented = envelope::decode(encoded_signature, "signature")?;
        let expected = hmac_sha256(secret.as_bytes(), &[payload.as_slice()]);
        envelope::check_signature(&expected, &presented)?;

        let state: Self = serde_json::from_slice(&payload)
            .map_err(|e| TokenError::invalid(format!("failed to unmarshal state: {e}")))?;

        if now >= state.expiration {
            return Err(TokenError::Expired {
                expired_at: state.expiration,
            });
        }
        Ok(state)
    }
}
