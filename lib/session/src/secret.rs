//! Master secret and per-domain key derivation.

use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use std::fmt;

pub(crate) type HmacSha256 = Hmac<Sha256>;

/// Length in bytes of the master secret and of every derived key.
pub const KEY_LEN: usize = 32;

/// Process-wide signing secret.
///
/// Generated once at startup and held only in memory. Tokens issued by one
/// process do not verify after a restart.
#[derive(Clone)]
pub struct MasterSecret([u8; KEY_LEN]);

impl MasterSecret {
    /// Generates a fresh secret from the thread-local CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::rng().fill(&mut bytes[..]);
        Self(bytes)
    }

    /// Wraps existing key material.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Derives the signing key for `domain`: HMAC-SHA256(master, domain).
    ///
    /// Deterministic for the lifetime of the secret; distinct domains get
    /// independent keys.
    #[must_use]
    pub fn domain_key(&self, domain: &str) -> DomainKey {
        DomainKey(hmac_sha256(&self.0, &[domain.as_bytes()]))
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterSecret(..)")
    }
}

/// Signing key scoped to a single host.
#[derive(Clone, PartialEq, Eq)]
pub struct DomainKey([u8; KEY_LEN]);

impl DomainKey {
    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for DomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DomainKey(..)")
    }
}

/// HMAC-SHA256 over the concatenation of `parts`.
pub(crate) fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> [u8; KEY_LEN] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_key_is_deterministic() {
        let secret = MasterSecret::from_bytes([7; KEY_LEN]);
        assert_eq!(
            secret.domain_key("app.example.com"),
            secret.domain_key("app.example.com")
        );
    }

    #[test]
    fn domain_keys_differ_per_domain() {
        let secret = MasterSecret::from_bytes([7; KEY_LEN]);
        assert_ne!(
            secret.domain_key("a.example"),
            secret.domain_key("b.example")
        );
    }

    #[test]
    fn domain_keys_differ_per_secret() {
        let first = MasterSecret::from_bytes([1; KEY_LEN]);
        let second = MasterSecret::from_bytes([2; KEY_LEN]);
        assert_ne!(
            first.domain_key("a.example"),
            second.domain_key("a.example")
        );
    }

    #[test]
    fn domain_key_matches_hmac_of_domain() {
        let secret = MasterSecret::from_bytes([9; KEY_LEN]);
        let expected = hmac_sha256(&[9; KEY_LEN], &[b"a.example".as_slice()]);
        assert_eq!(secret.domain_key("a.example").as_bytes(), &expected);
    }

    #[test]
    fn generated_secrets_are_distinct() {
        let first = MasterSecret::generate();
        let second = MasterSecret::generate();
        assert_ne!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn debug_does_not_leak_key_material() {
        let secret = MasterSecret::from_bytes([0xAB; KEY_LEN]);
        assert_eq!(format!("{secret:?}"), "MasterSecret(..)");
        assert_eq!(format!("{:?}", secret.domain_key("x")), "DomainKey(..)");
    }
}
