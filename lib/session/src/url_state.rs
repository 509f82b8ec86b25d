//! Signed redirect state: where to send the browser back to, and the CSRF
//! nonce that must come back with it.
//!
//! Token format: `1.<base64(return_url)>.<nonce>.<base64(signature)>` where
//! `signature = HMAC-SHA256(domain_key, return_url || nonce)`. The return URL
//! is base64 encoded before joining so dots inside it never reach the
//! envelope parser.

use rand::Rng;
use subtle::ConstantTimeEq;
use url::Url;

use crate::envelope;
use crate::error::TokenError;
use crate::secret::{DomainKey, MasterSecret, hmac_sha256};

/// Random bytes per nonce.
const NONCE_BYTES: usize = 16;

/// Encoded nonce length (16 bytes, unpadded URL-safe base64).
const NONCE_LEN: usize = 22;

/// A return URL bound to a CSRF nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlState {
    return_url: Url,
    nonce: String,
}

impl UrlState {
    /// Creates state for `return_url` with a fresh random nonce.
    ///
    /// The caller must also store [`nonce`](Self::nonce) in a short-lived
    /// host-only cookie so the browser can prove continuity on return.
    #[must_use]
    pub fn new(return_url: Url) -> Self {
        let mut bytes = [0u8; NONCE_BYTES];
        rand::rng().fill(&mut bytes[..]);
        Self {
            return_url,
            nonce: envelope::encode(&bytes),
        }
    }

    /// The URL the browser should land on once authenticated.
    #[must_use]
    pub fn return_url(&self) -> &Url {
        &self.return_url
    }

    /// The CSRF nonce.
    #[must_use]
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// Host (and non-default port) of the return URL.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the return URL has no host.
    pub fn destination(&self) -> Result<String, TokenError> {
        authority(&self.return_url)
            .ok_or_else(|| TokenError::invalid("return URL has no host"))
    }

    /// Constant-time comparison of `presented` against this state's nonce.
    #[must_use]
    pub fn nonce_matches(&self, presented: &str) -> bool {
        self.nonce.as_bytes().ct_eq(presented.as_bytes()).into()
    }

    /// Serializes and signs this state with `key`.
    #[must_use]
    pub fn sign(&self, key: &DomainKey) -> String {
        let signature = signature(key, self.return_url.as_str().as_bytes(), &self.nonce);
        let encoded_url = envelope::encode(self.return_url.as_str().as_bytes());
        let encoded_signature = envelope::encode(&signature);
        envelope::seal(&[
            encoded_url.as_str(),
            self.nonce.as_str(),
            encoded_signature.as_str(),
        ])
    }

    /// Parses `token` and checks its signature against `key`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` on any parse failure, version mismatch, or
    /// signature mismatch.
    pub fn verify(token: &str, key: &DomainKey) -> Result<Self, TokenError> {
        let unverified = Unverified::parse(token)?;
        unverified.check(key)
    }

    /// Verifies `token` against the domain key of its own return URL's host.
    ///
    /// Used by the authentication domain, which issues redirects on behalf of
    /// every protected host and can therefore derive any host's key. The
    /// signature still covers the return URL, so the host cannot be swapped
    /// without invalidating it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` on any parse failure, a missing host, or a
    /// signature mismatch.
    pub fn verify_for_destination(token: &str, secret: &MasterSecret) -> Result<Self, TokenError> {
        let unverified = Unverified::parse(token)?;
        let host = authority(&unverified.return_url)
            .ok_or_else(|| TokenError::invalid("return URL has no host"))?;
        unverified.check(&secret.domain_key(&host))
    }
}

/// Parsed fields whose signature has not been checked yet.
struct Unverified {
    raw_url: Vec<u8>,
    return_url: Url,
    nonce: String,
    signature: Vec<u8>,
}

impl Unverified {
    fn parse(token: &str) -> Result<Self, TokenError> {
        let [encoded_url, nonce, encoded_signature] = envelope::open::<3>(token)?;

        if nonce.len() != NONCE_LEN
            || !nonce
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(TokenError::invalid("malformed nonce"));
        }

        let raw_url = envelope::decode(encoded_url, "return URL")?;
        let url_str = std::str::from_utf8(&raw_url)
            .map_err(|e| TokenError::invalid(format!("return URL is not UTF-8: {e}")))?;
        let return_url = Url::parse(url_str)
            .map_err(|e| TokenError::invalid(format!("failed to parse return URL: {e}")))?;
        let signature = envelope::decode(encoded_signature, "signature")?;

        Ok(Self {
            raw_url,
            return_url,
            nonce: nonce.to_string(),
            signature,
        })
    }

    fn check(self, key: &DomainKey) -> Result<UrlState, TokenError> {
        let expected = signature(key, &self.raw_url, &self.nonce);
        envelope::check_signature(&expected, &self.signature)?;
        Ok(UrlState {
            return_url: self.return_url,
            nonce: self.nonce,
        })
    }
}

fn signature(key: &DomainKey, url: &[u8], nonce: &str) -> [u8; 32] {
    hmac_sha256(key.as_bytes(), &[url, nonce.as_bytes()])
}

/// Returns `host[:port]` for `url`, omitting the scheme's default port.
#[must_use]
pub fn authority(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}
