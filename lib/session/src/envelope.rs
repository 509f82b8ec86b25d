//! Versioned, dot-delimited token envelope.
//!
//! Every token is `VERSION.field.field...` where each field is either
//! URL-safe base64 or, for nonces, already drawn from the same alphabet.
//! No field may contain `.`, so a token splits unambiguously.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use subtle::ConstantTimeEq;

use crate::error::TokenError;

/// The only token format version this crate issues or accepts.
pub const VERSION: &str = "1";

/// Joins the version tag and `fields` into a token string.
pub(crate) fn seal(fields: &[&str]) -> String {
    let mut token = String::from(VERSION);
    for field in fields {
        token.push('.');
        token.push_str(field);
    }
    token
}

/// Splits `token` into exactly `N` body fields after the version tag.
pub(crate) fn open<const N: usize>(token: &str) -> Result<[&str; N], TokenError> {
    let mut parts = token.split('.');
    let version = parts.next().unwrap_or_default();

    let mut fields = [""; N];
    let mut count = 0;
    for part in parts {
        if count < N {
            fields[count] = part;
        }
        count += 1;
    }

    if count != N {
        return Err(TokenError::invalid(format!(
            "expected {} parts, got {}",
            N + 1,
            count + 1
        )));
    }
    if version != VERSION {
        return Err(TokenError::invalid(format!(
            "unsupported version {version:?}"
        )));
    }
    Ok(fields)
}

pub(crate) fn encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub(crate) fn decode(field: &str, what: &str) -> Result<Vec<u8>, TokenError> {
    URL_SAFE_NO_PAD
        .decode(field)
        .map_err(|e| TokenError::invalid(format!("failed to decode {what}: {e}")))
}

/// Compares a presented signature with the expected one in constant time.
pub(crate) fn check_signature(expected: &[u8], presented: &[u8]) -> Result<(), TokenError> {
    if bool::from(expected.ct_eq(presented)) {
        Ok(())
    } else {
        Err(TokenError::invalid("signature mismatch"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_prefixes_version() {
        assert_eq!(seal(&["a", "b"]), "1.a.b");
    }

    #[test]
    fn open_returns_body_fields() {
        let fields: [&str; 2] = open("1.a.b").expect("valid");
        assert_eq!(fields, ["a", "b"]);
    }

    #[test]
    fn open_rejects_too_few_fields() {
        let err = open::<3>("1.a.b").unwrap_err();
        assert!(err.to_string().contains("expected 4 parts, got 3"));
    }

    #[test]
    fn open_rejects_extra_delimiters() {
        let err = open::<2>("1.a.b.c").unwrap_err();
        assert!(err.to_string().contains("expected 3 parts, got 4"));
    }

    #[test]
    fn open_rejects_other_versions() {
        let err = open::<2>("2.a.b").unwrap_err();
        assert!(err.to_string().contains("unsupported version"));
    }

    #[test]
    fn open_rejects_empty_token() {
        assert!(open::<2>("").is_err());
    }

    #[test]
    fn decode_rejects_padding_and_standard_alphabet() {
        assert!(decode("YQ==", "field").is_err());
        assert!(decode("a+b/", "field").is_err());
        assert_eq!(decode("YQ", "field").expect("valid"), b"a");
    }

    #[test]
    fn signature_check_is_length_sensitive() {
        assert!(check_signature(b"abc", b"abc").is_ok());
        assert!(check_signature(b"abc", b"abd").is_err());
        assert!(check_signature(b"abc", b"ab").is_err());
    }
}
