//! Stateless session tokens for the gatehouse forward-authentication sidecar.
//!
//! This crate provides:
//! - The process-wide [`MasterSecret`] and per-host [`DomainKey`] derivation
//! - [`UrlState`]: a signed return URL plus CSRF nonce, carried across redirects
//! - [`UserState`]: a signed identity and expiry, stored as the session cookie
//! - [`TokenError`]: the two recoverable verification failures
//!
//! # Trust Model
//!
//! URL-State tokens are signed with the domain key of the host that will
//! consume them, so a token minted for one host does not verify on another.
//! User-State tokens are signed with the unscoped master secret so the same
//! session can be carried, unchanged, to every domain served by this process.
//!
//! # Example
//!
//! ```
//! use chrono::{Duration, Utc};
//! use gatehouse_session::{IdentityClaims, MasterSecret, UrlState, UserState};
//! use url::Url;
//!
//! let secret = MasterSecret::generate();
//!
//! // Redirect state for app.example.com
//! let key = secret.domain_key("app.example.com");
//! let state = UrlState::new(Url::parse("https://app.example.com/inbox").unwrap());
//! let token = state.sign(&key);
//! assert_eq!(UrlState::verify(&token, &key).unwrap(), state);
//!
//! // Session for alice
//! let claims = IdentityClaims {
//!     subject_id: "u1".to_string(),
//!     username: "alice".to_string(),
//!     groups: vec!["eng".to_string()],
//!     ..IdentityClaims::default()
//! };
//! let now = Utc::now();
//! let session = UserState::issue(claims, now, Duration::hours(1));
//! let cookie = session.sign(&secret);
//! assert_eq!(UserState::verify(&cookie, &secret, now).unwrap().username(), "alice");
//! ```

pub mod claims;
pub mod envelope;
pub mod error;
pub mod secret;
pub mod url_state;
pub mod user_state;

pub use claims::IdentityClaims;
pub use error::TokenError;
pub use secret::{DomainKey, MasterSecret};
pub use url_state::{UrlState, authority};
pub use user_state::UserState;
