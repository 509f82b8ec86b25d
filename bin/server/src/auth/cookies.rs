//! Session and CSRF cookie construction.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration as TimeDuration;

use crate::config::ServerConfig;

/// Lifetime of a CSRF cookie: one redirect round trip.
pub const CSRF_MAX_AGE: TimeDuration = TimeDuration::seconds(300);

/// Which side of a delegation a cookie is set on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// The authentication domain; cookies are strictly same-site.
    Authentication,
    /// A delegated domain; cookies keep the browser's default same-site policy.
    Protected,
}

fn base(config: &ServerConfig, name: &str, value: String, domain: Domain) -> Cookie<'static> {
    let mut cookie = Cookie::build((name.to_string(), value))
        .path("/")
        .http_only(true)
        .secure(config.secure_cookies)
        .build();
    if domain == Domain::Authentication {
        cookie.set_same_site(SameSite::Strict);
    }
    cookie
}

/// Session cookie holding a signed user state. Lives for the browser session;
/// the token carries its own expiry.
pub fn session(config: &ServerConfig, token: String, domain: Domain) -> Cookie<'static> {
    base(config, &config.cookie_name, token, domain)
}

/// Short-lived CSRF cookie.
pub fn csrf(config: &ServerConfig, value: String, domain: Domain) -> Cookie<'static> {
    let mut cookie = base(config, &config.csrf_cookie_name, value, domain);
    cookie.set_max_age(CSRF_MAX_AGE);
    cookie
}

/// Expires the CSRF cookie immediately.
pub fn clear_csrf(config: &ServerConfig) -> Cookie<'static> {
    Cookie::build((config.csrf_cookie_name.clone(), String::new()))
        .path("/")
        .http_only(true)
        .max_age(TimeDuration::ZERO)
        .build()
}
