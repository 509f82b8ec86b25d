//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables such as
//! `ACCESS_BASE_URL` and `AUTHENTIK_CLIENT_ID`.

use serde::Deserialize;
use std::fmt;
use url::Url;

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the authentication domain (e.g. "https://access.example.com").
    pub access_base_url: Url,

    /// Identity provider URL used for browser redirects.
    pub authentik_base_url: Url,

    /// Identity provider URL used for server-to-server calls, when it differs
    /// from the browser-facing one.
    #[serde(default)]
    pub authentik_backchannel_url: Option<Url>,

    /// OAuth2 client ID. A value starting with `/` names a file to read.
    pub authentik_client_id: String,

    /// OAuth2 client secret. A value starting with `/` names a file to read.
    pub authentik_client_secret: String,

    /// Prefix for identity headers sent upstream.
    #[serde(default = "default_header_prefix")]
    pub header_prefix: String,

    /// Path on protected domains that completes a session delegation.
    #[serde(default = "default_delegation_path")]
    pub delegation_path: String,

    /// Session duration in minutes.
    #[serde(default = "default_session_duration_minutes")]
    pub session_duration_minutes: i64,

    /// Session cookie name.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// CSRF cookie name.
    #[serde(default = "default_csrf_cookie_name")]
    pub csrf_cookie_name: String,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true for production safety; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,

    /// Timeout for each call to the identity provider, in seconds.
    #[serde(default = "default_provider_timeout_seconds")]
    pub provider_timeout_seconds: u64,

    /// Address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_header_prefix() -> String {
    "X-authentik-".to_string()
}

fn default_delegation_path() -> String {
    "/.well-known/gatehouse/".to_string()
}

fn default_session_duration_minutes() -> i64 {
    60
}

fn default_cookie_name() -> String {
    "A7K_SESSION".to_string()
}

fn default_csrf_cookie_name() -> String {
    "A7K_CSRF_TOKEN".to_string()
}

fn default_secure_cookies() -> bool {
    true
}

fn default_provider_timeout_seconds() -> u64 {
    10
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config: Self = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(ConfigError::Load)?;

        config.authentik_client_id = read_file_reference(config.authentik_client_id);
        config.authentik_client_secret = read_file_reference(config.authentik_client_secret);
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants the flows rely on.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_base_url.host_str().is_none() {
            return Err(ConfigError::Invalid {
                key: "ACCESS_BASE_URL",
                reason: "must include a host".to_string(),
            });
        }
        if !self.delegation_path.starts_with('/') || !self.delegation_path.ends_with('/') {
            return Err(ConfigError::Invalid {
                key: "DELEGATION_PATH",
                reason: format!("{:?} must start and end with '/'", self.delegation_path),
            });
        }
        if self.session_duration_minutes <= 0 {
            return Err(ConfigError::Invalid {
                key: "SESSION_DURATION_MINUTES",
                reason: "must be positive".to_string(),
            });
        }
        if self.authentik_client_id.is_empty() {
            return Err(ConfigError::Invalid {
                key: "AUTHENTIK_CLIENT_ID",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Host (and non-default port) of the authentication domain.
    #[must_use]
    pub fn access_host(&self) -> String {
        gatehouse_session::authority(&self.access_base_url).unwrap_or_default()
    }

    /// Identity provider URL for server-to-server calls.
    #[must_use]
    pub fn backchannel_url(&self) -> &Url {
        self.authentik_backchannel_url
            .as_ref()
            .unwrap_or(&self.authentik_base_url)
    }

    /// Where the identity provider sends the browser back to.
    #[must_use]
    pub fn authorize_redirect_url(&self) -> Url {
        let mut url = self.access_base_url.clone();
        url.set_path("/authorize");
        url.set_query(None);
        url.set_fragment(None);
        url
    }

    /// Session lifetime.
    #[must_use]
    pub fn session_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_duration_minutes)
    }

    /// Name of the header carrying a comma-separated group requirement.
    #[must_use]
    pub fn expected_groups_header(&self) -> String {
        format!("{}Expected-Groups", self.header_prefix)
    }
}

/// Replaces `value` with the trimmed contents of the file it names, if it
/// starts with `/` and the file can be read.
///
/// Applied to the client id and secret only: those are the values deployed as
/// mounted secret files, and the remaining settings (paths, URLs) may
/// legitimately start with `/`.
fn read_file_reference(value: String) -> String {
    if !value.starts_with('/') {
        return value;
    }
    match std::fs::read_to_string(&value) {
        Ok(contents) => contents.trim().to_string(),
        Err(_) => value,
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Environment could not be read or deserialized.
    Load(config::ConfigError),
    /// A value was present but unusable.
    Invalid { key: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load(e) => write!(f, "failed to load configuration: {}", e),
            Self::Invalid { key, reason } => write!(f, "invalid {}: {}", key, reason),
        }
    }
}

impl std::error::Error for ConfigError {}
