use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Minimum length of a configured signing secret, in bytes.
const MIN_SECRET_LEN: usize = 32;

/// Longest accepted cookie lifetime, in seconds.
const MAX_TTL_SECS: u64 = 24 * 60 * 60;

/// Session cookie configuration.
///
/// After a successful callback the raw provider payload and the normalized
/// attribute map are each stored in their own signed cookie. Nothing is kept
/// server-side.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Cookie holding the raw provider payload.
    #[serde(default = "default_payload_cookie")]
    pub payload_cookie: String,

    /// Cookie holding the normalized attribute map.
    #[serde(default = "default_data_cookie")]
    pub data_cookie: String,

    /// Absolute lifetime of both cookies, in seconds.
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,

    /// Secure cookie (HTTPS only).
    #[serde(default = "default_true")]
    pub secure: bool,

    /// SameSite cookie attribute.
    #[serde(default)]
    pub same_site: SameSite,

    /// Secret key for signing session cookies.
    /// If not provided, a random key is generated on startup
    /// (cookies won't survive restarts).
    #[serde(default)]
    pub secret: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            payload_cookie: default_payload_cookie(),
            data_cookie: default_data_cookie(),
            ttl_secs: default_ttl(),
            secure: true,
            same_site: SameSite::default(),
            secret: None,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "session.ttl_secs must be greater than 0".into(),
            ));
        }
        if self.ttl_secs > MAX_TTL_SECS {
            return Err(ConfigError::Validation(format!(
                "session.ttl_secs must be at most {MAX_TTL_SECS}"
            )));
        }
        if self.payload_cookie.is_empty() || self.data_cookie.is_empty() {
            return Err(ConfigError::Validation(
                "session cookie names must not be empty".into(),
            ));
        }
        if self.payload_cookie == self.data_cookie {
            return Err(ConfigError::Validation(
                "session.payload_cookie and session.data_cookie must differ".into(),
            ));
        }
        if let Some(secret) = &self.secret
            && secret.len() < MIN_SECRET_LEN
        {
            return Err(ConfigError::Validation(format!(
                "session.secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("payload_cookie", &self.payload_cookie)
            .field("data_cookie", &self.data_cookie)
            .field("ttl_secs", &self.ttl_secs)
            .field("secure", &self.secure)
            .field("same_site", &self.same_site)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

fn default_payload_cookie() -> String {
    "idmePayload".to_string()
}

fn default_data_cookie() -> String {
    "idmeData".to_string()
}

fn default_ttl() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

/// SameSite cookie attribute.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SameSite {
    #[default]
    Lax,
    Strict,
    None,
}
