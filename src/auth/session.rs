//! Short-lived, client-held session artifact.
//!
//! After a successful callback the raw provider payload and the attribute map
//! are stored in two cookies. Each value is sealed as
//! `base64url(json{"v", "exp"}) "." base64url(hmac_sha256)` and is only
//! accepted back while `exp` lies in the future. Nothing is stored
//! server-side.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use sha2::Sha256;
use tower_cookies::{
    Cookie, Cookies,
    cookie::{SameSite as CookieSameSite, time::Duration as CookieDuration},
};

use super::{AttributeMap, UserData};
use crate::config::{SameSite, SessionConfig};

type HmacSha256 = Hmac<Sha256>;

/// Browsers commonly drop cookies above this size.
const MAX_COOKIE_BYTES: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("malformed session value")]
    Malformed,

    #[error("invalid session signing key")]
    InvalidKey,

    #[error("session signature mismatch")]
    BadSignature,

    #[error("session value expired")]
    Expired,

    #[error("failed to serialize session value: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Verified user data held for the profile view.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionArtifact {
    pub raw_payload: Value,
    pub attributes: AttributeMap,
    pub expires_at: DateTime<Utc>,
}

impl SessionArtifact {
    pub fn new(user: UserData, now: DateTime<Utc>, ttl_secs: u64) -> Self {
        let expires_at = i64::try_from(ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            raw_payload: user.raw_payload,
            attributes: user.attributes,
            expires_at,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    v: T,
    exp: i64,
}

/// Seals and opens cookie values with HMAC-SHA256 and an absolute expiry.
#[derive(Clone)]
pub struct SessionCodec {
    mac: HmacSha256,
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec").field("key", &"[REDACTED]").finish()
    }
}

impl SessionCodec {
    pub fn new(key: &[u8]) -> Result<Self, SessionError> {
        let mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::InvalidKey)?;
        Ok(Self { mac })
    }

    /// Use the configured secret, or a random per-process key.
    pub fn from_config(config: &SessionConfig) -> Result<Self, SessionError> {
        match &config.secret {
            Some(secret) => Self::new(secret.as_bytes()),
            None => {
                tracing::warn!(
                    "No session.secret configured; using a random key. \
                     Session cookies will not survive a restart."
                );
                let mut key = [0u8; 32];
                rand::thread_rng().fill_bytes(&mut key);
                Self::new(&key)
            }
        }
    }

    /// Seal `value` so that it opens until `expires_at`.
    pub fn seal<T: Serialize>(
        &self,
        value: &T,
        expires_at: DateTime<Utc>,
    ) -> Result<String, SessionError> {
        let envelope = Envelope {
            v: value,
            exp: expires_at.timestamp(),
        };
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&envelope)?);

        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{payload}.{signature}"))
    }

    /// Verify the signature, then the expiry against `now`.
    pub fn open<T: DeserializeOwned>(
        &self,
        sealed: &str,
        now: DateTime<Utc>,
    ) -> Result<T, SessionError> {
        self.open_envelope(sealed, now).map(|envelope| envelope.v)
    }

    fn open_envelope<T: DeserializeOwned>(
        &self,
        sealed: &str,
        now: DateTime<Utc>,
    ) -> Result<Envelope<T>, SessionError> {
        let (payload, signature) = sealed.split_once('.').ok_or(SessionError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SessionError::Malformed)?;

        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| SessionError::BadSignature)?;

        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| SessionError::Malformed)?;
        let envelope: Envelope<T> =
            serde_json::from_slice(&bytes).map_err(|_| SessionError::Malformed)?;

        if now.timestamp() >= envelope.exp {
            return Err(SessionError::Expired);
        }
        Ok(envelope)
    }
}

/// Write both session cookies, replacing any previous session.
pub fn store_session(
    cookies: &Cookies,
    config: &SessionConfig,
    codec: &SessionCodec,
    artifact: &SessionArtifact,
) -> Result<(), SessionError> {
    let payload = codec.seal(&artifact.raw_payload, artifact.expires_at)?;
    let data = codec.seal(&artifact.attributes, artifact.expires_at)?;

    cookies.add(session_cookie(config, config.payload_cookie.clone(), payload));
    cookies.add(session_cookie(config, config.data_cookie.clone(), data));
    Ok(())
}

/// Read the session back, or `None` when the attribute cookie is missing,
/// expired, or fails verification.
///
/// An unreadable payload cookie alone does not invalidate the session; the
/// payload degrades to `null`.
pub fn load_session(
    cookies: &Cookies,
    config: &SessionConfig,
    codec: &SessionCodec,
    now: DateTime<Utc>,
) -> Option<SessionArtifact> {
    let data = cookies.get(&config.data_cookie)?;
    let envelope: Envelope<AttributeMap> = match codec.open_envelope(data.value(), now) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!(error = %e, cookie = %config.data_cookie, "Discarding session cookie");
            return None;
        }
    };

    let raw_payload = cookies
        .get(&config.payload_cookie)
        .and_then(|c| codec.open::<Value>(c.value(), now).ok())
        .unwrap_or(Value::Null);

    Some(SessionArtifact {
        raw_payload,
        attributes: envelope.v,
        expires_at: DateTime::from_timestamp(envelope.exp, 0)?,
    })
}

fn session_cookie(config: &SessionConfig, name: String, value: String) -> Cookie<'static> {
    if name.len() + value.len() > MAX_COOKIE_BYTES {
        tracing::warn!(
            cookie = %name,
            bytes = name.len() + value.len(),
            "Session cookie exceeds {MAX_COOKIE_BYTES} bytes and may be dropped by the browser"
        );
    }

    let same_site = match config.same_site {
        SameSite::Strict => CookieSameSite::Strict,
        SameSite::Lax => CookieSameSite::Lax,
        SameSite::None => CookieSameSite::None,
    };

    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(config.secure)
        .same_site(same_site)
        .max_age(CookieDuration::seconds(
            i64::try_from(config.ttl_secs).unwrap_or(i64::MAX),
        ))
        .build()
}
