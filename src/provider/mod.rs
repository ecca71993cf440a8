//! Identity provider access.
//!
//! [`EnvironmentRegistry`] holds the immutable per-environment credentials and
//! [`ProviderClient`] performs the outbound calls (policy listing, token
//! exchange, user data).

mod client;
mod environment;

pub use client::*;
pub use environment::*;

/// Errors from calls to the identity provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    #[error("{endpoint} returned a malformed body: {message}")]
    MalformedBody {
        endpoint: &'static str,
        message: String,
    },

    #[error("token response did not contain an access token")]
    MissingAccessToken,

    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
}
