use std::{net::IpAddr, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Scheme used when building the callback `redirect_uri` from the request's
    /// `Host` header. ID.me only accepts registered HTTPS callbacks, so this is
    /// `https` unless a local mock provider is in use.
    #[serde(default = "default_external_scheme")]
    pub external_scheme: String,

    /// Request body size limit in bytes. SAML responses are posted as form
    /// bodies, so this bounds the accepted assertion size.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// Directory of static assets served under `/` (stylesheets, images).
    #[serde(default)]
    pub static_dir: Option<PathBuf>,

    /// HTTP client configuration for outbound requests to the identity provider.
    #[serde(default)]
    pub http_client: HttpClientConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            external_scheme: default_external_scheme(),
            body_limit_bytes: default_body_limit(),
            static_dir: None,
            http_client: HttpClientConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.external_scheme.as_str(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "server.external_scheme must be 'http' or 'https', got '{}'",
                self.external_scheme
            )));
        }
        if self.http_client.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "server.http_client.timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    5001
}

fn default_external_scheme() -> String {
    "https".to_string()
}

fn default_body_limit() -> usize {
    1024 * 1024 // 1 MB
}

/// HTTP client configuration.
///
/// A single client is shared by every request; provider calls are the only
/// suspension points of a request, so the timeout bounds request latency.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpClientConfig {
    /// Total time allowed for one provider request, including the response body.
    #[serde(default = "default_http_client_timeout")]
    pub timeout_secs: u64,

    /// Time allowed to establish a connection to the provider.
    #[serde(default = "default_http_client_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// User-Agent header to send with requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_client_timeout(),
            connect_timeout_secs: default_http_client_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpClientConfig {
    /// Build a `reqwest::Client` with these settings.
    pub fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .user_agent(&self.user_agent)
            .build()
    }
}

fn default_http_client_timeout() -> u64 {
    5
}

fn default_http_client_connect_timeout() -> u64 {
    2
}

fn default_user_agent() -> String {
    concat!("idme-rp/", env!("CARGO_PKG_VERSION")).to_string()
}
