//! Configuration module for the relying party.
//!
//! The service is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax. When no file is given,
//! [`AppConfig::from_env`] builds the configuration from process environment
//! variables instead.
//!
//! # Example
//!
//! ```toml
//! [server]
//! port = 5001
//!
//! [environments.prod]
//! client_id = "${PRODUCTION_CLIENT_ID}"
//! client_secret = "${PRODUCTION_CLIENT_SECRET}"
//!
//! [environments.sandbox]
//! client_id = "${SANDBOX_CLIENT_ID}"
//! client_secret = "${SANDBOX_CLIENT_SECRET}"
//! ```

mod environments;
mod observability;
mod server;
mod session;

use std::path::Path;

pub use environments::*;
pub use observability::*;
use serde::{Deserialize, Serialize};
pub use server::*;
pub use session::*;

/// Root configuration.
///
/// Every section except `environments` has defaults, so a minimal file only
/// needs the two credential pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Identity provider endpoints shared by both environments.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Credentials and domains for the `prod` and `sandbox` environments.
    pub environments: EnvironmentsConfig,

    /// Short-lived session cookie configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing variables cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: AppConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Build the configuration from process environment variables.
    ///
    /// Reads `PRODUCTION_CLIENT_ID`, `PRODUCTION_CLIENT_SECRET`,
    /// `SANDBOX_CLIENT_ID` and `SANDBOX_CLIENT_SECRET` (all required), plus the
    /// optional `PORT`, `HOST` and `SESSION_SECRET`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut server = ServerConfig::default();
        if let Some(port) = optional_env("PORT") {
            server.port = port
                .parse()
                .map_err(|_| ConfigError::Validation(format!("PORT is not a valid port: {port}")))?;
        }
        if let Some(host) = optional_env("HOST") {
            server.host = host
                .parse()
                .map_err(|_| ConfigError::Validation(format!("HOST is not an IP address: {host}")))?;
        }

        let session = SessionConfig {
            secret: optional_env("SESSION_SECRET"),
            ..SessionConfig::default()
        };

        let environments = EnvironmentsConfig {
            prod: EnvironmentSettings {
                domain: default_prod_domain(),
                client_id: required_env("PRODUCTION_CLIENT_ID")?,
                client_secret: required_env("PRODUCTION_CLIENT_SECRET")?,
            },
            sandbox: EnvironmentSettings {
                domain: default_sandbox_domain(),
                client_id: required_env("SANDBOX_CLIENT_ID")?,
                client_secret: required_env("SANDBOX_CLIENT_SECRET")?,
            },
        };

        let config = Self {
            server,
            provider: ProviderConfig::default(),
            environments,
            session,
            observability: ObservabilityConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.provider.validate()?;
        self.environments.validate()?;
        self.session.validate()?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    optional_env(name).ok_or_else(|| ConfigError::EnvVarNotFound(name.to_string()))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Skips commented lines (lines where content before the variable is a comment).
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| ConfigError::Validation(format!("invalid interpolation pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            // Skip if this variable is inside a comment
            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    // Remove trailing newline if input didn't have one
    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

/// Commented default configuration written by `idme-rp init`.
pub fn default_config_toml() -> &'static str {
    r#"# ID.me relying-party configuration

[server]
host = "0.0.0.0"
port = 5001
# Scheme used when building the callback redirect_uri registered with ID.me.
external_scheme = "https"
# static_dir = "public"

[server.http_client]
timeout_secs = 5
connect_timeout_secs = 2

[provider]
groups_endpoint = "https://groups.id.me"
saml_entity_id = "demo.idme.solutions"

[environments.prod]
domain = "https://api.id.me"
client_id = "${PRODUCTION_CLIENT_ID}"
client_secret = "${PRODUCTION_CLIENT_SECRET}"

[environments.sandbox]
domain = "https://api.idmelabs.com"
client_id = "${SANDBOX_CLIENT_ID}"
client_secret = "${SANDBOX_CLIENT_SECRET}"

[session]
ttl_secs = 60
# secret = "${SESSION_SECRET}"

[observability.logging]
level = "info"
format = "compact"
"#
}
