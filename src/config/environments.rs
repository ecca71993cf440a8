use serde::{Deserialize, Serialize};
use url::Url;

use super::ConfigError;

/// Credentials for the two provider environments.
///
/// The key set is closed: any environment other than `prod` and `sandbox` is
/// rejected while parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "EnvironmentsFile")]
pub struct EnvironmentsConfig {
    pub prod: EnvironmentSettings,
    pub sandbox: EnvironmentSettings,
}

/// On-disk shape of `[environments]`, where `domain` may be omitted.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EnvironmentsFile {
    prod: EnvironmentEntry,
    sandbox: EnvironmentEntry,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EnvironmentEntry {
    #[serde(default)]
    domain: Option<Url>,
    client_id: String,
    client_secret: String,
}

impl EnvironmentEntry {
    fn into_settings(self, default_domain: Url) -> EnvironmentSettings {
        EnvironmentSettings {
            domain: self.domain.unwrap_or(default_domain),
            client_id: self.client_id,
            client_secret: self.client_secret,
        }
    }
}

impl From<EnvironmentsFile> for EnvironmentsConfig {
    fn from(file: EnvironmentsFile) -> Self {
        Self {
            prod: file.prod.into_settings(default_prod_domain()),
            sandbox: file.sandbox.into_settings(default_sandbox_domain()),
        }
    }
}

impl EnvironmentsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.prod.validate("prod")?;
        self.sandbox.validate("sandbox")?;
        Ok(())
    }
}

/// Domain and client credentials for one environment.
#[derive(Clone, Serialize)]
pub struct EnvironmentSettings {
    /// Provider API domain, e.g. `https://api.id.me`.
    pub domain: Url,

    /// OAuth client identifier.
    pub client_id: String,

    /// OAuth client secret.
    #[serde(skip_serializing)]
    pub client_secret: String,
}

impl EnvironmentSettings {
    fn validate(&self, key: &str) -> Result<(), ConfigError> {
        require_http_url(&format!("environments.{key}.domain"), &self.domain)?;
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "environments.{key}.client_id must not be empty"
            )));
        }
        if self.client_secret.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "environments.{key}.client_secret must not be empty"
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for EnvironmentSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentSettings")
            .field("domain", &self.domain.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Identity provider endpoints that do not vary by environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Authorize endpoint used by the "groups" flow for both environments.
    #[serde(default = "default_groups_endpoint")]
    pub groups_endpoint: Url,

    /// EntityID sent with SAML authentication requests.
    #[serde(default = "default_saml_entity_id")]
    pub saml_entity_id: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            groups_endpoint: default_groups_endpoint(),
            saml_entity_id: default_saml_entity_id(),
        }
    }
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_http_url("provider.groups_endpoint", &self.groups_endpoint)?;
        if self.saml_entity_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "provider.saml_entity_id must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn require_http_url(field: &str, url: &Url) -> Result<(), ConfigError> {
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(()),
        _ => Err(ConfigError::Validation(format!(
            "{field} must be an absolute http(s) URL, got '{url}'"
        ))),
    }
}

pub fn default_prod_domain() -> Url {
    Url::parse("https://api.id.me").expect("static URL is valid")
}

pub fn default_sandbox_domain() -> Url {
    Url::parse("https://api.idmelabs.com").expect("static URL is valid")
}

fn default_groups_endpoint() -> Url {
    Url::parse("https://groups.id.me").expect("static URL is valid")
}

fn default_saml_entity_id() -> String {
    "demo.idme.solutions".to_string()
}
