use std::{fmt, str::FromStr};

use url::Url;

use crate::config::{EnvironmentSettings, EnvironmentsConfig};

/// One of the two provider environments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvironmentKey {
    Prod,
    Sandbox,
}

impl EnvironmentKey {
    pub const ALL: [EnvironmentKey; 2] = [EnvironmentKey::Prod, EnvironmentKey::Sandbox];

    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentKey::Prod => "prod",
            EnvironmentKey::Sandbox => "sandbox",
        }
    }

    pub fn is_sandbox(&self) -> bool {
        matches!(self, EnvironmentKey::Sandbox)
    }
}

impl fmt::Display for EnvironmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a path segment names no known environment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown environment: {0}")]
pub struct UnknownEnvironment(pub String);

impl FromStr for EnvironmentKey {
    type Err = UnknownEnvironment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prod" => Ok(EnvironmentKey::Prod),
            "sandbox" => Ok(EnvironmentKey::Sandbox),
            other => Err(UnknownEnvironment(other.to_string())),
        }
    }
}

/// Domain and credentials of a resolved environment.
#[derive(Clone)]
pub struct EnvironmentConfig {
    pub key: EnvironmentKey,
    pub domain: Url,
    pub client_id: String,
    pub client_secret: String,
}

impl EnvironmentConfig {
    fn from_settings(key: EnvironmentKey, settings: &EnvironmentSettings) -> Self {
        Self {
            key,
            domain: settings.domain.clone(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
        }
    }

    /// Absolute URL of `path` on this environment's domain.
    ///
    /// Any path component already on the configured domain is kept.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        let base = self.domain.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/{}", path.trim_start_matches('/')))
    }
}

impl fmt::Debug for EnvironmentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentConfig")
            .field("key", &self.key)
            .field("domain", &self.domain.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Read-only lookup from environment key to its configuration.
///
/// Built once at start-up and shared by every request.
#[derive(Debug, Clone)]
pub struct EnvironmentRegistry {
    prod: EnvironmentConfig,
    sandbox: EnvironmentConfig,
}

impl EnvironmentRegistry {
    pub fn from_config(config: &EnvironmentsConfig) -> Self {
        Self {
            prod: EnvironmentConfig::from_settings(EnvironmentKey::Prod, &config.prod),
            sandbox: EnvironmentConfig::from_settings(EnvironmentKey::Sandbox, &config.sandbox),
        }
    }

    pub fn get(&self, key: EnvironmentKey) -> &EnvironmentConfig {
        match key {
            EnvironmentKey::Prod => &self.prod,
            EnvironmentKey::Sandbox => &self.sandbox,
        }
    }

    /// Resolve a raw route segment to its environment.
    pub fn resolve(&self, key: &str) -> Result<&EnvironmentConfig, UnknownEnvironment> {
        key.parse().map(|key| self.get(key))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::config::{default_prod_domain, default_sandbox_domain};

    fn registry() -> EnvironmentRegistry {
        EnvironmentRegistry::from_config(&EnvironmentsConfig {
            prod: EnvironmentSettings {
                domain: default_prod_domain(),
                client_id: "prod-id".into(),
                client_secret: "prod-secret".into(),
            },
            sandbox: EnvironmentSettings {
                domain: default_sandbox_domain(),
                client_id: "sandbox-id".into(),
                client_secret: "sandbox-secret".into(),
            },
        })
    }

    #[rstest]
    #[case("prod", EnvironmentKey::Prod, "prod-id")]
    #[case("sandbox", EnvironmentKey::Sandbox, "sandbox-id")]
    fn test_resolve_known(#[case] raw: &str, #[case] key: EnvironmentKey, #[case] client_id: &str) {
        let registry = registry();
        let env = registry.resolve(raw).unwrap();
        assert_eq!(env.key, key);
        assert_eq!(env.client_id, client_id);
    }

    #[rstest]
    #[case("staging")]
    #[case("PROD")]
    #[case("")]
    #[case("prod ")]
    fn test_resolve_unknown(#[case] raw: &str) {
        let err = registry().resolve(raw).unwrap_err();
        assert_eq!(err, UnknownEnvironment(raw.to_string()));
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let registry = registry();
        let env = registry.get(EnvironmentKey::Sandbox);
        assert_eq!(
            env.endpoint("/oauth/token").unwrap().as_str(),
            "https://api.idmelabs.com/oauth/token"
        );

        let mut nested = env.clone();
        nested.domain = Url::parse("http://127.0.0.1:9000/idme/").unwrap();
        assert_eq!(
            nested.endpoint("api/public/v3/policies.json").unwrap().as_str(),
            "http://127.0.0.1:9000/idme/api/public/v3/policies.json"
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let registry = registry();
        let debug = format!("{:?}", registry.get(EnvironmentKey::Prod));
        assert!(!debug.contains("prod-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
