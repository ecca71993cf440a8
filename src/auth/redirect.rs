//! Authorization request URLs.
//!
//! [`build_redirect`] is pure: the same inputs always yield the same URL.

use serde::Deserialize;
use url::Url;

use super::{AuthError, GROUPS_POLICY, Protocol};
use crate::{
    config::ProviderConfig,
    provider::{EnvironmentConfig, EnvironmentKey},
};

/// SAML NameID format requested from the provider.
pub const SAML_NAME_ID_POLICY: &str = "urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified";

/// Optional query parameters forwarded from the incoming request.
///
/// Values are passed through unvalidated; they are only URL-encoded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedirectParams {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub eid: Option<String>,
    /// Space-separated group scopes for the groups flow.
    #[serde(default)]
    pub groups: Option<String>,
}

/// Which authorization request shape a (protocol, policy) pair selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationFlow {
    Groups,
    OAuth,
    Oidc,
    Saml,
}

impl AuthorizationFlow {
    /// The groups policy overrides the protocol.
    pub fn select(protocol: Protocol, policy: &str) -> Self {
        if policy == GROUPS_POLICY {
            return AuthorizationFlow::Groups;
        }
        match protocol {
            Protocol::OAuth => AuthorizationFlow::OAuth,
            Protocol::Oidc => AuthorizationFlow::Oidc,
            Protocol::Saml => AuthorizationFlow::Saml,
        }
    }
}

/// Callback URL registered with the provider for `env` and `protocol`.
///
/// The token exchange must send back exactly this value.
pub fn callback_uri(
    scheme: &str,
    host: &str,
    env: EnvironmentKey,
    protocol: Protocol,
) -> Result<Url, AuthError> {
    if host.is_empty() || host.contains(['/', '?', '#', '@']) {
        return Err(AuthError::MissingHost);
    }
    Url::parse(&format!("{scheme}://{host}/callback/{env}/{protocol}"))
        .map_err(|_| AuthError::MissingHost)
}

/// Build the provider authorization request for a validated route.
pub fn build_redirect(
    env: &EnvironmentConfig,
    protocol: Protocol,
    policy: &str,
    params: &RedirectParams,
    redirect_uri: &Url,
    provider: &ProviderConfig,
) -> Result<Url, AuthError> {
    let flow = AuthorizationFlow::select(protocol, policy);

    let mut url = match flow {
        AuthorizationFlow::Groups => provider.groups_endpoint.clone(),
        AuthorizationFlow::OAuth | AuthorizationFlow::Oidc => env.endpoint("oauth/authorize")?,
        AuthorizationFlow::Saml => env.endpoint("saml/SingleSignOnService")?,
    };

    {
        let mut query = url.query_pairs_mut();
        match flow {
            AuthorizationFlow::Groups => {
                query
                    .append_pair("client_id", &env.client_id)
                    .append_pair("redirect_uri", redirect_uri.as_str())
                    .append_pair("response_type", "code")
                    .append_pair("scopes", params.groups.as_deref().unwrap_or_default())
                    .append_pair("sandbox", if env.key.is_sandbox() { "true" } else { "false" });
            }
            AuthorizationFlow::OAuth => {
                query
                    .append_pair("client_id", &env.client_id)
                    .append_pair("redirect_uri", redirect_uri.as_str())
                    .append_pair("response_type", "code")
                    .append_pair("scope", policy);
            }
            AuthorizationFlow::Oidc => {
                query
                    .append_pair("client_id", &env.client_id)
                    .append_pair("redirect_uri", redirect_uri.as_str())
                    .append_pair("response_type", "code")
                    .append_pair("scope", &format!("openid {policy}"));
            }
            AuthorizationFlow::Saml => {
                query
                    .append_pair("EntityID", &provider.saml_entity_id)
                    .append_pair("AuthnContext", policy)
                    .append_pair("NameIDPolicy", SAML_NAME_ID_POLICY);
            }
        }

        // state before eid
        if let Some(state) = params.state.as_deref().filter(|s| !s.is_empty()) {
            query.append_pair("state", state);
        }
        if let Some(eid) = params.eid.as_deref().filter(|s| !s.is_empty()) {
            query.append_pair("eid", eid);
        }
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_prod_domain, default_sandbox_domain};

    fn env(key: EnvironmentKey) -> EnvironmentConfig {
        EnvironmentConfig {
            key,
            domain: match key {
                EnvironmentKey::Prod => default_prod_domain(),
                EnvironmentKey::Sandbox => default_sandbox_domain(),
            },
            client_id: "abc123".into(),
            client_secret: "unused".into(),
        }
    }

    fn redirect(
        key: EnvironmentKey,
        protocol: Protocol,
        policy: &str,
        params: &RedirectParams,
    ) -> String {
        let redirect_uri = callback_uri("https", "demo.test", key, protocol).unwrap();
        build_redirect(
            &env(key),
            protocol,
            policy,
            params,
            &redirect_uri,
            &ProviderConfig::default(),
        )
        .unwrap()
        .to_string()
    }

    #[test]
    fn test_oauth_redirect() {
        let url = redirect(
            EnvironmentKey::Prod,
            Protocol::OAuth,
            "military",
            &RedirectParams::default(),
        );
        assert_eq!(
            url,
            "https://api.id.me/oauth/authorize?client_id=abc123\
             &redirect_uri=https%3A%2F%2Fdemo.test%2Fcallback%2Fprod%2Foauth\
             &response_type=code&scope=military"
        );
    }

    #[test]
    fn test_oidc_scope_prefixed_with_openid() {
        let url = redirect(
            EnvironmentKey::Sandbox,
            Protocol::Oidc,
            "teacher",
            &RedirectParams::default(),
        );
        assert!(url.starts_with("https://api.idmelabs.com/oauth/authorize?"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fdemo.test%2Fcallback%2Fsandbox%2Foidc"));
        assert!(url.ends_with("&scope=openid+teacher"));
    }

    #[test]
    fn test_saml_redirect() {
        let url = redirect(
            EnvironmentKey::Prod,
            Protocol::Saml,
            "http://idmanagement.gov/ns/assurance/ial/2",
            &RedirectParams::default(),
        );
        assert_eq!(
            url,
            "https://api.id.me/saml/SingleSignOnService?EntityID=demo.idme.solutions\
             &AuthnContext=http%3A%2F%2Fidmanagement.gov%2Fns%2Fassurance%2Fial%2F2\
             &NameIDPolicy=urn%3Aoasis%3Anames%3Atc%3ASAML%3A1.1%3Anameid-format%3Aunspecified"
        );
        assert!(!url.contains("client_id"));
    }

    #[test]
    fn test_groups_overrides_protocol() {
        let params = RedirectParams {
            groups: Some("military student".into()),
            ..Default::default()
        };
        for protocol in Protocol::ALL {
            let url = redirect(EnvironmentKey::Sandbox, protocol, GROUPS_POLICY, &params);
            assert!(url.starts_with("https://groups.id.me/?client_id=abc123"), "{url}");
            assert!(url.contains(&format!("callback%2Fsandbox%2F{protocol}")));
            assert!(url.ends_with("&response_type=code&scopes=military+student&sandbox=true"));
        }

        let prod = redirect(EnvironmentKey::Prod, Protocol::OAuth, GROUPS_POLICY, &params);
        assert!(prod.ends_with("&sandbox=false"));
    }

    #[test]
    fn test_groups_without_scopes() {
        let url = redirect(
            EnvironmentKey::Prod,
            Protocol::OAuth,
            GROUPS_POLICY,
            &RedirectParams::default(),
        );
        assert!(url.contains("&scopes=&sandbox=false"));
    }

    #[test]
    fn test_state_appended_before_eid() {
        let params = RedirectParams {
            state: Some("xyz".into()),
            eid: Some("e-1".into()),
            groups: None,
        };
        let url = redirect(EnvironmentKey::Prod, Protocol::OAuth, "military", &params);
        assert!(url.ends_with("&scope=military&state=xyz&eid=e-1"), "{url}");

        let saml = redirect(EnvironmentKey::Prod, Protocol::Saml, "military", &params);
        assert!(saml.ends_with("unspecified&state=xyz&eid=e-1"), "{saml}");
    }

    #[test]
    fn test_empty_state_and_eid_omitted() {
        let params = RedirectParams {
            state: Some(String::new()),
            eid: Some("e-1".into()),
            groups: None,
        };
        let url = redirect(EnvironmentKey::Prod, Protocol::OAuth, "military", &params);
        assert!(!url.contains("state="));
        assert!(url.ends_with("&eid=e-1"));
    }

    #[test]
    fn test_params_are_encoded() {
        let params = RedirectParams {
            state: Some("a&scope=admin".into()),
            ..Default::default()
        };
        let url = redirect(EnvironmentKey::Prod, Protocol::OAuth, "military", &params);
        assert!(url.ends_with("&state=a%26scope%3Dadmin"), "{url}");
    }

    #[test]
    fn test_redirect_is_deterministic() {
        let params = RedirectParams {
            state: Some("s".into()),
            eid: Some("e".into()),
            groups: Some("g".into()),
        };
        let first = redirect(EnvironmentKey::Sandbox, Protocol::Oidc, "military", &params);
        let second = redirect(EnvironmentKey::Sandbox, Protocol::Oidc, "military", &params);
        assert_eq!(first, second);
    }

    #[test]
    fn test_callback_uri_rejects_bad_host() {
        assert!(callback_uri("https", "", EnvironmentKey::Prod, Protocol::OAuth).is_err());
        assert!(
            callback_uri("https", "evil.test/x?", EnvironmentKey::Prod, Protocol::OAuth).is_err()
        );
        assert_eq!(
            callback_uri("http", "localhost:5001", EnvironmentKey::Sandbox, Protocol::Saml)
                .unwrap()
                .as_str(),
            "http://localhost:5001/callback/sandbox/saml"
        );
    }
}
