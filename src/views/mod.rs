//! Server-rendered pages and the profile presenter.

mod profile;

use askama::Template;
use axum::response::Html;

pub use profile::{ProfileView, format_payload, present};

use crate::{
    auth::{AuthError, GROUPS_POLICY, Protocol},
    provider::{EnvironmentKey, Policy},
};

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexPage {
    pub environments: Vec<&'static str>,
}

#[derive(Template)]
#[template(path = "env.html")]
pub struct EnvPage {
    pub env: &'static str,
    pub protocols: Vec<&'static str>,
}

#[derive(Template)]
#[template(path = "policies.html")]
pub struct PoliciesPage {
    pub env: &'static str,
    pub protocol: &'static str,
    pub policies: Vec<Policy>,
    pub groups_policy: &'static str,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfilePage {
    pub profile: ProfileView,
}

impl IndexPage {
    pub fn new() -> Self {
        Self {
            environments: EnvironmentKey::ALL.iter().map(|k| k.as_str()).collect(),
        }
    }
}

impl Default for IndexPage {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvPage {
    pub fn new(env: EnvironmentKey) -> Self {
        Self {
            env: env.as_str(),
            protocols: Protocol::ALL.iter().map(|p| p.as_str()).collect(),
        }
    }
}

impl PoliciesPage {
    pub fn new(env: EnvironmentKey, protocol: Protocol, policies: Vec<Policy>) -> Self {
        Self {
            env: env.as_str(),
            protocol: protocol.as_str(),
            policies,
            groups_policy: GROUPS_POLICY,
        }
    }
}

/// Render a page, turning template failures into a 500.
pub fn render<T: Template>(page: &T) -> Result<Html<String>, AuthError> {
    page.render()
        .map(Html)
        .map_err(|e| AuthError::Internal(format!("template rendering failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_links_environments() {
        let html = IndexPage::new().render().unwrap();
        assert!(html.contains(r#"href="/idme/prod""#));
        assert!(html.contains(r#"href="/idme/sandbox""#));
    }

    #[test]
    fn test_pages_need_no_static_assets() {
        let html = IndexPage::new().render().unwrap();
        assert!(html.contains("<style>"));
        assert!(!html.contains("<link rel=\"stylesheet\""));
    }

    #[test]
    fn test_env_links_protocols() {
        let html = EnvPage::new(EnvironmentKey::Sandbox).render().unwrap();
        for protocol in ["oauth", "oidc", "saml"] {
            assert!(html.contains(&format!(r#"href="/idme/sandbox/{protocol}""#)));
        }
    }

    #[test]
    fn test_policies_page_escapes_labels() {
        let policies = vec![Policy {
            handle: "military".into(),
            label: "Military <b> & Veterans".into(),
            extra: Default::default(),
        }];
        let html = PoliciesPage::new(EnvironmentKey::Prod, Protocol::Oidc, policies)
            .render()
            .unwrap();

        assert!(html.contains(r#"href="/idme/prod/oidc/military""#));
        assert!(html.contains("Military &lt;b&gt; &amp; Veterans"));
        assert!(html.contains(r#"action="/idme/prod/oidc/groups""#));
    }
}
