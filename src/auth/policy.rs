//! Policy listing and route-parameter validation.
//!
//! Policies are fetched from the provider on every call. Nothing is cached.

use crate::provider::{EnvironmentConfig, Policy, ProviderClient, ProviderError};

/// Reserved policy name that routes to the groups authorize endpoint.
///
/// Group scopes are provider-internal and never appear in the policy list.
pub const GROUPS_POLICY: &str = "groups";

/// Fetch the policies available in `env`.
pub async fn list_policies(
    client: &ProviderClient,
    env: &EnvironmentConfig,
) -> Result<Vec<Policy>, ProviderError> {
    client.list_policies(env).await
}

/// Whether `handle` names a policy of `env`, or is [`GROUPS_POLICY`].
///
/// The groups sentinel is accepted without contacting the provider.
pub async fn validate_policy(
    client: &ProviderClient,
    env: &EnvironmentConfig,
    handle: &str,
) -> Result<bool, ProviderError> {
    if handle == GROUPS_POLICY {
        return Ok(true);
    }

    let policies = list_policies(client, env).await?;
    Ok(contains_policy(&policies, handle))
}

/// Exact, case-sensitive match on policy handles.
pub fn contains_policy(policies: &[Policy], handle: &str) -> bool {
    policies.iter().any(|p| p.handle == handle)
}

#[cfg(test)]
mod tests {
    use url::Url;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;
    use crate::provider::EnvironmentKey;

    fn env_for(server: &MockServer) -> EnvironmentConfig {
        EnvironmentConfig {
            key: EnvironmentKey::Prod,
            domain: Url::parse(&server.uri()).unwrap(),
            client_id: "client".into(),
            client_secret: "secret".into(),
        }
    }

    async fn mount_policies(server: &MockServer, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path("/api/public/v3/policies.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"handle": "military", "name": "Military"},
                {"handle": "student", "name": "Student"}
            ])))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_known_policy_is_valid() {
        let server = MockServer::start().await;
        mount_policies(&server, 1).await;

        let client = ProviderClient::new(reqwest::Client::new());
        assert!(validate_policy(&client, &env_for(&server), "military").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_policy_is_invalid() {
        let server = MockServer::start().await;
        mount_policies(&server, 1).await;

        let client = ProviderClient::new(reqwest::Client::new());
        assert!(!validate_policy(&client, &env_for(&server), "Military").await.unwrap());
    }

    #[tokio::test]
    async fn test_groups_bypasses_policy_list() {
        let server = MockServer::start().await;
        mount_policies(&server, 0).await;

        let client = ProviderClient::new(reqwest::Client::new());
        assert!(validate_policy(&client, &env_for(&server), GROUPS_POLICY).await.unwrap());
    }

    #[tokio::test]
    async fn test_every_validation_refetches() {
        let server = MockServer::start().await;
        mount_policies(&server, 2).await;

        let client = ProviderClient::new(reqwest::Client::new());
        let env = env_for(&server);
        validate_policy(&client, &env, "student").await.unwrap();
        validate_policy(&client, &env, "student").await.unwrap();
    }

    #[tokio::test]
    async fn test_upstream_failure_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/public/v3/policies.json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = ProviderClient::new(reqwest::Client::new());
        let err = validate_policy(&client, &env_for(&server), "military")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 503, .. }));
    }
}
