use serde::{Deserialize, Serialize};
use url::Url;

use super::{EnvironmentConfig, ProviderError};

/// Longest upstream error body kept in a [`ProviderError::Status`].
const MAX_ERROR_BODY_LEN: usize = 512;

/// A verification policy offered by the provider.
///
/// Only `handle` is interpreted; every other field is carried as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub handle: String,

    #[serde(default, alias = "name")]
    pub label: String,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// User data resources exposed under `/api/public/v3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataEndpoint {
    /// OIDC userinfo, returned as a signed JWT or a JSON claim set.
    UserInfo,
    /// OAuth attribute records.
    Attributes,
}

impl DataEndpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataEndpoint::UserInfo => "userinfo",
            DataEndpoint::Attributes => "attributes",
        }
    }

    fn path(&self) -> String {
        format!("api/public/v3/{}.json", self.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// Outbound HTTP client for the identity provider.
///
/// Wraps a single shared `reqwest::Client`; every call is one request with
/// no retry.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
}

impl ProviderClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Fetch the policies available to the environment's client.
    #[tracing::instrument(skip(self, env), fields(env = %env.key))]
    pub async fn list_policies(&self, env: &EnvironmentConfig) -> Result<Vec<Policy>, ProviderError> {
        const ENDPOINT: &str = "policies";

        let url = env.endpoint("api/public/v3/policies.json")?;
        let response = self
            .http
            .get(url)
            .query(&[
                ("client_id", env.client_id.as_str()),
                ("client_secret", env.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|source| ProviderError::Transport {
                endpoint: ENDPOINT,
                source,
            })?;

        let body = success_body(ENDPOINT, response).await?;
        let policies: Vec<Policy> =
            serde_json::from_str(&body).map_err(|e| ProviderError::MalformedBody {
                endpoint: ENDPOINT,
                message: e.to_string(),
            })?;

        tracing::debug!(count = policies.len(), "Fetched policies");
        Ok(policies)
    }

    /// Exchange an authorization code for an access token.
    ///
    /// `redirect_uri` must match the one sent with the authorization request.
    #[tracing::instrument(skip(self, env, code), fields(env = %env.key))]
    pub async fn exchange_code(
        &self,
        env: &EnvironmentConfig,
        code: &str,
        redirect_uri: &Url,
    ) -> Result<String, ProviderError> {
        const ENDPOINT: &str = "token";

        let url = env.endpoint("oauth/token")?;
        let response = self
            .http
            .post(url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", env.client_id.as_str()),
                ("client_secret", env.client_secret.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|source| ProviderError::Transport {
                endpoint: ENDPOINT,
                source,
            })?;

        let body = success_body(ENDPOINT, response).await?;
        let tokens: TokenResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::MalformedBody {
                endpoint: ENDPOINT,
                message: e.to_string(),
            })?;

        tokens
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or(ProviderError::MissingAccessToken)
    }

    /// Fetch the raw user data body for an access token.
    #[tracing::instrument(skip(self, env, access_token), fields(env = %env.key, endpoint = data.as_str()))]
    pub async fn fetch_user_data(
        &self,
        env: &EnvironmentConfig,
        data: DataEndpoint,
        access_token: &str,
    ) -> Result<String, ProviderError> {
        let url = env.endpoint(&data.path())?;
        let response = self
            .http
            .get(url)
            .query(&[("access_token", access_token)])
            .send()
            .await
            .map_err(|source| ProviderError::Transport {
                endpoint: data.as_str(),
                source,
            })?;

        success_body(data.as_str(), response).await
    }
}

/// Read the body of a 2xx response, or turn anything else into an error.
async fn success_body(
    endpoint: &'static str,
    response: reqwest::Response,
) -> Result<String, ProviderError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| ProviderError::Transport { endpoint, source })?;

    if !status.is_success() {
        let mut body = body;
        if body.len() > MAX_ERROR_BODY_LEN {
            let mut cut = MAX_ERROR_BODY_LEN;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        return Err(ProviderError::Status {
            endpoint,
            status: status.as_u16(),
            body,
        });
    }

    Ok(body)
}
