//! Authorization-code callback: token exchange and attribute normalization.

use jsonwebtoken::{DecodingKey, Validation};
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

use super::{AttributeMap, Protocol};
use crate::provider::{DataEndpoint, EnvironmentConfig, ProviderClient, ProviderError};

/// Verified user data returned by a completed callback.
#[derive(Debug, Clone, PartialEq)]
pub struct UserData {
    /// Provider response as received: JSON when the body was JSON, otherwise
    /// the body text.
    pub raw_payload: Value,
    pub attributes: AttributeMap,
}

#[derive(Debug, Deserialize)]
struct AttributesResponse {
    attributes: Vec<AttributeRecord>,
}

#[derive(Debug, Deserialize)]
struct AttributeRecord {
    handle: String,
    #[serde(default)]
    value: Value,
}

/// Exchange `code` for an access token and fetch the user's data.
///
/// Makes exactly two sequential provider calls. Any failure aborts the flow.
#[tracing::instrument(skip(client, env, code), fields(env = %env.key, protocol = %protocol))]
pub async fn complete_token_flow(
    client: &ProviderClient,
    env: &EnvironmentConfig,
    protocol: Protocol,
    code: &str,
    redirect_uri: &Url,
) -> Result<UserData, ProviderError> {
    let access_token = client.exchange_code(env, code, redirect_uri).await?;
    let data = protocol.data_endpoint();
    let body = client.fetch_user_data(env, data, &access_token).await?;

    let user = match data {
        DataEndpoint::UserInfo => decode_userinfo(&body)?,
        DataEndpoint::Attributes => normalize_attributes(&body)?,
    };

    tracing::info!(attributes = user.attributes.len(), "Token flow completed");
    Ok(user)
}

/// Reduce an OAuth `{"attributes": [{handle, value}]}` body to a flat map.
///
/// A handle that appears more than once keeps its last value.
pub fn normalize_attributes(body: &str) -> Result<UserData, ProviderError> {
    let raw_payload: Value = serde_json::from_str(body).map_err(|e| malformed("attributes", e))?;
    let response: AttributesResponse =
        serde_json::from_value(raw_payload.clone()).map_err(|e| malformed("attributes", e))?;

    let attributes = response
        .attributes
        .into_iter()
        .map(|record| (record.handle, scalar_to_string(&record.value)))
        .collect();

    Ok(UserData {
        raw_payload,
        attributes,
    })
}

/// Decode an OIDC userinfo body into claims.
///
/// The body is either a compact JWT or a JSON claim set. JWT signatures are
/// not verified.
pub fn decode_userinfo(body: &str) -> Result<UserData, ProviderError> {
    let trimmed = body.trim();

    if trimmed.starts_with('{') {
        let raw_payload: Value =
            serde_json::from_str(trimmed).map_err(|e| malformed("userinfo", e))?;
        let Value::Object(claims) = &raw_payload else {
            return Err(malformed("userinfo", "claim set is not an object"));
        };
        let attributes = flatten_claims(claims);
        return Ok(UserData {
            raw_payload,
            attributes,
        });
    }

    // Some deployments wrap the token in a JSON string
    let token = if trimmed.starts_with('"') {
        serde_json::from_str::<String>(trimmed).map_err(|e| malformed("userinfo", e))?
    } else {
        trimmed.to_string()
    };

    let claims = decode_jwt_claims(&token)?;
    Ok(UserData {
        raw_payload: Value::String(token),
        attributes: flatten_claims(&claims),
    })
}

fn decode_jwt_claims(token: &str) -> Result<Map<String, Value>, ProviderError> {
    let header = jsonwebtoken::decode_header(token).map_err(|e| malformed("userinfo", e))?;

    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = jsonwebtoken::decode::<Map<String, Value>>(
        token,
        &DecodingKey::from_secret(&[]),
        &validation,
    )
    .map_err(|e| malformed("userinfo", e))?;

    Ok(data.claims)
}

/// Flatten a claim set into the string-valued attribute map.
///
/// Strings are kept verbatim; numbers, booleans, arrays and objects become
/// their compact JSON text.
pub fn flatten_claims(claims: &Map<String, Value>) -> AttributeMap {
    claims
        .iter()
        .map(|(name, value)| (name.clone(), scalar_to_string(value)))
        .collect()
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn malformed(endpoint: &'static str, err: impl std::fmt::Display) -> ProviderError {
    ProviderError::MalformedBody {
        endpoint,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    use super::*;
    use crate::provider::EnvironmentKey;

    fn sign(claims: &Value) -> String {
        jsonwebtoken::encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(b"provider-signing-key"),
        )
        .unwrap()
    }

    #[test]
    fn test_normalize_attributes() {
        let body = json!({
            "attributes": [
                {"handle": "fname", "name": "First Name", "value": "Jane"},
                {"handle": "email", "name": "Email", "value": "jane@example.com"}
            ],
            "status": [{"group": "military", "verified": true}]
        })
        .to_string();

        let user = normalize_attributes(&body).unwrap();
        assert_eq!(user.attributes["fname"], "Jane");
        assert_eq!(user.attributes["email"], "jane@example.com");
        assert_eq!(user.attributes.len(), 2);
        assert_eq!(user.raw_payload["status"][0]["group"], "military");
    }

    #[test]
    fn test_normalize_attributes_last_handle_wins() {
        let body = r#"{"attributes":[{"handle":"zip","value":"10001"},{"handle":"zip","value":"94105"}]}"#;
        let user = normalize_attributes(body).unwrap();
        assert_eq!(user.attributes["zip"], "94105");
    }

    #[test]
    fn test_normalize_attributes_stringifies_scalars() {
        let body = r#"{"attributes":[{"handle":"age","value":42},{"handle":"verified","value":true},{"handle":"middle"}]}"#;
        let user = normalize_attributes(body).unwrap();
        assert_eq!(user.attributes["age"], "42");
        assert_eq!(user.attributes["verified"], "true");
        assert_eq!(user.attributes["middle"], "");
    }

    #[test]
    fn test_normalize_attributes_rejects_other_shapes() {
        let err = normalize_attributes(r#"{"data":[]}"#).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedBody { endpoint: "attributes", .. }));
    }

    #[test]
    fn test_decode_userinfo_jwt() {
        let token = sign(&json!({
            "sub": "4f2c",
            "fname": "Jane",
            "uuid": "4f2c",
            "groups": ["military", "veteran"],
            "exp": 1
        }));

        let user = decode_userinfo(&token).unwrap();
        assert_eq!(user.attributes["fname"], "Jane");
        assert_eq!(user.attributes["groups"], r#"["military","veteran"]"#);
        assert_eq!(user.attributes["exp"], "1");
        assert_eq!(user.raw_payload, Value::String(token));
    }

    #[test]
    fn test_decode_userinfo_quoted_jwt() {
        let token = sign(&json!({"email": "jane@example.com"}));
        let user = decode_userinfo(&format!("\"{token}\"")).unwrap();
        assert_eq!(user.attributes["email"], "jane@example.com");
    }

    #[test]
    fn test_decode_userinfo_json() {
        let user = decode_userinfo(r#"{"email":"jane@example.com","zip":"10001"}"#).unwrap();
        assert_eq!(user.attributes["zip"], "10001");
        assert!(user.raw_payload.is_object());
    }

    #[test]
    fn test_decode_userinfo_garbage() {
        let err = decode_userinfo("not-a-token").unwrap_err();
        assert!(matches!(err, ProviderError::MalformedBody { endpoint: "userinfo", .. }));
    }

    #[tokio::test]
    async fn test_complete_oauth_flow() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "at-1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/public/v3/attributes.json"))
            .and(query_param("access_token", "at-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "attributes": [{"handle": "fname", "value": "Jane"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let env = EnvironmentConfig {
            key: EnvironmentKey::Sandbox,
            domain: Url::parse(&server.uri()).unwrap(),
            client_id: "client".into(),
            client_secret: "secret".into(),
        };
        let redirect_uri = Url::parse("https://demo.test/callback/sandbox/oauth").unwrap();
        let client = ProviderClient::new(reqwest::Client::new());

        let user = complete_token_flow(&client, &env, Protocol::OAuth, "code-1", &redirect_uri)
            .await
            .unwrap();
        assert_eq!(user.attributes, AttributeMap::from([("fname".into(), "Jane".into())]));
    }

    #[tokio::test]
    async fn test_token_failure_skips_data_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/public/v3/userinfo.json"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let env = EnvironmentConfig {
            key: EnvironmentKey::Prod,
            domain: Url::parse(&server.uri()).unwrap(),
            client_id: "client".into(),
            client_secret: "secret".into(),
        };
        let redirect_uri = Url::parse("https://demo.test/callback/prod/oidc").unwrap();
        let client = ProviderClient::new(reqwest::Client::new());

        let err = complete_token_flow(&client, &env, Protocol::Oidc, "used", &redirect_uri)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Status { endpoint: "token", status: 400, .. }));
    }
}
