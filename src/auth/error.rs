use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::provider::{ProviderError, UnknownEnvironment};

/// Request-terminating failures of the relying-party routes.
///
/// A missing SAML assertion and a missing or expired session are not errors
/// at this layer; those flows redirect to the start page instead.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("failed to find environment '{0}'")]
    UnknownEnvironment(String),

    #[error("failed to find protocol '{0}'")]
    UnknownProtocol(String),

    #[error("failed to find policy '{0}'")]
    UnknownPolicy(String),

    #[error("authorization code not provided")]
    MissingAuthorizationCode,

    #[error("SAMLResponse not provided")]
    MissingSamlResponse,

    #[error("SAMLResponse could not be decoded: {0}")]
    InvalidSamlResponse(String),

    #[error("request has no usable Host header")]
    MissingHost,

    #[error("identity provider request failed: {0}")]
    Upstream(#[from] ProviderError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<UnknownEnvironment> for AuthError {
    fn from(err: UnknownEnvironment) -> Self {
        AuthError::UnknownEnvironment(err.0)
    }
}

impl From<url::ParseError> for AuthError {
    fn from(err: url::ParseError) -> Self {
        AuthError::Internal(format!("invalid provider URL: {err}"))
    }
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::UnknownEnvironment(_)
            | AuthError::UnknownProtocol(_)
            | AuthError::UnknownPolicy(_) => StatusCode::NOT_FOUND,
            AuthError::MissingAuthorizationCode
            | AuthError::MissingSamlResponse
            | AuthError::InvalidSamlResponse(_)
            | AuthError::MissingHost => StatusCode::BAD_REQUEST,
            AuthError::Upstream(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::UnknownEnvironment(_) => "unknown_environment",
            AuthError::UnknownProtocol(_) => "unknown_protocol",
            AuthError::UnknownPolicy(_) => "unknown_policy",
            AuthError::MissingAuthorizationCode => "missing_authorization_code",
            AuthError::MissingSamlResponse => "missing_saml_response",
            AuthError::InvalidSamlResponse(_) => "invalid_saml_response",
            AuthError::MissingHost => "missing_host",
            AuthError::Upstream(_) => "upstream_error",
            AuthError::Internal(_) => "internal_error",
        }
    }

    fn error_type(&self) -> &'static str {
        match self.status() {
            StatusCode::NOT_FOUND => "not_found_error",
            StatusCode::BAD_REQUEST => "invalid_request_error",
            _ => "server_error",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Upstream and internal details stay in the logs
        let message = if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "Request failed");
            "An error occurred".to_string()
        } else {
            tracing::debug!(error = %self, code = self.code(), "Request rejected");
            self.to_string()
        };

        let body = ErrorResponse::new(self.error_type(), self.code(), message);
        (status, Json(body)).into_response()
    }
}

/// JSON error body: `{"error": {"type", "message", "code", "request_id"}}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorInfo,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    pub code: String,
    /// Filled in by the request-id middleware.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorResponse {
    pub fn new(
        error_type: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorInfo {
                error_type: error_type.into(),
                message: message.into(),
                code: code.into(),
                request_id: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_route_validation_errors_are_404() {
        for err in [
            AuthError::UnknownEnvironment("staging".into()),
            AuthError::UnknownProtocol("ws-fed".into()),
            AuthError::UnknownPolicy("nope".into()),
        ] {
            assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn test_missing_credentials_are_400() {
        assert_eq!(
            AuthError::MissingAuthorizationCode.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::MissingSamlResponse.into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_upstream_error_hides_details() {
        let err = AuthError::Upstream(ProviderError::Status {
            endpoint: "token",
            status: 401,
            body: "client secret mismatch".into(),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "upstream_error");
        assert_eq!(json["error"]["message"], "An error occurred");
        assert!(!json.to_string().contains("mismatch"));
    }

    #[tokio::test]
    async fn test_client_error_body() {
        let json = body_json(AuthError::UnknownEnvironment("staging".into()).into_response()).await;
        assert_eq!(json["error"]["type"], "not_found_error");
        assert_eq!(json["error"]["code"], "unknown_environment");
        assert_eq!(json["error"]["message"], "failed to find environment 'staging'");
        assert!(json["error"].get("request_id").is_none());
    }
}
