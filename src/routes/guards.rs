//! Route guards.
//!
//! Each guard is an extractor built from pure validation steps, so a bad
//! `{env}`, `{protocol}` or `{policy}` segment is rejected before the handler
//! runs and before any provider call is made. Guards compose: the policy
//! guard runs the protocol guard, which runs the environment guard.

use axum::{
    extract::{FromRequestParts, RawPathParams},
    http::{HeaderMap, Uri, header::HOST, request::Parts},
};

use crate::{
    AppState,
    auth::{AuthError, Protocol, validate_policy},
    provider::{EnvironmentKey, EnvironmentRegistry},
};

/// Validated `{env}` segment.
#[derive(Debug, Clone, Copy)]
pub struct EnvRoute {
    pub env: EnvironmentKey,
}

/// Validated `{env}` and `{protocol}` segments.
#[derive(Debug, Clone, Copy)]
pub struct ProtocolRoute {
    pub env: EnvironmentKey,
    pub protocol: Protocol,
}

/// Validated `{env}`, `{protocol}` and `{policy}` segments.
#[derive(Debug, Clone)]
pub struct PolicyRoute {
    pub env: EnvironmentKey,
    pub protocol: Protocol,
    pub policy: String,
}

/// Host the browser used to reach this service.
#[derive(Debug, Clone)]
pub struct RequestHost(pub String);

pub fn validate_env(registry: &EnvironmentRegistry, raw: &str) -> Result<EnvironmentKey, AuthError> {
    Ok(registry.resolve(raw)?.key)
}

pub fn validate_protocol(raw: &str) -> Result<Protocol, AuthError> {
    raw.parse()
}

/// Host from the `Host` header, falling back to the URI authority (HTTP/2).
pub fn request_host(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.as_str().to_string()))
}

async fn path_params(parts: &mut Parts, state: &AppState) -> Result<RawPathParams, AuthError> {
    RawPathParams::from_request_parts(parts, state)
        .await
        .map_err(|e| AuthError::Internal(format!("route parameters unavailable: {e}")))
}

fn param<'a>(params: &'a RawPathParams, name: &str) -> Result<&'a str, AuthError> {
    params
        .iter()
        .find_map(|(key, value)| (key == name).then_some(value))
        .ok_or_else(|| AuthError::Internal(format!("route has no {{{name}}} segment")))
}

impl FromRequestParts<AppState> for EnvRoute {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let params = path_params(parts, state).await?;
        let env = validate_env(&state.environments, param(&params, "env")?)?;
        Ok(Self { env })
    }
}

impl FromRequestParts<AppState> for ProtocolRoute {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let EnvRoute { env } = EnvRoute::from_request_parts(parts, state).await?;
        let params = path_params(parts, state).await?;
        let protocol = validate_protocol(param(&params, "protocol")?)?;
        Ok(Self { env, protocol })
    }
}

impl FromRequestParts<AppState> for PolicyRoute {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let ProtocolRoute { env, protocol } = ProtocolRoute::from_request_parts(parts, state).await?;
        let params = path_params(parts, state).await?;
        let policy = param(&params, "policy")?.to_string();

        let env_config = state.environments.get(env);
        if !validate_policy(&state.provider, env_config, &policy).await? {
            return Err(AuthError::UnknownPolicy(policy));
        }

        Ok(Self {
            env,
            protocol,
            policy,
        })
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestHost {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        request_host(&parts.headers, &parts.uri)
            .map(RequestHost)
            .ok_or(AuthError::MissingHost)
    }
}
