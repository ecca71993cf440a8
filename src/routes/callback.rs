use axum::{
    Form,
    extract::{Query, State, rejection::FormRejection},
    response::Response,
};
use chrono::Utc;
use serde::Deserialize;
use tower_cookies::Cookies;

use super::{
    found,
    guards::{ProtocolRoute, RequestHost},
};
use crate::{
    AppState,
    auth::{
        AuthError, SamlError, SessionArtifact, UserData, callback_uri, complete_token_flow,
        decode_saml_response, extract_attributes, store_session,
    },
};

/// Query parameters on the authorization-code callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
}

/// Form body posted by the provider to the SAML callback.
#[derive(Deserialize)]
pub struct SamlCallbackForm {
    #[serde(rename = "SAMLResponse", default)]
    pub saml_response: Option<String>,
}

/// Authorization-code callback for OAuth and OIDC.
///
/// Exchanges the code, fetches the user's data, stores the session cookies
/// and redirects to `/profile`. Provider failures abort with a 500 and leave
/// any previous session untouched.
#[tracing::instrument(
    name = "callback.token",
    skip(state, host, query, cookies),
    fields(env = %route.env, protocol = %route.protocol)
)]
pub async fn token_callback(
    State(state): State<AppState>,
    route: ProtocolRoute,
    RequestHost(host): RequestHost,
    Query(query): Query<CallbackQuery>,
    cookies: Cookies,
) -> Result<Response, AuthError> {
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or(AuthError::MissingAuthorizationCode)?;

    let redirect_uri = callback_uri(
        &state.config.server.external_scheme,
        &host,
        route.env,
        route.protocol,
    )?;

    let env = state.environments.get(route.env);
    let user = complete_token_flow(&state.provider, env, route.protocol, &code, &redirect_uri).await?;

    start_session(&state, &cookies, user)?;
    Ok(found("/profile"))
}

/// SAML POST-binding callback.
///
/// A response without an assertion sends the visitor back to the start page
/// with no session. A body that is not a readable form counts as a missing
/// `SAMLResponse`.
#[tracing::instrument(
    name = "callback.saml",
    skip(state, cookies, form),
    fields(env = %route.env, protocol = %route.protocol)
)]
pub async fn saml_callback(
    State(state): State<AppState>,
    route: ProtocolRoute,
    cookies: Cookies,
    form: Result<Form<SamlCallbackForm>, FormRejection>,
) -> Result<Response, AuthError> {
    let encoded = form
        .inspect_err(|e| tracing::debug!(error = %e, "Unreadable SAML callback body"))
        .ok()
        .and_then(|Form(form)| form.saml_response)
        .filter(|s| !s.trim().is_empty())
        .ok_or(AuthError::MissingSamlResponse)?;

    let xml = decode_saml_response(&encoded)
        .map_err(|e| AuthError::InvalidSamlResponse(e.to_string()))?;

    let saml = match extract_attributes(&xml) {
        Ok(saml) => saml,
        Err(e @ (SamlError::AssertionNotFound | SamlError::Xml(_))) => {
            tracing::warn!(error = %e, "No Assertion found in the SAML response");
            return Ok(found("/"));
        }
        Err(e) => return Err(AuthError::InvalidSamlResponse(e.to_string())),
    };

    tracing::info!(attributes = saml.attributes.len(), "SAML assertion accepted");
    start_session(&state, &cookies, saml.into())?;
    Ok(found("/profile"))
}

fn start_session(state: &AppState, cookies: &Cookies, user: UserData) -> Result<(), AuthError> {
    let config = &state.config.session;
    let artifact = SessionArtifact::new(user, Utc::now(), config.ttl_secs);
    store_session(cookies, config, &state.sessions, &artifact)
        .map_err(|e| AuthError::Internal(format!("failed to store session: {e}")))
}
