use axum::{
    extract::{Query, State},
    response::Response,
};

use super::{
    found,
    guards::{PolicyRoute, RequestHost},
};
use crate::{
    AppState,
    auth::{AuthError, AuthorizationFlow, RedirectParams, build_redirect, callback_uri},
};

/// Redirect the browser to the provider's authorization endpoint.
///
/// `state`, `eid` and `groups` are forwarded without validation.
#[tracing::instrument(
    name = "authorize",
    skip(state, host, params),
    fields(env = %route.env, protocol = %route.protocol, policy = %route.policy)
)]
pub async fn authorize(
    State(state): State<AppState>,
    route: PolicyRoute,
    RequestHost(host): RequestHost,
    Query(params): Query<RedirectParams>,
) -> Result<Response, AuthError> {
    let env = state.environments.get(route.env);
    let redirect_uri = callback_uri(
        &state.config.server.external_scheme,
        &host,
        route.env,
        route.protocol,
    )?;

    let url = build_redirect(
        env,
        route.protocol,
        &route.policy,
        &params,
        &redirect_uri,
        &state.config.provider,
    )?;

    tracing::info!(
        flow = ?AuthorizationFlow::select(route.protocol, &route.policy),
        "Redirecting to identity provider"
    );
    Ok(found(url.as_str()))
}
