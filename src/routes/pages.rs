use axum::{
    extract::State,
    response::{Html, IntoResponse, Response},
};
use chrono::Utc;
use tower_cookies::Cookies;

use super::{
    found,
    guards::{EnvRoute, ProtocolRoute},
};
use crate::{
    AppState,
    auth::{AuthError, list_policies, load_session},
    views::{self, EnvPage, IndexPage, PoliciesPage, ProfilePage},
};

#[tracing::instrument(name = "pages.index")]
pub async fn index() -> Result<Html<String>, AuthError> {
    views::render(&IndexPage::new())
}

#[tracing::instrument(name = "pages.environment", fields(env = %route.env))]
pub async fn environment(route: EnvRoute) -> Result<Html<String>, AuthError> {
    views::render(&EnvPage::new(route.env))
}

/// List the policies of an environment. Fetched fresh on every request.
#[tracing::instrument(
    name = "pages.policies",
    skip(state),
    fields(env = %route.env, protocol = %route.protocol)
)]
pub async fn policies(
    State(state): State<AppState>,
    route: ProtocolRoute,
) -> Result<Html<String>, AuthError> {
    let env = state.environments.get(route.env);
    let policies = list_policies(&state.provider, env).await?;
    views::render(&PoliciesPage::new(route.env, route.protocol, policies))
}

/// Render the verified profile, or send the visitor back to the start page
/// when there is no live session.
#[tracing::instrument(name = "pages.profile", skip_all)]
pub async fn profile(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Response, AuthError> {
    let Some(artifact) = load_session(&cookies, &state.config.session, &state.sessions, Utc::now())
    else {
        tracing::debug!("No session, redirecting to start");
        return Ok(found("/"));
    };

    let page = ProfilePage {
        profile: views::present(&artifact),
    };
    Ok(views::render(&page)?.into_response())
}
