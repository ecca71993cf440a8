//! ID.me relying party.
//!
//! Demonstrates sign-in against ID.me with OAuth 2.0, OpenID Connect and SAML
//! in the `prod` and `sandbox` environments, and shows the verified
//! attributes on a profile page.

use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};
use tower_cookies::CookieManagerLayer;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

pub mod auth;
pub mod config;
pub mod middleware;
pub mod observability;
pub mod provider;
pub mod routes;
pub mod views;

#[cfg(test)]
mod tests;

use auth::{SessionCodec, SessionError};
use config::AppConfig;
use provider::{EnvironmentRegistry, ProviderClient};

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub environments: Arc<EnvironmentRegistry>,
    pub provider: ProviderClient,
    pub sessions: SessionCodec,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, StartupError> {
        let http = config
            .server
            .http_client
            .build_client()
            .map_err(StartupError::HttpClient)?;

        Ok(Self {
            environments: Arc::new(EnvironmentRegistry::from_config(&config.environments)),
            provider: ProviderClient::new(http),
            sessions: SessionCodec::from_config(&config.session)?,
            config: Arc::new(config),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(reqwest::Error),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Build the application router.
pub fn build_app(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;

    #[allow(unused_mut)]
    let mut app = Router::new()
        .route("/", get(routes::pages::index))
        .route("/health", get(routes::health::health_check))
        .route("/idme/{env}", get(routes::pages::environment))
        .route("/idme/{env}/{protocol}", get(routes::pages::policies))
        .route(
            "/idme/{env}/{protocol}/{policy}",
            get(routes::authorize::authorize),
        )
        .route(
            "/callback/{env}/{protocol}",
            get(routes::callback::token_callback).post(routes::callback::saml_callback),
        )
        .route("/profile", get(routes::pages::profile));

    #[cfg(feature = "server")]
    if let Some(dir) = &state.config.server.static_dir {
        app = app.fallback_service(tower_http::services::ServeDir::new(dir));
    }

    app.with_state(state)
        .layer(CookieManagerLayer::new())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(
            middleware::request_id_middleware,
        ))
}
