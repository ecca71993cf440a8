//! HTTP routes.
//!
//! - `/` - landing page
//! - `/idme/{env}` - environment page
//! - `/idme/{env}/{protocol}` - policy list
//! - `/idme/{env}/{protocol}/{policy}` - redirect to the provider
//! - `/callback/{env}/{protocol}` - GET (authorization code) and POST (SAML)
//! - `/profile` - verified attributes from the session cookies
//! - `/health` - liveness

pub mod authorize;
pub mod callback;
pub mod guards;
pub mod health;
pub mod pages;

use axum::{
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};

/// `302 Found` to `location`.
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}
