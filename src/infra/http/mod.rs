//! HTTP surface of the service.

mod auth;
mod error;
mod handlers;
mod middleware;

pub use error::{ApiError, ApiErrorBody, ApiErrorMessage, codes};
pub use middleware::RequestId;

use std::sync::Arc;

use axum::{Router, middleware as axum_middleware, routing::get};

use crate::application::auth::JwtAuthenticator;
use crate::application::healthcheck::HealthcheckService;
use crate::application::users::UserService;
use crate::domain::types::{ApiVersion, Role};

use middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub auth: Arc<JwtAuthenticator>,
    pub allowed_roles: Arc<[Role]>,
    pub healthcheck: Arc<HealthcheckService>,
    pub users: Option<Arc<UserService>>,
}

/// Prefix `path` with the API version, e.g. `/healthcheck` becomes
/// `/api/v1/healthcheck`.
pub fn versioned_route(path: &str, version: ApiVersion) -> String {
    let path = path.trim_start_matches('/');
    format!("/api/{}/{path}", version.as_str())
}

pub fn build_router(state: HttpState) -> Router {
    let auth_state = state.clone();

    Router::new()
        .route(
            &versioned_route("/healthcheck", ApiVersion::V1),
            get(handlers::healthcheck),
        )
        .route(
            &versioned_route("/users", ApiVersion::V1),
            get(handlers::list_users),
        )
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth::require_roles,
        ))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
