use std::str::FromStr;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::application::healthcheck::HealthStatus;
use crate::application::lifecycle::ensure_initialized;
use crate::application::users::ListUsersRequest;
use crate::domain::types::{Role, SortOrder};

use super::HttpState;
use super::error::ApiError;

pub async fn healthcheck(State(state): State<HttpState>) -> Response {
    let report = state.healthcheck.healthcheck().await;
    let status = match report.status {
        HealthStatus::Ok => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(report)).into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub role: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl UserListQuery {
    fn into_request(self) -> Result<ListUsersRequest, ApiError> {
        let role = self
            .role
            .as_deref()
            .map(Role::from_str)
            .transpose()
            .map_err(ApiError::from)?;
        let sort_order = self
            .sort_order
            .as_deref()
            .map(SortOrder::from_str)
            .transpose()
            .map_err(ApiError::from)?
            .unwrap_or_default();

        Ok(ListUsersRequest {
            page: self.page,
            limit: self.limit,
            role,
            sort_by: self.sort_by,
            sort_order,
        })
    }
}

pub async fn list_users(
    State(state): State<HttpState>,
    Query(query): Query<UserListQuery>,
) -> Result<Response, ApiError> {
    let users = ensure_initialized(state.users.clone(), "users")?;
    let request = query.into_request()?;
    let page = users.list_users(&request).await?;
    Ok(Json(page).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_parses_role_and_order() {
        let query = UserListQuery {
            role: Some("admin".to_string()),
            sort_order: Some("DESC".to_string()),
            ..UserListQuery::default()
        };
        let request = query.into_request().unwrap();
        assert_eq!(request.role, Some(Role::Admin));
        assert_eq!(request.sort_order, SortOrder::Desc);
    }

    #[test]
    fn unknown_role_is_a_bad_request() {
        let query = UserListQuery {
            role: Some("root".to_string()),
            ..UserListQuery::default()
        };
        let err = query.into_request().unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
