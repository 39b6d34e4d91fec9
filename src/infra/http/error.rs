use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::auth::AuthError;
use crate::application::error::{AppError, ErrorReport};
use crate::application::repos::RepoError;
use crate::domain::error::DomainError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const EXPIRED: &str = "expired";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_FOUND: &str = "not_found";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const UNKNOWN_FIELD: &str = "unknown_field";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const REPO: &str = "repo_error";
    pub const UNAVAILABLE: &str = "unavailable";
    pub const INTERNAL: &str = "internal_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    report: Option<ErrorReport>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
            report: None,
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "Bearer token required",
            None,
        )
    }

    pub fn forbidden() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            codes::FORBIDDEN,
            "Role may not access this resource",
            None,
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    fn with_report(mut self, report: ErrorReport) -> Self {
        self.report = Some(report);
        self
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Missing => ApiError::unauthorized(),
            AuthError::Expired => ApiError::new(
                StatusCode::UNAUTHORIZED,
                codes::EXPIRED,
                "Token expired",
                None,
            ),
            AuthError::InvalidSignature | AuthError::Malformed => ApiError::new(
                StatusCode::UNAUTHORIZED,
                codes::UNAUTHORIZED,
                "Invalid bearer token",
                None,
            ),
            AuthError::Forbidden { role } => {
                ApiError::forbidden().with_report(ErrorReport::from_message(
                    "infra::http::auth",
                    StatusCode::FORBIDDEN,
                    format!("role `{role}` refused"),
                ))
            }
            AuthError::Signing => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::INTERNAL,
                "Unexpected error occurred",
                None,
            ),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let status = err.status_code();
        let code = match &err {
            AppError::Repo(RepoError::NotFound) => codes::NOT_FOUND,
            AppError::Repo(RepoError::UnknownField { .. }) => codes::UNKNOWN_FIELD,
            AppError::Repo(RepoError::InvalidInput { .. }) | AppError::Domain(_) => {
                codes::INVALID_INPUT
            }
            AppError::Repo(RepoError::Timeout) => codes::DB_TIMEOUT,
            AppError::Repo(_) => codes::REPO,
            AppError::NotInitialized { .. } => codes::UNAVAILABLE,
            AppError::Infra(_) | AppError::Registry(_) | AppError::Unexpected(_) => {
                codes::INTERNAL
            }
        };
        // Only client errors echo their cause; server-side detail stays in the log.
        let hint = status.is_client_error().then(|| err.to_string());
        let report = ErrorReport::from_error("infra::http::api", status, &err);
        ApiError::new(status, code, err.presentation_message(), hint).with_report(report)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::from(AppError::from(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = self.report.unwrap_or_else(|| {
            ErrorReport::from_message(
                "infra::http::api",
                self.status,
                format!(
                    "{}: {}",
                    self.code,
                    self.hint.as_deref().unwrap_or(self.message)
                ),
            )
        });
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        report.attach(&mut response);
        response
    }
}
