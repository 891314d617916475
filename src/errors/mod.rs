//! Error taxonomy and the consistent API response envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::models::auth::Notice;

/// Error detail in the API response envelope.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    /// Modal notice for the host to show, set on login failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}

/// Consistent JSON envelope for all API responses.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Wrap a successful result in the envelope.
    pub fn success(data: T) -> Json<Self> {
        Json(Self {
            data: Some(data),
            error: None,
        })
    }
}

/// Failure reported by the remote data service.
///
/// Cloneable so it can travel inside login results and refresh reports.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Malformed record: {0}")]
    Decode(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}

impl From<sqlx::Error> for ServiceError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => ServiceError::Unavailable(e.to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                ServiceError::Decode(e.to_string())
            }
            _ => ServiceError::Query(e.to_string()),
        }
    }
}

/// Login attempt rejected before any query was issued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("A login attempt is already in progress")]
    AttemptInFlight,
}

/// Dashboard lifecycle misuse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DashboardError {
    #[error("Dashboard is already active")]
    AlreadyActive,

    #[error("Dashboard has been deactivated")]
    Deactivated,
}

/// Application error type mapping to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// Credentials matched no admin record.
    #[error("Unauthorized: {}", .0.text)]
    Unauthorized(Notice),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The data service failed while serving a login.
    #[error("Upstream error: {0}")]
    Upstream(ServiceError, Notice),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredential(msg) => AppError::Validation(msg),
            AuthError::AttemptInFlight => AppError::Conflict(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, notice) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg, None),
            AppError::Unauthorized(notice) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                notice.text.to_string(),
                Some(notice),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg, None),
            AppError::Upstream(e, notice) => {
                tracing::error!(error = %e, "Remote data service error");
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_ERROR",
                    "Something went wrong.".to_string(),
                    Some(notice),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ApiResponse::<()> {
            data: None,
            error: Some(ApiError {
                code: code.to_string(),
                message,
                notice,
            }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::AuthResult;

    #[test]
    fn api_response_success() {
        let response = ApiResponse::success("hello");
        let json = serde_json::to_value(&response.0).unwrap();
        assert_eq!(json["data"], "hello");
        assert!(json["error"].is_null());
    }

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn login_rejection_carries_notice() {
        let (status, json) = body_json(AppError::Unauthorized(AuthResult::NoMatch.notice())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(json["data"].is_null());
        assert_eq!(json["error"]["code"], "UNAUTHORIZED");
        assert_eq!(json["error"]["message"], "Invalid username or password.");
        assert_eq!(json["error"]["notice"]["level"], "warning");
        assert_eq!(json["error"]["notice"]["title"], "Access Denied");
    }

    #[tokio::test]
    async fn upstream_failure_carries_error_notice() {
        let cause = ServiceError::Unavailable("connection refused".into());
        let notice = AuthResult::ServiceError(cause.clone()).notice();
        let (status, json) = body_json(AppError::Upstream(cause, notice)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["error"]["message"], "Something went wrong.");
        assert_eq!(json["error"]["notice"]["title"], "Error");
        assert_eq!(
            json["error"]["notice"]["text"],
            "Something went wrong during authentication."
        );
    }

    #[tokio::test]
    async fn other_errors_have_no_notice() {
        let (status, json) = body_json(AppError::Conflict("Dashboard is not active".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(json["error"].get("notice").is_none());
    }

    #[test]
    fn auth_error_maps_to_status() {
        let busy: AppError = AuthError::AttemptInFlight.into();
        assert_eq!(busy.into_response().status(), StatusCode::CONFLICT);

        let empty: AppError = AuthError::InvalidCredential("username is required".into()).into();
        assert_eq!(empty.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn service_error_from_sqlx() {
        let err: ServiceError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, ServiceError::Unavailable(_)));

        let err: ServiceError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, ServiceError::Query(_)));
    }

    #[test]
    fn app_error_display() {
        let err = AppError::Validation("password is required".to_string());
        assert_eq!(err.to_string(), "Validation error: password is required");
    }
}
