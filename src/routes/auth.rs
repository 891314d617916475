//! Login routes: submit credentials, observe the login form state.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::errors::{ApiResponse, AppError};
use crate::models::auth::{AuthResult, LoginState, Notice};
use crate::models::credential::Credential;
use crate::models::user::AdminProfile;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub notice: Notice,
    pub redirect: &'static str,
    pub admin: AdminProfile,
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<Credential>,
) -> Result<Json<ApiResponse<LoginResponse>>, AppError> {
    let result = state.auth.attempt_login(body).await?;
    let notice = result.notice();
    let redirect = result.redirect();

    match (result, redirect) {
        (AuthResult::Match(record), Some(redirect)) => Ok(ApiResponse::success(LoginResponse {
            notice,
            redirect,
            admin: AdminProfile::from(record),
        })),
        (AuthResult::ServiceError(e), _) => Err(AppError::Upstream(e, notice)),
        _ => Err(AppError::Unauthorized(notice)),
    }
}

/// GET /api/v1/auth/status
pub async fn status(State(state): State<AppState>) -> Json<ApiResponse<LoginState>> {
    ApiResponse::success(state.auth.state())
}
