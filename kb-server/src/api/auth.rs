//! Admin login

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use shared::error::{ApiResponse, AppError, ErrorCode};
use shared::util::normalize_email;

use super::ApiResult;
use crate::auth::admin_auth::create_token;
use crate::state::AppState;
use crate::util::verify_password;

/// POST /api/auth/login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub email: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let email = normalize_email(&req.email);
    let admin = state
        .store
        .find_admin_by_email(&email)
        .await
        .map_err(|e| {
            tracing::error!("DB error during login: {e}");
            AppError::new(ErrorCode::InternalError)
        })?
        .ok_or_else(AppError::invalid_credentials)?;

    if !verify_password(&req.password, &admin.hashed_password) {
        tracing::info!(email = %email, "Admin login rejected");
        return Err(AppError::invalid_credentials());
    }

    let token = create_token(admin.id, &admin.email, &state.config.jwt_secret).map_err(|e| {
        tracing::error!("JWT creation failed: {e}");
        AppError::new(ErrorCode::InternalError)
    })?;
    tracing::info!(admin_id = admin.id, "Admin logged in");

    Ok(ApiResponse::success(LoginResponse {
        token,
        email: admin.email,
    }))
}
