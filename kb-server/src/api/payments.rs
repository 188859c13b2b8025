//! Payment endpoints

use axum::Json;
use axum::extract::{Path, Query, State};
use shared::error::ApiResponse;
use shared::models::{Payment, PaymentCreate, PaymentStatusUpdate};

use super::ApiResult;
use crate::db::PaymentQuery;
use crate::state::AppState;

/// POST /api/members/{id}/payments
pub async fn record(
    State(state): State<AppState>,
    Path(member_id): Path<String>,
    Json(payload): Json<PaymentCreate>,
) -> ApiResult<Payment> {
    let payment = state.services.payments.record(&member_id, payload).await?;
    Ok(ApiResponse::success_with_message("Payment recorded", payment))
}

/// GET /api/members/{id}/payments
pub async fn list_for_member(
    State(state): State<AppState>,
    Path(member_id): Path<String>,
) -> ApiResult<Vec<Payment>> {
    Ok(ApiResponse::success(
        state.services.payments.list_for_member(&member_id).await?,
    ))
}

/// GET /api/payments
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PaymentQuery>,
) -> ApiResult<Vec<Payment>> {
    Ok(ApiResponse::success(
        state.services.payments.list(&query).await?,
    ))
}

/// GET /api/payments/{id}
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Payment> {
    Ok(ApiResponse::success(state.services.payments.get(&id).await?))
}

/// PUT /api/payments/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<PaymentStatusUpdate>,
) -> ApiResult<Payment> {
    Ok(ApiResponse::success(
        state
            .services
            .payments
            .update_status(&id, payload.status)
            .await?,
    ))
}

/// DELETE /api/payments/{id}
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.services.payments.delete(&id).await?;
    Ok(ApiResponse::ok("Payment deleted"))
}
