//! Staff notification endpoints

use axum::extract::{Path, Query, State};
use serde_json::{Value, json};
use shared::error::ApiResponse;
use shared::models::{Notification, NotificationQuery};

use super::ApiResult;
use crate::state::AppState;

/// GET /api/notifications
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Vec<Notification>> {
    Ok(ApiResponse::success(
        state.services.notifications.list(&query).await?,
    ))
}

/// POST /api/notifications/{id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Notification> {
    Ok(ApiResponse::success(
        state.services.notifications.mark_read(id).await?,
    ))
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(State(state): State<AppState>) -> ApiResult<Value> {
    let updated = state.services.notifications.mark_all_read().await?;
    Ok(ApiResponse::success(json!({ "updated": updated })))
}

/// GET /api/notifications/unread-count
pub async fn unread_count(State(state): State<AppState>) -> ApiResult<Value> {
    let count = state.services.notifications.unread_count().await?;
    Ok(ApiResponse::success(json!({ "count": count })))
}
