//! Membership application endpoints

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use shared::error::ApiResponse;
use shared::models::{
    Application, ApplicationCreate, ApplicationHistory, ApplicationReject, Member,
};

use super::ApiResult;
use crate::db::ApplicationQuery;
use crate::state::AppState;

/// POST /api/applications (public)
pub async fn submit(
    State(state): State<AppState>,
    Json(payload): Json<ApplicationCreate>,
) -> ApiResult<Application> {
    let application = state.services.applications.submit(payload).await?;
    Ok(ApiResponse::success_with_message(
        "Application submitted",
        application,
    ))
}

/// GET /api/applications
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ApplicationQuery>,
) -> ApiResult<Vec<Application>> {
    Ok(ApiResponse::success(
        state.services.applications.list(&query).await?,
    ))
}

/// GET /api/applications/{id}
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Application> {
    Ok(ApiResponse::success(
        state.services.applications.get(&id).await?,
    ))
}

/// DELETE /api/applications/{id}
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.services.applications.delete(&id).await?;
    Ok(ApiResponse::ok("Application deleted"))
}

/// POST /api/applications/{id}/accept
pub async fn accept(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Member> {
    let member = state.services.applications.accept(&id).await?;
    Ok(ApiResponse::success_with_message("Application accepted", member))
}

/// POST /api/applications/{id}/reject
pub async fn reject(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<ApplicationReject>>,
) -> ApiResult<Application> {
    let reason = body.and_then(|Json(req)| req.reason);
    let application = state.services.applications.reject(&id, reason).await?;
    Ok(ApiResponse::success_with_message(
        "Application rejected",
        application,
    ))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub email: String,
}

/// GET /api/applications/history?email=
pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<ApplicationHistory>> {
    Ok(ApiResponse::success(
        state.services.applications.history(&query.email).await?,
    ))
}
