//! Member endpoints

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use shared::error::ApiResponse;
use shared::models::{Member, MemberCreate, MemberUpdate, MembershipRenewal};

use super::ApiResult;
use crate::db::MemberQuery;
use crate::state::AppState;

/// GET /api/members
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<MemberQuery>,
) -> ApiResult<Vec<Member>> {
    Ok(ApiResponse::success(state.services.members.list(&query).await?))
}

/// POST /api/members
pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<MemberCreate>,
) -> ApiResult<Member> {
    let member = state.services.members.create_member(payload).await?;
    Ok(ApiResponse::success_with_message("Member created", member))
}

/// GET /api/members/{id}
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Member> {
    Ok(ApiResponse::success(state.services.members.get(&id).await?))
}

/// PUT /api/members/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<MemberUpdate>,
) -> ApiResult<Member> {
    Ok(ApiResponse::success(
        state.services.members.update(&id, payload).await?,
    ))
}

/// DELETE /api/members/{id}
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.services.members.delete(&id).await?;
    Ok(ApiResponse::ok("Member deleted"))
}

/// POST /api/members/{id}/renew
pub async fn renew(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<MembershipRenewal>,
) -> ApiResult<Member> {
    let member = state.services.members.renew(&id, payload).await?;
    Ok(ApiResponse::success_with_message("Membership renewed", member))
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

/// POST /api/members/{id}/cancel
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<CancelRequest>>,
) -> ApiResult<Member> {
    let reason = body.and_then(|Json(req)| req.reason);
    let member = state.services.members.cancel(&id, reason).await?;
    Ok(ApiResponse::success_with_message("Membership cancelled", member))
}
