//! HTTP API for kb-server
//!
//! Responses use the `ApiResponse` envelope; errors are `AppError`.

pub mod applications;
pub mod auth;
pub mod health;
pub mod members;
pub mod notifications;
pub mod payments;
pub mod sweeps;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::{Router, middleware};
use shared::error::{ApiResponse, AppError};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::admin_auth_middleware;
use crate::state::AppState;

pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Public: health, admin login, membership applications from the website
    let public = Router::new()
        .route("/health", get(health::health_check))
        .route("/api/auth/login", post(auth::login))
        .route("/api/applications", post(applications::submit));

    let admin = Router::new()
        .route("/api/members", get(members::list).post(members::create))
        .route(
            "/api/members/{id}",
            get(members::get).put(members::update).delete(members::delete),
        )
        .route("/api/members/{id}/renew", post(members::renew))
        .route("/api/members/{id}/cancel", post(members::cancel))
        .route(
            "/api/members/{id}/payments",
            get(payments::list_for_member).post(payments::record),
        )
        .route("/api/applications", get(applications::list))
        .route("/api/applications/history", get(applications::history))
        .route(
            "/api/applications/{id}",
            get(applications::get).delete(applications::delete),
        )
        .route("/api/applications/{id}/accept", post(applications::accept))
        .route("/api/applications/{id}/reject", post(applications::reject))
        .route("/api/payments", get(payments::list))
        .route(
            "/api/payments/{id}",
            get(payments::get).delete(payments::delete),
        )
        .route("/api/payments/{id}/status", put(payments::update_status))
        .route("/api/notifications", get(notifications::list))
        .route(
            "/api/notifications/unread-count",
            get(notifications::unread_count),
        )
        .route("/api/notifications/read-all", post(notifications::mark_all_read))
        .route("/api/notifications/{id}/read", post(notifications::mark_read))
        .route("/api/admin/sweeps/run", post(sweeps::run))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ));

    Router::new()
        .merge(public)
        .merge(admin)
        .layer(DefaultBodyLimit::max(256 * 1024))
        .layer(ConcurrencyLimitLayer::new(100))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
