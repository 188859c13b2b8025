//! Manual sweep trigger

use axum::Extension;
use axum::extract::State;
use shared::error::ApiResponse;

use super::ApiResult;
use crate::auth::AdminIdentity;
use crate::scheduler::SweepReport;
use crate::state::AppState;

/// POST /api/admin/sweeps/run
///
/// Runs every reminder job once, synchronously, as of the current time.
pub async fn run(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
) -> ApiResult<Vec<SweepReport>> {
    tracing::info!(admin = %admin.email, "Manual sweep run requested");
    let reports = state.sweeps.run_all(state.clock.now()).await;
    Ok(ApiResponse::success(reports))
}
