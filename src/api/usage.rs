use axum::Json;
use axum::extract::{Path, State};

use crate::AppState;
use crate::error::AppError;
use crate::quota::QuotaDecision;

/// GET /v1/usage/{identity}
///
/// Non-consuming quota evaluation, for rendering remaining requests and the
/// reset countdown without spending a slot.
pub async fn get_usage(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<QuotaDecision>, AppError> {
    let decision = state.quota.peek(&identity)?;
    Ok(Json(decision))
}
