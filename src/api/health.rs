use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub generator: GeneratorStatus,
}

#[derive(Debug, Serialize)]
pub struct GeneratorStatus {
    pub id: String,
    pub healthy: bool,
}

/// GET /health
///
/// Returns service health plus the upstream generator's reachability. The
/// service itself stays "ok" even when the generator is down, since the
/// fallback strategies keep requests serviceable.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let healthy = state.generator.health_check().await;

    Json(HealthResponse {
        status: "ok".to_string(),
        generator: GeneratorStatus {
            id: state.generator.id().to_string(),
            healthy,
        },
    })
}
