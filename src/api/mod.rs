pub mod generate;
pub mod health;
pub mod usage;

use axum::Router;
use axum::routing::{get, post};

use crate::AppState;

/// Build the full API router.
///
/// Route layout:
/// ```text
/// /health                  GET
/// /v1/generate             POST
/// /v1/usage/{identity}     GET
/// ```
pub fn build_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/v1/generate", post(generate::generate))
        .route("/v1/usage/{identity}", get(usage::get_usage))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_api_router_creates_router() {
        // Smoke test: ensure the router builds without panicking.
        let _router: Router<AppState> = build_api_router();
    }
}
