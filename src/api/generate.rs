use axum::Json;
use axum::extract::State;
use serde::Deserialize;

use crate::AppState;
use crate::error::AppError;
use crate::generator::types::{ContentKind, Difficulty, GenerationRequest, Subject};
use crate::pipeline::GenerationReply;

/// Request body for `POST /v1/generate`.
///
/// `identity` and `premium` come from collaborators outside this core (the
/// session layer and the subscription state); the API takes them as plain
/// fields rather than deriving them itself.
#[derive(Debug, Deserialize)]
pub struct GenerateApiRequest {
    pub identity: String,
    #[serde(default)]
    pub premium: bool,
    pub kind: ContentKind,
    pub text: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub subject: Subject,
}

/// POST /v1/generate
///
/// Runs the generation pipeline. A denied quota is a 200 response with
/// `decision.allowed = false` and no outcome, so the caller can render a
/// countdown; only invalid input produces an error status.
pub async fn generate(
    State(state): State<AppState>,
    Json(body): Json<GenerateApiRequest>,
) -> Result<Json<GenerationReply>, AppError> {
    if body.identity.trim().is_empty() {
        return Err(AppError::BadRequest("Identity must not be empty".into()));
    }

    let request = GenerationRequest {
        kind: body.kind,
        raw_text: body.text,
        difficulty: body.difficulty,
        subject: body.subject,
    };

    let reply = state
        .pipeline
        .request_generation(&body.identity, body.premium, request)
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    Ok(Json(reply))
}
