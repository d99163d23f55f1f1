//! Generation pipeline
//!
//! Orchestrates one request: quota gate, primary invocation through the
//! retry wrapper, result validation, deterministic fallback, audit record.
//! A request moves through quota check, then either denial (terminal) or
//! invocation, then primary acceptance or fallback, then done.
//!
//! The external contract never surfaces upstream flakiness: the only
//! user-visible failures are quota denial (returned as a decision value, not
//! an error) and empty-input rejection. Everything else resolves to content.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::fallback;
use crate::generator::types::{
    ContentKind, GeneratedContent, GenerationOutcome, GenerationRequest, OutcomeSource,
    QuizQuestion,
};
use crate::generator::{BackoffInvoker, Generator};
use crate::quota::{AuditEntry, QuotaDecision, QuotaTracker};

/// Reply for one pipeline invocation. `outcome` is `None` exactly when the
/// quota denied the request; the decision then carries the countdown.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReply {
    pub decision: QuotaDecision,
    pub outcome: Option<GenerationOutcome>,
}

/// The only error the pipeline raises to callers.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Input text is empty")]
    EmptyInput,
}

pub struct GenerationPipeline {
    generator: Arc<dyn Generator>,
    quota: Arc<QuotaTracker>,
    invoker: BackoffInvoker,
    audit_tx: mpsc::UnboundedSender<AuditEntry>,
}

impl GenerationPipeline {
    pub fn new(
        generator: Arc<dyn Generator>,
        quota: Arc<QuotaTracker>,
        invoker: BackoffInvoker,
        audit_tx: mpsc::UnboundedSender<AuditEntry>,
    ) -> Self {
        Self {
            generator,
            quota,
            invoker,
            audit_tx,
        }
    }

    /// Run one generation request end to end.
    ///
    /// Usage is charged at check time, before the generator runs; a request
    /// that subsequently falls back or is abandoned by the caller stays
    /// charged.
    pub async fn request_generation(
        &self,
        identity: &str,
        premium: bool,
        request: GenerationRequest,
    ) -> Result<GenerationReply, PipelineError> {
        if request.raw_text.trim().is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let request_id = Uuid::new_v4().to_string();
        let start = Instant::now();

        tracing::info!(
            request_id = %request_id,
            identity = %identity,
            kind = %request.kind,
            premium,
            "Generation request"
        );

        let decision = match self.quota.check_and_consume(identity, premium) {
            Ok(decision) => decision,
            Err(e) => {
                // Fail closed: an unreachable store denies rather than
                // allowing unmetered use.
                tracing::error!(error = %e, identity = %identity, "Usage store unreachable, denying request");
                QuotaDecision {
                    allowed: false,
                    remaining: 0,
                    time_until_reset: Duration::ZERO,
                }
            }
        };

        if !decision.allowed {
            self.audit(identity, &request_id, request.kind, None, start);
            return Ok(GenerationReply {
                decision,
                outcome: None,
            });
        }

        let (content, source) = match self.invoker.invoke(|| self.generator.generate(&request)).await
        {
            Ok(payload) => match parse_primary(&request, &payload) {
                Some(content) => (content, OutcomeSource::Primary),
                None => {
                    tracing::warn!(
                        request_id = %request_id,
                        kind = %request.kind,
                        "Primary result unusable, using fallback"
                    );
                    (fallback::generate(&request), OutcomeSource::Fallback)
                }
            },
            Err(e) => {
                tracing::warn!(
                    request_id = %request_id,
                    error = %e,
                    "Primary generator unavailable, using fallback"
                );
                (fallback::generate(&request), OutcomeSource::Fallback)
            }
        };

        self.audit(identity, &request_id, request.kind, Some(source), start);

        tracing::info!(
            request_id = %request_id,
            source = %source,
            latency_ms = start.elapsed().as_millis() as u64,
            "Generation complete"
        );

        Ok(GenerationReply {
            decision,
            outcome: Some(GenerationOutcome { content, source }),
        })
    }

    fn audit(
        &self,
        identity: &str,
        request_id: &str,
        kind: ContentKind,
        source: Option<OutcomeSource>,
        start: Instant,
    ) {
        let entry = AuditEntry {
            identity: identity.to_string(),
            request_id: request_id.to_string(),
            kind: kind.to_string(),
            source: source.map(|s| s.to_string()).unwrap_or_else(|| "none".to_string()),
            latency_ms: start.elapsed().as_millis() as u64,
            status: if source.is_some() { "success" } else { "denied" }.to_string(),
        };
        // A full or closed channel only loses an audit row, never a request.
        let _ = self.audit_tx.send(entry);
    }
}

/// Validate and parse a primary payload into final content.
///
/// Quizzes must parse as a JSON question list with at least one well-formed
/// question; acceptance is all-or-nothing (a partially valid quiz is replaced
/// entirely by the fallback, never merged). Text kinds only need a non-blank
/// payload.
fn parse_primary(request: &GenerationRequest, payload: &str) -> Option<GeneratedContent> {
    match request.kind {
        ContentKind::Summary | ContentKind::Homework => {
            let trimmed = payload.trim();
            (!trimmed.is_empty()).then(|| GeneratedContent::Text(trimmed.to_string()))
        }
        ContentKind::Quiz => {
            let questions: Vec<QuizQuestion> = serde_json::from_str(payload).ok()?;
            (!questions.is_empty() && questions.iter().all(QuizQuestion::is_well_formed))
                .then_some(GeneratedContent::Quiz(questions))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
