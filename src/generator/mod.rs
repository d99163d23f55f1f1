//! Upstream generator module
//!
//! Defines the core Generator trait and error taxonomy, plus sub-modules for
//! the retry wrapper and the concrete HTTP client for the generation service.

pub mod http;
pub mod retry;
pub mod types;

use futures::future::BoxFuture;

use crate::generator::types::GenerationRequest;

// Re-exports for convenience.
pub use self::http::HttpGenerator;
pub use self::retry::{BackoffInvoker, InvokeError};

// ---------------------------------------------------------------------------
// GeneratorError
// ---------------------------------------------------------------------------

/// Errors that can occur when invoking an upstream generator.
///
/// Warm-up is a named condition distinct from a plain transient failure: the
/// upstream model exists and is loading, so the retry wrapper backs off more
/// generously before trying again.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("Generator warming up, ready in ~{eta_secs}s")]
    Warmup { eta_secs: u64 },

    #[error("Transient generator failure: {0}")]
    Transient(String),

    #[error("Fatal generator failure ({status}): {message}")]
    Fatal { status: u16, message: String },
}

impl GeneratorError {
    /// Fatal errors (malformed request, auth failure) are never retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }

    pub fn is_warmup(&self) -> bool {
        matches!(self, Self::Warmup { .. })
    }
}

// ---------------------------------------------------------------------------
// Generator trait
// ---------------------------------------------------------------------------

/// Trait implemented by upstream content generators.
///
/// Async methods return boxed futures so the trait is dyn-compatible (can be
/// used as `Arc<dyn Generator>`). No `async_trait` macro is needed.
pub trait Generator: Send + Sync {
    /// Unique identifier for this generator (e.g. "http", "scripted").
    fn id(&self) -> &str;

    /// Produce the raw payload for a request. For summaries and homework the
    /// payload is the content itself; for quizzes it is a JSON question list
    /// the pipeline parses and validates.
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> BoxFuture<'_, Result<String, GeneratorError>>;

    /// Lightweight health check (can we reach the service?).
    fn health_check(&self) -> BoxFuture<'_, bool>;
}
