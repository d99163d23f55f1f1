//! Retry wrapper for upstream generator calls.
//!
//! One generic invoker owns the retry/backoff policy for every generation
//! kind; call sites inject the actual call as a closure instead of repeating
//! ad hoc retry loops.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::generator::GeneratorError;

// MARK: - Constants

/// Default attempt budget (initial call included).
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay unit for backoff.
const DEFAULT_BASE_DELAY_MS: u64 = 500;

/// Warm-up failures back off twice as hard as plain transient failures.
const WARMUP_MULTIPLIER: u32 = 2;

// MARK: - Errors

/// Terminal outcome of an invocation that produced no result.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    /// Every attempt in the budget failed transiently. Never converted into a
    /// silent default value; the caller decides what replaces the result.
    #[error("Invocation exhausted after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: GeneratorError,
    },

    /// The generator rejected the request outright; retrying cannot help.
    #[error("Fatal generator error: {0}")]
    Fatal(#[source] GeneratorError),
}

// MARK: - BackoffInvoker

/// Resilient-call wrapper around any generator invocation.
///
/// Both transient failure kinds share one attempt counter; they differ only
/// in the backoff slept before the next attempt. After a failed attempt `n`
/// (1-based), a warm-up failure sleeps `n * 2 * base_delay` and a generic
/// transient failure sleeps `n * base_delay`, so total wall-clock cost is
/// bounded by `sum(n * 2 * base_delay)` over the attempt budget.
///
/// Cancellation: the invocation is an ordinary future. Dropping it stops any
/// further attempts; quota already charged by the caller is not rolled back.
#[derive(Debug, Clone)]
pub struct BackoffInvoker {
    max_attempts: u32,
    base_delay: Duration,
}

impl BackoffInvoker {
    pub fn new() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
        }
    }

    /// Set the attempt budget (clamped to at least 1).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the base delay unit.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Backoff slept after attempt `attempt` (1-based) failed with `error`.
    pub fn backoff_for(&self, error: &GeneratorError, attempt: u32) -> Duration {
        let multiplier = if error.is_warmup() { WARMUP_MULTIPLIER } else { 1 };
        self.base_delay * attempt * multiplier
    }

    /// Run `call` until it succeeds, fails fatally, or the attempt budget is
    /// spent.
    pub async fn invoke<F, Fut, T>(&self, mut call: F) -> Result<T, InvokeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GeneratorError>>,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match call().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!(attempt, "Generator call succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(error) if error.is_fatal() => {
                    warn!(attempt, error = %error, "Fatal generator error, not retrying");
                    return Err(InvokeError::Fatal(error));
                }
                Err(error) => {
                    if attempt >= self.max_attempts {
                        warn!(
                            attempt,
                            max_attempts = self.max_attempts,
                            error = %error,
                            "Generator attempts exhausted"
                        );
                        return Err(InvokeError::Exhausted {
                            attempts: attempt,
                            last: error,
                        });
                    }

                    let backoff = self.backoff_for(&error, attempt);
                    warn!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %error,
                        "Generator call failed, retrying after backoff"
                    );

                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

impl Default for BackoffInvoker {
    fn default() -> Self {
        Self::new()
    }
}

// MARK: - Tests
