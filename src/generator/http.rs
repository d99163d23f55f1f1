//! HTTP client for the upstream generation service.
//!
//! The wire format is modeled only as far as the pipeline needs: a success
//! payload, a warm-up signal while the model loads, transient failures worth
//! retrying, and fatal rejections that are not.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;
use url::Url;

use crate::generator::types::GenerationRequest;
use crate::generator::{Generator, GeneratorError};

/// Warm-up ETA reported when the service signals loading without an estimate.
const DEFAULT_WARMUP_ETA_SECS: u64 = 20;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the HTTP generator client.
#[derive(Debug, Clone)]
pub struct HttpGeneratorConfig {
    /// Base URL of the generation service (e.g. `http://127.0.0.1:8601`).
    pub endpoint: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, serde::Deserialize)]
struct GenerateResponse {
    content: String,
}

/// Body shape the service returns while the model is loading.
#[derive(Debug, Default, serde::Deserialize)]
struct ServiceErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    estimated_time: Option<f64>,
}

// ---------------------------------------------------------------------------
// HttpGenerator
// ---------------------------------------------------------------------------

/// [`Generator`] implementation over the generation service HTTP API.
pub struct HttpGenerator {
    client: Client,
    generate_url: Url,
    health_url: Url,
}

impl HttpGenerator {
    pub fn new(config: &HttpGeneratorConfig) -> anyhow::Result<Self> {
        let base = Url::parse(config.endpoint.trim_end_matches('/'))
            .map_err(|e| anyhow::anyhow!("Invalid generator endpoint: {e}"))?;
        let generate_url = base.join("/v1/generate")?;
        let health_url = base.join("/health")?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {e}"))?;

        Ok(Self {
            client,
            generate_url,
            health_url,
        })
    }
}

impl Generator for HttpGenerator {
    fn id(&self) -> &str {
        "http"
    }

    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> BoxFuture<'_, Result<String, GeneratorError>> {
        let body = build_request_body(request);

        Box::pin(async move {
            let resp = self
                .client
                .post(self.generate_url.clone())
                .json(&body)
                .send()
                .await
                .map_err(map_transport_error)?;

            let status = resp.status();
            if status.is_success() {
                let parsed: GenerateResponse = resp.json().await.map_err(|e| {
                    GeneratorError::Transient(format!("Invalid response body: {e}"))
                })?;
                return Ok(parsed.content);
            }

            let status = status.as_u16();
            let body = resp.text().await.unwrap_or_default();
            Err(classify_status(status, &body))
        })
    }

    fn health_check(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            match self.client.get(self.health_url.clone()).send().await {
                Ok(resp) => resp.status().is_success(),
                Err(_) => false,
            }
        })
    }
}

/// Build the request body for the generation service.
fn build_request_body(request: &GenerationRequest) -> serde_json::Value {
    serde_json::json!({
        "kind": request.kind,
        "text": request.raw_text,
        "difficulty": request.difficulty,
        "subject": request.subject,
    })
}

/// Network-level failures are worth retrying.
fn map_transport_error(err: reqwest::Error) -> GeneratorError {
    GeneratorError::Transient(err.to_string())
}

/// Map a non-success HTTP status (plus body) onto the error taxonomy.
///
/// 503 with a model-loading body is the warm-up signal; other 5xx, 429 and
/// 408 are plain transient failures; remaining 4xx are fatal.
fn classify_status(status: u16, body: &str) -> GeneratorError {
    let parsed: ServiceErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .error
        .clone()
        .unwrap_or_else(|| truncate(body, 200).to_string());

    if status == 503 {
        if let Some(eta) = parsed.estimated_time {
            return GeneratorError::Warmup {
                eta_secs: eta.ceil() as u64,
            };
        }
        let lowered = message.to_lowercase();
        if lowered.contains("loading") || lowered.contains("warming") {
            return GeneratorError::Warmup {
                eta_secs: DEFAULT_WARMUP_ETA_SECS,
            };
        }
    }

    match status {
        408 | 429 | 500..=599 => {
            GeneratorError::Transient(format!("Upstream returned {status}: {message}"))
        }
        _ => GeneratorError::Fatal { status, message },
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
