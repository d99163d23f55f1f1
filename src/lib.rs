pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod fallback;
pub mod generator;
pub mod pipeline;
pub mod quota;

use crate::config::Config;
use crate::db::Database;
use crate::generator::Generator;
use crate::pipeline::GenerationPipeline;
use crate::quota::QuotaTracker;

use std::sync::Arc;

/// Shared application state accessible from all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub generator: Arc<dyn Generator>,
    pub quota: Arc<QuotaTracker>,
    pub pipeline: Arc<GenerationPipeline>,
}
