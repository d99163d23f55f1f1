//! Studyhall -- study-material generation service.
//!
//! This is the application entry point. It wires together all modules:
//!   - Configuration loading
//!   - Database initialization
//!   - Quota tracker + audit logger
//!   - Upstream generator client + retry wrapper
//!   - Generation pipeline
//!   - HTTP server with graceful shutdown on SIGTERM / SIGINT

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use studyhall::AppState;
use studyhall::api;
use studyhall::config::Config;
use studyhall::db::Database;
use studyhall::generator::http::{HttpGenerator, HttpGeneratorConfig};
use studyhall::generator::{BackoffInvoker, Generator};
use studyhall::pipeline::GenerationPipeline;
use studyhall::quota::{QuotaTracker, SqliteUsageStore, spawn_audit_logger};

// ---------------------------------------------------------------------------
// CLI argument parsing (minimal, no clap dependency)
// ---------------------------------------------------------------------------

struct CliArgs {
    config_path: PathBuf,
}

fn parse_args() -> CliArgs {
    let mut args = std::env::args().skip(1);
    let mut config_path = PathBuf::from("studyhall.toml");

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                if let Some(path) = args.next() {
                    config_path = PathBuf::from(path);
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("studyhall {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                eprintln!("Run with --help for usage information.");
                std::process::exit(1);
            }
        }
    }

    CliArgs { config_path }
}

fn print_usage() {
    println!(
        "\
studyhall {version} -- study-material generation service

USAGE:
    studyhall [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file [default: studyhall.toml]
    -h, --help             Print this help message
    -V, --version          Print version information

ENVIRONMENT:
    RUST_LOG               Override log level (e.g. RUST_LOG=debug)
    STUDYHALL_CONFIG       Alternative to --config flag
",
        version = env!("CARGO_PKG_VERSION")
    );
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Parse CLI arguments
    let cli = parse_args();

    // Allow STUDYHALL_CONFIG env var as alternative to --config flag
    let config_path = std::env::var("STUDYHALL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or(cli.config_path);

    // 2. Load configuration
    let config = Config::load(&config_path)?;

    // 3. Initialize tracing/logging
    init_tracing(&config);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        env_overrides = config.env_overrides.all().len(),
        "Starting studyhall"
    );

    // 4. Open database
    let db = Database::open(&config.database.path)?;
    tracing::info!(path = %config.database.path.display(), "Database opened");

    // 5. Create quota tracker over the SQLite usage store
    let store = Arc::new(SqliteUsageStore::new(db.clone()));
    let quota = Arc::new(QuotaTracker::new(store, &config.quota));
    tracing::info!(
        daily_cap = config.quota.daily_cap,
        reset_window_secs = config.quota.reset_window_secs,
        "Quota tracker initialized"
    );

    // 6. Create audit channel + spawn background logger
    let (audit_tx, audit_rx) = tokio::sync::mpsc::unbounded_channel();
    let _audit_handle = spawn_audit_logger(db.clone(), audit_rx);
    tracing::debug!("Audit logger spawned");

    // 7. Build the upstream generator client and retry wrapper
    let generator: Arc<dyn Generator> = Arc::new(HttpGenerator::new(&HttpGeneratorConfig {
        endpoint: config.generator.endpoint.clone(),
        timeout_secs: config.generator.timeout_secs,
    })?);
    let invoker = BackoffInvoker::new()
        .with_max_attempts(config.generator.max_attempts)
        .with_base_delay(config.generator.base_delay());
    tracing::info!(
        endpoint = %config.generator.endpoint,
        max_attempts = config.generator.max_attempts,
        "Generator client initialized"
    );

    // 8. Assemble the pipeline
    let pipeline = Arc::new(GenerationPipeline::new(
        generator.clone(),
        quota.clone(),
        invoker,
        audit_tx,
    ));

    // 9. Build shared application state
    let state = AppState {
        config: Arc::new(config.clone()),
        db: db.clone(),
        generator,
        quota,
        pipeline,
    };

    // 10. Build the router
    let app = build_app(state);

    // 11. Bind and serve
    let listen_addr = config.listen_addr();
    let listener = TcpListener::bind(&listen_addr).await?;
    tracing::info!(addr = %listen_addr, "Listening");

    println!();
    println!("  studyhall v{} is running", env!("CARGO_PKG_VERSION"));
    println!("  API:    http://{listen_addr}/v1/");
    println!("  Health: http://{listen_addr}/health");
    println!();

    // 12. Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 13. Cleanup
    tracing::info!("Shutting down gracefully");
    // The pipeline (and with it the audit sender) is dropped here, which
    // causes the audit logger to drain remaining entries and exit.

    Ok(())
}

// ---------------------------------------------------------------------------
// Router assembly
// ---------------------------------------------------------------------------

/// Build the application router with all middleware layers.
fn build_app(state: AppState) -> Router {
    let config = &state.config;

    // -- CORS layer -----------------------------------------------------------
    let cors = build_cors_layer(config);

    // -- Request ID layer (X-Request-ID) --------------------------------------
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // -- Tracing layer --------------------------------------------------------
    let trace = TraceLayer::new_for_http();

    api::build_api_router()
        .layer(propagate_id)
        .layer(request_id)
        .layer(trace)
        .layer(cors)
        .with_state(state)
}

/// Build the CORS layer from config.
fn build_cors_layer(config: &Config) -> CorsLayer {
    if config.server.cors_origins.is_empty() {
        // Default: allow all origins for development convenience
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .server
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

// ---------------------------------------------------------------------------
// Tracing initialization
// ---------------------------------------------------------------------------

/// Set up the tracing subscriber based on configuration.
fn init_tracing(config: &Config) {
    // RUST_LOG env var takes precedence over config file
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.logging.level;
        // Set studyhall crate to the configured level, dependencies to warn
        EnvFilter::new(format!("studyhall={level},tower_http={level},warn"))
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

// ---------------------------------------------------------------------------
// Graceful shutdown
// ---------------------------------------------------------------------------

/// Wait for a shutdown signal (SIGTERM or SIGINT / Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl+C)");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
