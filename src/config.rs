use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Environment override tracking
// ---------------------------------------------------------------------------

/// Tracks which configuration settings are overridden by environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    overrides: HashMap<String, String>,
}

impl EnvOverrides {
    /// Check whether a setting key (e.g. "server.host") is overridden by an env var.
    pub fn is_overridden(&self, key: &str) -> bool {
        self.overrides.contains_key(key)
    }

    /// Get the env var name that overrides the given setting key.
    pub fn env_var_for(&self, key: &str) -> Option<&str> {
        self.overrides.get(key).map(String::as_str)
    }

    /// Get all overrides as a map of setting key -> env var name.
    pub fn all(&self) -> &HashMap<String, String> {
        &self.overrides
    }

    fn record(&mut self, key: &str, env_var: &str) {
        self.overrides.insert(key.to_string(), env_var.to_string());
    }
}

// ---------------------------------------------------------------------------
// Main configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Env var overrides are not serialized to TOML.
    #[serde(skip)]
    pub env_overrides: EnvOverrides,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Daily usage quota settings.
///
/// The cap and reset window are injected everywhere they are needed so tests
/// can run with compressed windows; they are never read as literals elsewhere.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuotaConfig {
    /// Requests per identity per day before denial.
    #[serde(default = "default_daily_cap")]
    pub daily_cap: u32,
    /// Rolling window after which the accumulated count is cleared.
    #[serde(default = "default_reset_window_secs")]
    pub reset_window_secs: u64,
}

impl QuotaConfig {
    pub fn reset_window(&self) -> Duration {
        Duration::from_secs(self.reset_window_secs)
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_cap: default_daily_cap(),
            reset_window_secs: default_reset_window_secs(),
        }
    }
}

/// Upstream generation service settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneratorConfig {
    /// Base URL of the generation service.
    #[serde(default = "default_generator_endpoint")]
    pub endpoint: String,
    /// Per-request timeout.
    #[serde(default = "default_generator_timeout_secs")]
    pub timeout_secs: u64,
    /// Attempt budget for the retry wrapper.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay unit for backoff between attempts.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl GeneratorConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_generator_endpoint(),
            timeout_secs: default_generator_timeout_secs(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "127.0.0.1".to_string()
}
const fn default_port() -> u16 {
    8420
}
fn default_db_path() -> PathBuf {
    PathBuf::from("studyhall.db")
}
const fn default_daily_cap() -> u32 {
    15
}
const fn default_reset_window_secs() -> u64 {
    6 * 60 * 60
}
fn default_generator_endpoint() -> String {
    "http://127.0.0.1:8601".to_string()
}
const fn default_generator_timeout_secs() -> u64 {
    30
}
const fn default_max_attempts() -> u32 {
    3
}
const fn default_base_delay_ms() -> u64 {
    500
}
fn default_log_level() -> String {
    "info".to_string()
}

// ---------------------------------------------------------------------------
// Config loading and env overrides
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a TOML file, then apply environment variable
    /// overrides. Any setting prefixed with `STUDYHALL_` takes precedence over
    /// the file value and is tracked in `env_overrides`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            config
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Apply environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        let mut ov = EnvOverrides::default();

        // -- Helpers (macros for concise per-field overrides) --

        macro_rules! env_str {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = val;
                    ov.record($key, $env);
                }
            };
        }
        macro_rules! env_bool {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
                    ov.record($key, $env);
                }
            };
        }
        macro_rules! env_parse {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    if let Ok(parsed) = val.parse() {
                        $field = parsed;
                        ov.record($key, $env);
                    }
                }
            };
        }
        macro_rules! env_path {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = PathBuf::from(val);
                    ov.record($key, $env);
                }
            };
        }

        // -- Server --
        env_str!("server.host", "STUDYHALL_SERVER_HOST", self.server.host);
        env_parse!("server.port", "STUDYHALL_SERVER_PORT", self.server.port);
        if let Ok(val) = std::env::var("STUDYHALL_SERVER_CORS_ORIGINS") {
            self.server.cors_origins = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            ov.record("server.cors_origins", "STUDYHALL_SERVER_CORS_ORIGINS");
        }

        // -- Database --
        env_path!("database.path", "STUDYHALL_DATABASE_PATH", self.database.path);

        // -- Quota --
        env_parse!("quota.daily_cap", "STUDYHALL_QUOTA_DAILY_CAP", self.quota.daily_cap);
        env_parse!(
            "quota.reset_window_secs",
            "STUDYHALL_QUOTA_RESET_WINDOW_SECS",
            self.quota.reset_window_secs
        );

        // -- Generator --
        env_str!(
            "generator.endpoint",
            "STUDYHALL_GENERATOR_ENDPOINT",
            self.generator.endpoint
        );
        env_parse!(
            "generator.timeout_secs",
            "STUDYHALL_GENERATOR_TIMEOUT_SECS",
            self.generator.timeout_secs
        );
        env_parse!(
            "generator.max_attempts",
            "STUDYHALL_GENERATOR_MAX_ATTEMPTS",
            self.generator.max_attempts
        );
        env_parse!(
            "generator.base_delay_ms",
            "STUDYHALL_GENERATOR_BASE_DELAY_MS",
            self.generator.base_delay_ms
        );

        // -- Logging --
        env_str!("logging.level", "STUDYHALL_LOG_LEVEL", self.logging.level);
        env_bool!("logging.json", "STUDYHALL_LOG_JSON", self.logging.json);

        self.env_overrides = ov;
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            quota: QuotaConfig::default(),
            generator: GeneratorConfig::default(),
            logging: LoggingConfig::default(),
            env_overrides: EnvOverrides::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
