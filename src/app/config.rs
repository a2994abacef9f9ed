//! Application configuration loading and validation.
//!
//! Configuration is loaded from a TOML file with environment variable
//! overrides for credentials: `WHALEWATCH_API_KEY_ID` and
//! `WHALEWATCH_API_TOKEN` for the venue session, `TELEGRAM_BOT_TOKEN`
//! and `TELEGRAM_CHATS` for the notifier. Secrets never live in the
//! config file.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::adapter::kalshi::ReconnectConfig;
use crate::engine::router::RoutingConfig;
use crate::engine::scorer::ScoringConfig;
use crate::error::{ConfigError, Result};
use crate::port::bus::BusConfig;

/// Venue endpoints and credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct VenueConfig {
    /// WebSocket URL for the trade firehose.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// REST API URL for the market catalog.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Loaded from `WHALEWATCH_API_KEY_ID`, never from the file.
    #[serde(skip)]
    pub api_key_id: Option<String>,
    /// Loaded from `WHALEWATCH_API_TOKEN`, never from the file.
    #[serde(skip)]
    pub api_token: Option<String>,
}

fn default_ws_url() -> String {
    "wss://api.elections.kalshi.com/trade-api/ws/v2".to_string()
}

fn default_api_url() -> String {
    "https://api.elections.kalshi.com/trade-api/v2".to_string()
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            api_url: default_api_url(),
            api_key_id: None,
            api_token: None,
        }
    }
}

/// Event bus knobs, mirrored into [`BusConfig`].
#[derive(Debug, Clone, Deserialize)]
pub struct BusSection {
    #[serde(default = "default_visibility_timeout_ms")]
    pub visibility_timeout_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_prefetch")]
    pub prefetch: usize,
}

fn default_visibility_timeout_ms() -> u64 {
    30_000
}
fn default_max_attempts() -> u32 {
    5
}
fn default_prefetch() -> usize {
    16
}

impl Default for BusSection {
    fn default() -> Self {
        Self {
            visibility_timeout_ms: default_visibility_timeout_ms(),
            max_attempts: default_max_attempts(),
            prefetch: default_prefetch(),
        }
    }
}

impl BusSection {
    #[must_use]
    pub fn to_bus_config(&self) -> BusConfig {
        BusConfig {
            visibility_timeout_ms: self.visibility_timeout_ms,
            max_attempts: self.max_attempts,
            prefetch: self.prefetch,
        }
    }
}

/// Context store backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    /// Durable SQLite store; baselines survive restart.
    #[default]
    Sqlite,
    /// In-process cache only; baselines reset on restart.
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    #[serde(default)]
    pub mode: StoreMode,
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database: String,
}

fn default_database_path() -> String {
    "whalewatch.db".to_string()
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            mode: StoreMode::default(),
            database: default_database_path(),
        }
    }
}

/// Threshold gate and worker-count settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringSection {
    /// Global anomaly threshold; alerts fire strictly below it.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_warmup_min_samples")]
    pub warmup_min_samples: u64,
    /// Number of scoring workers draining the raw stream.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Drop trades on already-closed markets instead of scoring them.
    #[serde(default)]
    pub reject_closed_markets: bool,
    /// Per-category threshold overrides.
    #[serde(default)]
    pub category_thresholds: HashMap<String, f64>,
}

fn default_threshold() -> f64 {
    -0.7
}
fn default_warmup_min_samples() -> u64 {
    5
}
fn default_workers() -> usize {
    2
}

impl Default for ScoringSection {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            warmup_min_samples: default_warmup_min_samples(),
            workers: default_workers(),
            reject_closed_markets: false,
            category_thresholds: HashMap::new(),
        }
    }
}

impl ScoringSection {
    #[must_use]
    pub fn to_scoring_config(&self) -> ScoringConfig {
        ScoringConfig {
            threshold: self.threshold,
            category_thresholds: self.category_thresholds.clone(),
            warmup_min_samples: self.warmup_min_samples,
            reject_closed_markets: self.reject_closed_markets,
        }
    }
}

/// Alert routing settings, mirrored into [`RoutingConfig`].
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingSection {
    /// Category -> channel map.
    #[serde(default)]
    pub channels: HashMap<String, String>,
    #[serde(default = "default_channel")]
    pub default_channel: String,
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: u64,
    #[serde(default = "default_max_delivery_attempts")]
    pub max_delivery_attempts: u32,
    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,
}

fn default_channel() -> String {
    "general".to_string()
}
fn default_dedup_window_secs() -> u64 {
    600
}
fn default_max_delivery_attempts() -> u32 {
    3
}
fn default_retry_initial_delay_ms() -> u64 {
    200
}

impl Default for RoutingSection {
    fn default() -> Self {
        Self {
            channels: HashMap::new(),
            default_channel: default_channel(),
            dedup_window_secs: default_dedup_window_secs(),
            max_delivery_attempts: default_max_delivery_attempts(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
        }
    }
}

impl RoutingSection {
    #[must_use]
    pub fn to_routing_config(&self) -> RoutingConfig {
        RoutingConfig {
            channels: self.channels.clone(),
            default_channel: self.default_channel.clone(),
            dedup_window_secs: self.dedup_window_secs,
            max_delivery_attempts: self.max_delivery_attempts,
            retry_initial_delay_ms: self.retry_initial_delay_ms,
        }
    }
}

/// WebSocket reconnection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectSection {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_initial_delay_ms() -> u64 {
    1_000
}
fn default_max_delay_ms() -> u64 {
    60_000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl ReconnectSection {
    #[must_use]
    pub fn to_reconnect_config(&self) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay_ms: self.initial_delay_ms,
            max_delay_ms: self.max_delay_ms,
            backoff_multiplier: self.backoff_multiplier,
        }
    }
}

/// Background catalog refresh settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshSection {
    #[serde(default = "default_refresh_interval_secs")]
    pub interval_secs: u64,
    /// Per-request timeout for catalog HTTP calls.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_refresh_interval_secs() -> u64 {
    300
}
fn default_http_timeout_secs() -> u64 {
    30
}

impl Default for RefreshSection {
    fn default() -> Self {
        Self {
            interval_secs: default_refresh_interval_secs(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

/// Decision model artifact settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSection {
    /// Path to the JSON isolation-forest artifact.
    #[serde(default = "default_artifact_path")]
    pub artifact_path: String,
}

fn default_artifact_path() -> String {
    "model.json".to_string()
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            artifact_path: default_artifact_path(),
        }
    }
}

/// Logging and summary cadence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Cadence of the pipeline counter summary line.
    #[serde(default = "default_summary_interval_secs")]
    pub summary_interval_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}
fn default_summary_interval_secs() -> u64 {
    60
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            summary_interval_secs: default_summary_interval_secs(),
        }
    }
}

impl LoggingConfig {
    /// Initialize the tracing subscriber with this logging configuration.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

/// Main application configuration.
///
/// Load from a TOML file using [`Config::load`] or parse directly with
/// [`Config::parse_toml`]. Every section has working defaults; an empty
/// file yields a runnable configuration (with credentials from the
/// environment).
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub venue: VenueConfig,
    #[serde(default)]
    pub bus: BusSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub scoring: ScoringSection,
    #[serde(default)]
    pub routing: RoutingSection,
    #[serde(default)]
    pub reconnect: ReconnectSection,
    #[serde(default)]
    pub refresh: RefreshSection,
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// Venue credentials are taken from `WHALEWATCH_API_KEY_ID` and
    /// `WHALEWATCH_API_TOKEN` (never from the file).
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or validation fails.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;

        config.venue.api_key_id = std::env::var("WHALEWATCH_API_KEY_ID").ok();
        config.venue.api_token = std::env::var("WHALEWATCH_API_TOKEN").ok();

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML is
    /// malformed, or validation fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.venue.ws_url.is_empty() {
            return Err(ConfigError::MissingField { field: "ws_url" }.into());
        }
        if self.venue.api_url.is_empty() {
            return Err(ConfigError::MissingField { field: "api_url" }.into());
        }
        if self.scoring.threshold >= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "threshold",
                reason: "anomaly scores are negative, threshold must be below 0".to_string(),
            }
            .into());
        }
        for (category, threshold) in &self.scoring.category_thresholds {
            if *threshold >= 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: "category_thresholds",
                    reason: format!("override for {category} must be below 0"),
                }
                .into());
            }
        }
        if self.scoring.workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "workers",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.bus.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_attempts",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.bus.prefetch == 0 {
            return Err(ConfigError::InvalidValue {
                field: "prefetch",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.bus.visibility_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "visibility_timeout_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.routing.default_channel.is_empty() {
            return Err(ConfigError::MissingField {
                field: "default_channel",
            }
            .into());
        }
        if self.routing.dedup_window_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "dedup_window_secs",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.routing.max_delivery_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_delivery_attempts",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.reconnect.initial_delay_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "initial_delay_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.reconnect.max_delay_ms < self.reconnect.initial_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "max_delay_ms",
                reason: "must be >= initial_delay_ms".to_string(),
            }
            .into());
        }
        if self.reconnect.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "backoff_multiplier",
                reason: "must be >= 1.0".to_string(),
            }
            .into());
        }
        if self.refresh.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "interval_secs",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.model.artifact_path.is_empty() {
            return Err(ConfigError::MissingField {
                field: "artifact_path",
            }
            .into());
        }
        Ok(())
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}
