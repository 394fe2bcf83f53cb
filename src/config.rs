use chrono::{FixedOffset, Offset, Utc};
use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::notifications::AdminNotificationConfig;
use crate::services::orders::TransitionPolicy;
use crate::services::sequence::SequenceStrategy;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
/// India Standard Time, the business calendar of the platform.
const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// A half-open `[start_hour, end_hour)` window in local time.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, serde::Serialize)]
pub struct PeakWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl PeakWindow {
    pub const fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    pub fn contains(&self, hour: u32) -> bool {
        hour >= self.start_hour && hour < self.end_hour
    }
}

/// Delivery fee policy
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct DeliveryConfig {
    pub free_delivery_threshold: Decimal,
    pub base_charge: Decimal,
    pub peak_hour_surcharge: Decimal,
    pub peak_windows: Vec<PeakWindow>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            free_delivery_threshold: dec!(300),
            base_charge: dec!(30),
            peak_hour_surcharge: dec!(10),
            peak_windows: vec![PeakWindow::new(12, 14), PeakWindow::new(19, 22)],
        }
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct PricingConfig {
    /// Flat GST percentage applied to the subtotal
    pub gst_percentage: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            gst_percentage: dec!(5),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct SequenceConfig {
    pub strategy: SequenceStrategy,
    /// Attempts made when a generated number collides with an existing one
    #[validate(range(min = 1, max = 10))]
    pub max_attempts: u32,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            strategy: SequenceStrategy::Counter,
            max_attempts: 3,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct OrdersConfig {
    pub transition_policy: TransitionPolicy,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct SideEffectsConfig {
    /// Upper bound for broadcasts, notifications and payment attachment
    #[validate(range(min = 1))]
    pub timeout_ms: u64,
}

impl Default for SideEffectsConfig {
    fn default() -> Self {
        Self { timeout_ms: 2_000 }
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct ReconciliationConfig {
    /// Sweep interval; 0 disables the background sweep
    pub interval_secs: u64,
    /// Pending orders younger than this are left alone by the payment sweep
    pub payment_grace_secs: u64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            payment_grace_secs: 120,
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    /// Application environment
    pub environment: String,

    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins; permissive when unset
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    #[validate(range(min = 1))]
    pub event_channel_capacity: usize,

    /// Offset of the business calendar from UTC, in minutes
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,

    #[serde(default)]
    #[validate]
    pub delivery: DeliveryConfig,

    #[serde(default)]
    #[validate]
    pub pricing: PricingConfig,

    #[serde(default)]
    #[validate]
    pub sequence: SequenceConfig,

    #[serde(default)]
    #[validate]
    pub orders: OrdersConfig,

    #[serde(default)]
    pub notifications: AdminNotificationConfig,

    #[serde(default)]
    #[validate]
    pub side_effects: SideEffectsConfig,

    #[serde(default)]
    #[validate]
    pub reconciliation: ReconciliationConfig,
}

impl AppConfig {
    /// Creates a configuration with every section at its default
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            utc_offset_minutes: default_utc_offset_minutes(),
            delivery: DeliveryConfig::default(),
            pricing: PricingConfig::default(),
            sequence: SequenceConfig::default(),
            orders: OrdersConfig::default(),
            notifications: AdminNotificationConfig::default(),
            side_effects: SideEffectsConfig::default(),
            reconciliation: ReconciliationConfig::default(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// The business calendar offset. Validation keeps it in range, UTC is the fallback.
    pub fn local_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    pub fn side_effect_timeout(&self) -> Duration {
        Duration::from_millis(self.side_effects.timeout_ms)
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !(-MAX_UTC_OFFSET_MINUTES..=MAX_UTC_OFFSET_MINUTES).contains(&self.utc_offset_minutes) {
            let mut err = ValidationError::new("utc_offset_minutes");
            err.message = Some("utc_offset_minutes must be within +/-14 hours".into());
            errors.add("utc_offset_minutes", err);
        }

        if let Err(err) = validate_peak_windows(&self.delivery.peak_windows) {
            errors.add("delivery.peak_windows", err);
        }

        if self.delivery.free_delivery_threshold < Decimal::ZERO
            || self.delivery.base_charge < Decimal::ZERO
            || self.delivery.peak_hour_surcharge < Decimal::ZERO
        {
            let mut err = ValidationError::new("delivery_amounts");
            err.message = Some("delivery amounts must not be negative".into());
            errors.add("delivery", err);
        }

        if let Err(err) = validate_gst_percentage(&self.pricing.gst_percentage) {
            errors.add("pricing.gst_percentage", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),
    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    16
}

fn default_db_min_connections() -> u32 {
    2
}

fn default_db_connect_timeout_secs() -> u64 {
    30
}

fn default_db_idle_timeout_secs() -> u64 {
    600
}

fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_utc_offset_minutes() -> i32 {
    DEFAULT_UTC_OFFSET_MINUTES
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_gst_percentage(rate: &Decimal) -> Result<(), ValidationError> {
    if *rate < Decimal::ZERO || *rate > dec!(100) {
        let mut err = ValidationError::new("gst_percentage");
        err.message = Some("gst_percentage must be between 0 and 100".into());
        return Err(err);
    }
    Ok(())
}

fn validate_peak_windows(windows: &[PeakWindow]) -> Result<(), ValidationError> {
    for window in windows {
        if window.start_hour >= window.end_hour || window.end_hour > 24 {
            let mut err = ValidationError::new("peak_windows");
            err.message = Some(
                format!(
                    "peak window [{}, {}) must satisfy start < end <= 24",
                    window.start_hour, window.end_hour
                )
                .into(),
            );
            return Err(err);
        }
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("fresheats_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = base_builder(Path::new(CONFIG_DIR), &run_env)?
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    finish(config)
}

/// Loads configuration from files under `dir` only, ignoring the process environment
pub fn load_config_from(dir: &Path, run_env: &str) -> Result<AppConfig, AppConfigError> {
    let config = base_builder(dir, run_env)?.build()?;
    finish(config)
}

fn base_builder(
    dir: &Path,
    run_env: &str,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    let dir = dir.to_string_lossy();
    Ok(Config::builder()
        .set_default("database_url", "sqlite://fresheats.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", dir)).required(false))
        .add_source(File::with_name(&format!("{}/{}", dir, run_env)).required(false)))
}

fn finish(config: Config) -> Result<AppConfig, AppConfigError> {
    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(content: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("default.toml"), content).unwrap();
        dir
    }

    #[test]
    fn defaults_match_the_published_delivery_policy() {
        let cfg = AppConfig::new("sqlite::memory:".into(), "127.0.0.1".into(), 8080, "test".into());
        assert_eq!(cfg.delivery.free_delivery_threshold, dec!(300));
        assert_eq!(cfg.delivery.base_charge, dec!(30));
        assert_eq!(cfg.delivery.peak_hour_surcharge, dec!(10));
        assert_eq!(
            cfg.delivery.peak_windows,
            vec![PeakWindow::new(12, 14), PeakWindow::new(19, 22)]
        );
        assert_eq!(cfg.pricing.gst_percentage, dec!(5));
        assert_eq!(cfg.local_offset().local_minus_utc(), 330 * 60);
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = write_config(
            r#"
            database_url = "sqlite::memory:"
            environment = "production"
            port = 9090

            [delivery]
            free_delivery_threshold = 499
            base_charge = 40

            [sequence]
            strategy = "max_scan"
            max_attempts = 5

            [orders]
            transition_policy = "permissive"

            [notifications]
            admin_phone = "+919999999999"
            "#,
        );

        let cfg = load_config_from(dir.path(), "production").unwrap();
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.delivery.free_delivery_threshold, dec!(499));
        assert_eq!(cfg.delivery.base_charge, dec!(40));
        assert_eq!(cfg.delivery.peak_hour_surcharge, dec!(10));
        assert_eq!(cfg.sequence.strategy, SequenceStrategy::MaxScan);
        assert_eq!(cfg.sequence.max_attempts, 5);
        assert_eq!(cfg.orders.transition_policy, TransitionPolicy::Permissive);
        assert_eq!(
            cfg.notifications.admin_phone.as_deref(),
            Some("+919999999999")
        );
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let dir = write_config(
            r#"
            log_level = "loud"
            "#,
        );
        let result = load_config_from(dir.path(), "development");
        assert!(matches!(result, Err(AppConfigError::Validation(_))));
    }

    #[test]
    fn inverted_peak_window_is_rejected() {
        let mut cfg =
            AppConfig::new("sqlite::memory:".into(), "127.0.0.1".into(), 8080, "test".into());
        cfg.delivery.peak_windows = vec![PeakWindow::new(22, 19)];
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn gst_above_one_hundred_percent_is_rejected() {
        let mut cfg =
            AppConfig::new("sqlite::memory:".into(), "127.0.0.1".into(), 8080, "test".into());
        cfg.pricing.gst_percentage = dec!(120);
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn peak_window_is_half_open() {
        let lunch = PeakWindow::new(12, 14);
        assert!(!lunch.contains(11));
        assert!(lunch.contains(12));
        assert!(lunch.contains(13));
        assert!(!lunch.contains(14));
    }
}
