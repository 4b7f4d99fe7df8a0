use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CURRENCY: &str = "usd";
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Currency charged for checkout sessions (ISO 4217, lowercase)
    #[serde(default = "default_currency")]
    #[validate(custom = "validate_currency")]
    pub currency: String,

    /// Hosted payment provider base URL
    pub provider_base_url: String,

    /// Hosted payment provider API key
    pub provider_api_key: String,

    /// Bound on every provider call; an elapsed timeout is reported to the
    /// caller, never retried here
    #[serde(default = "default_provider_timeout_secs")]
    #[validate(range(min = 1, max = 120))]
    pub provider_timeout_secs: u64,

    /// Where the provider redirects the shopper after a successful payment
    pub checkout_success_url: String,

    /// Where the provider redirects the shopper on cancel
    pub checkout_cancel_url: String,

    /// Webhook secret for verifying provider callbacks
    #[serde(default)]
    pub payment_webhook_secret: Option<String>,

    /// Webhook timestamp tolerance (seconds)
    #[serde(default)]
    pub payment_webhook_tolerance_secs: Option<u64>,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,
}

impl AppConfig {
    /// Constructor used by tests and tooling; production goes through
    /// [`load_config`].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        database_url: String,
        host: String,
        port: u16,
        environment: String,
        provider_base_url: String,
        provider_api_key: String,
        checkout_success_url: String,
        checkout_cancel_url: String,
    ) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            currency: default_currency(),
            provider_base_url,
            provider_api_key,
            provider_timeout_secs: default_provider_timeout_secs(),
            checkout_success_url,
            checkout_cancel_url,
            payment_webhook_secret: None,
            payment_webhook_tolerance_secs: None,
            event_channel_capacity: default_event_channel_capacity(),
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development") || self.environment.eq_ignore_ascii_case("test")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

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

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_provider_timeout_secs() -> u64 {
    DEFAULT_PROVIDER_TIMEOUT_SECS
}

fn default_event_channel_capacity() -> usize {
    1024
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
fn default_db_acquire_timeout_secs() -> u64 {
    8
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

fn validate_currency(currency: &str) -> Result<(), ValidationError> {
    if currency.len() == 3 && currency.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("currency");
        err.message = Some("Currency must be a 3-letter ISO code".into());
        Err(err)
    }
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        let mut err = ValidationError::new("event_channel_capacity");
        err.message = Some("event_channel_capacity must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("storefront_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads application configuration.
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
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

    // NOTE: provider_api_key has no default - it MUST be provided via
    // environment variable or config file.
    let builder = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", 8080)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("checkout_success_url", "http://localhost:3000/success?session_id={CHECKOUT_SESSION_ID}")?
        .set_default("checkout_cancel_url", "http://localhost:3000/cart")?
        .set_default("provider_base_url", "https://api.payments.example.com")?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));

    let config = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("provider_api_key").is_err() {
        error!("Payment provider API key is not configured. Set APP__PROVIDER_API_KEY.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "provider_api_key is required but not configured. Set APP__PROVIDER_API_KEY environment variable."
                .into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite://storefront.db?mode=memory".into(),
            "127.0.0.1".into(),
            8080,
            "test".into(),
            "https://api.payments.example.com".into(),
            "sk_test_key".into(),
            "http://localhost:3000/success?session_id={CHECKOUT_SESSION_ID}".into(),
            "http://localhost:3000/cart".into(),
        )
    }

    #[test]
    fn default_config_validates() {
        let cfg = base_config();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.currency, "usd");
        assert_eq!(cfg.provider_timeout_secs, 10);
    }

    #[test]
    fn bad_log_level_is_rejected() {
        let mut cfg = base_config();
        cfg.log_level = "loud".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn currency_must_be_iso_4217() {
        let mut cfg = base_config();
        cfg.currency = "dollars".into();
        assert!(cfg.validate().is_err());

        cfg.currency = "eur".into();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_event_capacity_is_rejected() {
        let mut cfg = base_config();
        cfg.event_channel_capacity = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_environment_counts_as_development() {
        let cfg = base_config();
        assert!(cfg.is_development());
    }
}
