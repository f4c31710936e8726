//! Application configuration
//!
//! Configuration is layered with the `config` crate: built-in defaults, then
//! `config/default`, then `config/{RUN_MODE}`, then `CARRENT__*` environment
//! variables (e.g. `CARRENT__DATABASE__URL`).

use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub payment_gateway: PaymentGatewayConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_timeout() -> u64 {
    30
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Apply pending migrations at startup
    #[serde(default)]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    2
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

/// Redis configuration (notification outbox)
#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// List that notification messages are pushed onto
    #[serde(default = "default_notification_queue")]
    pub notification_queue: String,
}

fn default_notification_queue() -> String {
    "notifications:outbox".to_string()
}

/// Authentication configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// JWT signing secret, shared with the identity service
    pub jwt_secret: String,

    /// JWT token expiration in minutes
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_minutes: i64,
}

fn default_jwt_expiration() -> i64 {
    1440 // 24 hours
}

/// Booking rules and pricing rates
#[derive(Debug, Deserialize, Clone)]
pub struct BookingConfig {
    /// Insurance fee as a fraction of the subtotal
    #[serde(default = "default_insurance_rate")]
    pub insurance_rate: f64,

    /// Tax as a fraction of subtotal plus insurance
    #[serde(default = "default_tax_rate")]
    pub tax_rate: f64,

    /// ISO 4217 code reported with every price
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Upper bound on a single gateway charge call
    #[serde(default = "default_payment_timeout")]
    pub payment_timeout_secs: u64,

    #[serde(default = "default_max_special_requests")]
    pub max_special_requests_len: usize,

    /// Period of the start/complete lifecycle job; 0 disables it
    #[serde(default = "default_lifecycle_interval")]
    pub lifecycle_interval_secs: u64,
}

fn default_insurance_rate() -> f64 {
    0.10
}

fn default_tax_rate() -> f64 {
    0.08
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_payment_timeout() -> u64 {
    15
}

fn default_max_special_requests() -> usize {
    1000
}

fn default_lifecycle_interval() -> u64 {
    3600
}

/// Shortest decimal form of a configured rate (0.1 stays 0.1)
fn rate_to_decimal(rate: f64) -> Decimal {
    rate.to_string().parse().unwrap_or(Decimal::ZERO)
}

impl BookingConfig {
    pub fn insurance_rate_decimal(&self) -> Decimal {
        rate_to_decimal(self.insurance_rate)
    }

    pub fn tax_rate_decimal(&self) -> Decimal {
        rate_to_decimal(self.tax_rate)
    }

    /// Rates must be fractions in `[0, 1]`
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, rate) in [
            ("insurance_rate", self.insurance_rate),
            ("tax_rate", self.tax_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::Message(format!(
                    "booking.{} must be between 0 and 1, got {}",
                    name, rate
                )));
            }
        }
        if self.currency.len() != 3 {
            return Err(ConfigError::Message(format!(
                "booking.currency must be a 3-letter code, got {:?}",
                self.currency
            )));
        }
        Ok(())
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            insurance_rate: default_insurance_rate(),
            tax_rate: default_tax_rate(),
            currency: default_currency(),
            payment_timeout_secs: default_payment_timeout(),
            max_special_requests_len: default_max_special_requests(),
            lifecycle_interval_secs: default_lifecycle_interval(),
        }
    }
}

/// Payment gateway endpoint
///
/// Either `url` or `mock` must be set; startup fails otherwise.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PaymentGatewayConfig {
    pub url: Option<String>,

    pub api_key: Option<String>,

    /// HTTP client timeout in seconds
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,

    /// Approve every charge in-process when no url is set (development only)
    #[serde(default)]
    pub mock: bool,
}

fn default_gateway_timeout() -> u64 {
    10
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("server.timeout_secs", 30)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.run_migrations", false)?
            .set_default("redis.notification_queue", "notifications:outbox")?
            .set_default("auth.jwt_expiration_minutes", 1440)?
            .set_default("booking.insurance_rate", 0.10)?
            .set_default("booking.tax_rate", 0.08)?
            .set_default("booking.currency", "USD")?
            .set_default("booking.payment_timeout_secs", 15)?
            .set_default("booking.max_special_requests_len", 1000)?
            .set_default("booking.lifecycle_interval_secs", 3600)?
            .set_default("payment_gateway.timeout_secs", 10)?
            .set_default("payment_gateway.mock", false)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(
                Environment::with_prefix("CARRENT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        config.booking.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("CARRENT").separator("__"))
            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        config.booking.validate()?;
        Ok(config)
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_booking_config() {
        let config = BookingConfig::default();
        assert_eq!(config.insurance_rate_decimal(), dec!(0.1));
        assert_eq!(config.tax_rate_decimal(), dec!(0.08));
        assert_eq!(config.max_special_requests_len, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rate_out_of_range_rejected() {
        let config = BookingConfig {
            tax_rate: 8.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
