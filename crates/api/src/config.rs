//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use checkout::CheckoutSettings;
use thiserror::Error;

/// Webhook secret used with the in-memory processor when none is set.
pub const LOCAL_WEBHOOK_SECRET: &str = "whsec_local";

/// Upper bound on `ORDER_TTL_HOURS` (one year).
pub const MAX_ORDER_TTL_HOURS: i64 = 24 * 366;

/// Configuration errors. The server refuses to start on any of these.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is required when {because} is set")]
    Missing {
        var: &'static str,
        because: &'static str,
    },

    #[error("invalid value '{value}' for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `pretty` or `json`
/// - `DATABASE_URL`: PostgreSQL; in-memory stores when unset
/// - `STRIPE_SERVER_SECRET`, `STRIPE_WEBHOOK_SECRET`, `STRIPE_API_BASE`
/// - `SETTLEMENT_CURRENCY`, `ORDER_TTL_HOURS`, `PROCESSOR_TIMEOUT_SECS`
/// - `NOTIFY_WEBHOOK_URL`, `NOTIFY_TIMEOUT_SECS`
/// - `CATALOG_SEED_PATH`, `TTL_REAP_INTERVAL_SECS`
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    /// Processor API key. The in-memory processor is used when unset.
    pub stripe_secret: Option<String>,
    pub webhook_secret: String,
    pub stripe_api_base: String,
    pub currency: String,
    pub order_ttl_hours: i64,
    pub processor_timeout: Duration,
    pub notify_url: Option<String>,
    pub notify_timeout: Duration,
    pub catalog_seed_path: Option<PathBuf>,
    pub ttl_reap_interval: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Loads configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let log_format = match get("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "LOG_FORMAT",
                    value: other.to_string(),
                    reason: "expected 'pretty' or 'json'".to_string(),
                });
            }
        };

        let stripe_secret = get("STRIPE_SERVER_SECRET");
        let webhook_secret = match (get("STRIPE_WEBHOOK_SECRET"), &stripe_secret) {
            (Some(secret), _) => secret,
            (None, Some(_)) => {
                return Err(ConfigError::Missing {
                    var: "STRIPE_WEBHOOK_SECRET",
                    because: "STRIPE_SERVER_SECRET",
                });
            }
            (None, None) => defaults.webhook_secret,
        };

        let order_ttl_hours: i64 = parse_or(&get, "ORDER_TTL_HOURS", defaults.order_ttl_hours)?;
        if order_ttl_hours <= 0 || order_ttl_hours > MAX_ORDER_TTL_HOURS {
            return Err(ConfigError::Invalid {
                var: "ORDER_TTL_HOURS",
                value: order_ttl_hours.to_string(),
                reason: format!("must be between 1 and {MAX_ORDER_TTL_HOURS}"),
            });
        }

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse_or(&get, "PORT", defaults.port)?,
            log_level: get("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            database_url: get("DATABASE_URL"),
            stripe_secret,
            webhook_secret,
            stripe_api_base: get("STRIPE_API_BASE").unwrap_or(defaults.stripe_api_base),
            currency: get("SETTLEMENT_CURRENCY")
                .map(|c| c.to_lowercase())
                .unwrap_or(defaults.currency),
            order_ttl_hours,
            processor_timeout: secs_or(&get, "PROCESSOR_TIMEOUT_SECS", defaults.processor_timeout)?,
            notify_url: get("NOTIFY_WEBHOOK_URL"),
            notify_timeout: secs_or(&get, "NOTIFY_TIMEOUT_SECS", defaults.notify_timeout)?,
            catalog_seed_path: get("CATALOG_SEED_PATH").map(PathBuf::from),
            ttl_reap_interval: secs_or(&get, "TTL_REAP_INTERVAL_SECS", defaults.ttl_reap_interval)?,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn checkout_settings(&self) -> CheckoutSettings {
        CheckoutSettings {
            currency: self.currency.clone(),
            order_ttl: chrono::Duration::hours(self.order_ttl_hours),
            processor_timeout: self.processor_timeout,
        }
    }
}

fn parse_or<T>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(var) {
        None => Ok(default),
        Some(value) => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|e| ConfigError::Invalid {
                var,
                reason: e.to_string(),
                value,
            })
        }
    }
}

fn secs_or(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let secs = parse_or(get, var, default.as_secs())?;
    if secs == 0 {
        return Err(ConfigError::Invalid {
            var,
            value: secs.to_string(),
            reason: "must be at least 1 second".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            stripe_secret: None,
            webhook_secret: LOCAL_WEBHOOK_SECRET.to_string(),
            stripe_api_base: checkout::services::stripe::DEFAULT_API_BASE.to_string(),
            currency: "eur".to_string(),
            order_ttl_hours: 72,
            processor_timeout: Duration::from_secs(10),
            notify_url: None,
            notify_timeout: Duration::from_secs(5),
            catalog_seed_path: None,
            ttl_reap_interval: Duration::from_secs(60),
        }
    }
}
