//! Database configuration from the environment.
//!
//! Every variable is optional and falls back to the [`DbConfig`] default.
//!
//! | Variable                      | Default        |
//! |-------------------------------|----------------|
//! | `BAZAAR_DB_PATH`              | `bazaar.db`    |
//! | `BAZAAR_DB_MAX_CONNECTIONS`   | `5`            |
//! | `BAZAAR_TAX_RATE_BPS`         | `1000` (10%)   |
//! | `BAZAAR_SHIPPING_CENTS`       | `0`            |
//! | `BAZAAR_REQUEST_TIMEOUT_SECS` | `30`           |

use bazaar_core::validation::validate_tax_rate_bps;
use bazaar_core::{Money, PricingPolicy, TaxRate, DEFAULT_SHIPPING_CENTS, DEFAULT_TAX_RATE_BPS};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::pool::DbConfig;

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Loads configuration from environment variables.
pub fn load_from_env() -> Result<DbConfig, ConfigError> {
    from_lookup(|key| env::var(key).ok())
}

/// Builds a configuration from any key lookup (the environment in
/// production, a map in tests).
pub fn from_lookup<F>(lookup: F) -> Result<DbConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let path = lookup("BAZAAR_DB_PATH").unwrap_or_else(|| "bazaar.db".to_string());
    if path.trim().is_empty() {
        return Err(ConfigError::MissingRequired("BAZAAR_DB_PATH".to_string()));
    }

    let max_connections: u32 = parse_or(&lookup, "BAZAAR_DB_MAX_CONNECTIONS", 5)?;
    if max_connections == 0 {
        return Err(ConfigError::InvalidValue("BAZAAR_DB_MAX_CONNECTIONS".to_string()));
    }

    let tax_bps: u32 = parse_or(&lookup, "BAZAAR_TAX_RATE_BPS", DEFAULT_TAX_RATE_BPS)?;
    validate_tax_rate_bps(tax_bps)
        .map_err(|_| ConfigError::InvalidValue("BAZAAR_TAX_RATE_BPS".to_string()))?;

    let shipping_cents: i64 = parse_or(&lookup, "BAZAAR_SHIPPING_CENTS", DEFAULT_SHIPPING_CENTS)?;
    if shipping_cents < 0 {
        return Err(ConfigError::InvalidValue("BAZAAR_SHIPPING_CENTS".to_string()));
    }

    let timeout_secs: u64 = parse_or(&lookup, "BAZAAR_REQUEST_TIMEOUT_SECS", 30)?;

    Ok(DbConfig::new(path)
        .max_connections(max_connections)
        .request_timeout(Duration::from_secs(timeout_secs))
        .pricing(PricingPolicy::new(
            TaxRate::from_bps(tax_bps),
            Money::from_cents(shipping_cents),
        )))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}
