//! Configuration management for the auto-trader system.

use crate::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub exchange: ExchangeConfig,
    pub order_service: OrderServiceConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    pub rest_url: Option<String>,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderServiceConfig {
    pub url: String,
}

/// Knobs consumed by the trading engine itself.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Seconds between ticks of the polling loop.
    pub poll_interval_secs: u64,
    /// Markup over the weighted average entry price, in percent.
    pub sell_threshold_pct: Decimal,
    /// Minimum hours between successive automated buys for a pair.
    pub buy_delay_hours: i64,
    /// Positions purchased before this instant are ignored by sell aggregation.
    pub position_cutoff: DateTime<Utc>,
    /// Per-cycle spend ceiling; `None` means spend all remaining quota.
    pub buy_increment_quote: Option<Decimal>,
    /// Place a supplementary buy when a sell batch is under the exchange minimum.
    pub top_up_below_min_notional: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Missing optional variables fall back to defaults; a variable that is
    /// present but unparsable is a fatal startup error.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database: DatabaseConfig {
                url: required_var("DATABASE_URL")?,
                max_connections: parsed_var("DATABASE_MAX_CONNECTIONS", 5)?,
            },
            exchange: ExchangeConfig {
                rest_url: env::var("BINANCE_REST_URL").ok(),
                api_key: required_var("BINANCE_API_KEY")?,
                api_secret: required_var("BINANCE_API_SECRET")?,
            },
            order_service: OrderServiceConfig {
                url: env::var("ORDER_API_URL").unwrap_or_else(|_| "http://api:5000".to_string()),
            },
            engine: EngineConfig {
                poll_interval_secs: parsed_var("POLL_INTERVAL_SECONDS", 60)?,
                sell_threshold_pct: parsed_var("SELL_THRESHOLD_PCT", Decimal::ONE)?,
                buy_delay_hours: parsed_var("BUY_DELAY_HOURS", 24)?,
                position_cutoff: cutoff_var("POSITION_CUTOFF")?,
                buy_increment_quote: optional_var("BUY_INCREMENT_QUOTE")?,
                top_up_below_min_notional: parsed_var("TOP_UP_BELOW_MIN_NOTIONAL", false)?,
            },
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config {
        message: format!("{} environment variable not set", name),
    })
}

/// Parse an env var, defaulting when absent and failing when unparsable.
fn parsed_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| Error::Config {
            message: format!("{} is not a valid value: {:?}", name, raw),
        }),
        Err(_) => Ok(default),
    }
}

fn optional_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| Error::Config {
                message: format!("{} is not a valid value: {:?}", name, raw),
            }),
        Err(_) => Ok(None),
    }
}

/// The cutoff defaults to the epoch, making every position eligible.
fn cutoff_var(name: &str) -> Result<DateTime<Utc>> {
    match env::var(name) {
        Ok(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| Error::Config {
                message: format!("{} is not a valid RFC 3339 timestamp: {:?}", name, raw),
            }),
        Err(_) => Ok(Utc.timestamp_opt(0, 0).unwrap()),
    }
}
