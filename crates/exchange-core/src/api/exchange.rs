//! Binance spot REST gateway.
//!
//! Read-only market data (symbol filters, ticker price) plus the signed
//! order-status lookup used by fill reconciliation.

use crate::types::{OrderFill, OrderStatus, SymbolFilters};
use crate::{Error, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration as StdDuration;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Read access to the exchange, scoped to the credentials the gateway
/// was built with.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Fetch the trading constraints for a symbol.
    async fn get_symbol_filters(&self, symbol: &str) -> Result<SymbolFilters>;

    /// Fetch the current ticker price for a symbol.
    async fn get_current_price(&self, symbol: &str) -> Result<Decimal>;

    /// Fetch the fill state of a previously placed order.
    async fn get_order_status(&self, symbol: &str, order_id: i64) -> Result<OrderFill>;
}

/// Binance REST implementation of [`ExchangeGateway`].
pub struct BinanceGateway {
    base_url: String,
    api_key: String,
    api_secret: String,
    http_client: reqwest::Client,
}

impl BinanceGateway {
    /// Default Binance spot REST base URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.binance.com";

    /// Maximum retry attempts for API calls.
    const MAX_RETRIES: u32 = 3;

    pub fn new(base_url: Option<String>, api_key: String, api_secret: String) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(30))
            .connect_timeout(StdDuration::from_secs(10))
            .build()?;
        Ok(Self {
            base_url: base_url.unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string()),
            api_key,
            api_secret,
            http_client,
        })
    }

    /// Execute an HTTP GET with retry and exponential backoff.
    ///
    /// Retries on 5xx server errors and 429 rate-limit responses (with a
    /// longer backoff for 429). All other 4xx errors fail immediately.
    /// The URL is rebuilt per attempt: signed requests carry a timestamp
    /// that would fall outside the exchange's recvWindow after a backoff.
    async fn get_with_retry<F>(&self, make_url: F, signed: bool) -> Result<reqwest::Response>
    where
        F: Fn() -> Result<String>,
    {
        let mut last_error = None;

        for attempt in 0..Self::MAX_RETRIES {
            let url = make_url()?;
            let mut request = self.http_client.get(&url);
            if signed {
                request = request.header("X-MBX-APIKEY", &self.api_key);
            }
            match request.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response)
                    if response.status().as_u16() == 429 || response.status().is_server_error() =>
                {
                    let status = response.status();
                    let is_rate_limited = status.as_u16() == 429;
                    warn!(
                        attempt = attempt + 1,
                        status = %status,
                        url = %url,
                        rate_limited = is_rate_limited,
                        "Retryable exchange API error, backing off"
                    );
                    last_error = Some(Error::Api {
                        message: format!(
                            "{}: {}",
                            if is_rate_limited { "Rate limited" } else { "Server error" },
                            status
                        ),
                        status: Some(status.as_u16()),
                    });

                    if attempt + 1 < Self::MAX_RETRIES {
                        let backoff = if is_rate_limited {
                            StdDuration::from_millis(2000 * 2u64.pow(attempt))
                        } else {
                            StdDuration::from_millis(500 * 2u64.pow(attempt))
                        };
                        tokio::time::sleep(backoff).await;
                    }
                    continue;
                }
                Ok(response) => {
                    return Err(Error::Api {
                        message: format!("Exchange API error: {}", response.status()),
                        status: Some(response.status().as_u16()),
                    });
                }
                Err(e) => {
                    warn!(
                        attempt = attempt + 1,
                        error = %e,
                        url = %url,
                        "HTTP request failed, backing off"
                    );
                    last_error = Some(Error::Http(e));
                }
            }

            if attempt + 1 < Self::MAX_RETRIES {
                let backoff = StdDuration::from_millis(500 * 2u64.pow(attempt));
                tokio::time::sleep(backoff).await;
            }
        }

        Err(last_error.unwrap_or(Error::Api {
            message: "Max retries exceeded".to_string(),
            status: None,
        }))
    }

    /// Sign a query string with HMAC-SHA256 per the Binance API contract.
    fn sign(&self, query: &str) -> Result<String> {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(self.api_secret.as_bytes()).map_err(|_| {
                Error::Exchange {
                    message: "Invalid API secret for HMAC signing".to_string(),
                }
            })?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn timestamp_ms() -> u128 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0)
    }

    /// Signed order-status URL with a current timestamp.
    fn signed_order_url(&self, symbol: &str, order_id: i64) -> Result<String> {
        let query = format!(
            "symbol={}&orderId={}&timestamp={}",
            symbol,
            order_id,
            Self::timestamp_ms()
        );
        let signature = self.sign(&query)?;
        Ok(format!(
            "{}/api/v3/order?{}&signature={}",
            self.base_url, query, signature
        ))
    }
}

#[async_trait]
impl ExchangeGateway for BinanceGateway {
    async fn get_symbol_filters(&self, symbol: &str) -> Result<SymbolFilters> {
        let url = format!("{}/api/v3/exchangeInfo?symbol={}", self.base_url, symbol);
        let response = self.get_with_retry(|| Ok(url.clone()), false).await?;
        let info: ExchangeInfoResponse = response.json().await?;

        let filters = info
            .symbols
            .into_iter()
            .next()
            .map(|s| s.filters)
            .ok_or_else(|| Error::Exchange {
                message: format!("Exchange returned no symbol info for {}", symbol),
            })?;

        let mut step_size = None;
        let mut tick_size = None;
        let mut min_notional = None;
        for filter in filters {
            match filter.filter_type.as_str() {
                "LOT_SIZE" => step_size = filter.step_size,
                "PRICE_FILTER" => tick_size = filter.tick_size,
                // The spot API renamed MIN_NOTIONAL to NOTIONAL; accept both.
                "NOTIONAL" | "MIN_NOTIONAL" => min_notional = filter.min_notional,
                _ => {}
            }
        }

        let missing = |name: &str| Error::Inconsistency(format!(
            "symbol {} is missing the {} filter",
            symbol, name
        ));
        Ok(SymbolFilters {
            step_size: step_size.ok_or_else(|| missing("LOT_SIZE"))?,
            tick_size: tick_size.ok_or_else(|| missing("PRICE_FILTER"))?,
            min_notional: min_notional.ok_or_else(|| missing("NOTIONAL"))?,
        })
    }

    async fn get_current_price(&self, symbol: &str) -> Result<Decimal> {
        let url = format!("{}/api/v3/ticker/price?symbol={}", self.base_url, symbol);
        let response = self.get_with_retry(|| Ok(url.clone()), false).await?;
        let ticker: TickerResponse = response.json().await?;
        Ok(ticker.price)
    }

    async fn get_order_status(&self, symbol: &str, order_id: i64) -> Result<OrderFill> {
        let response = self
            .get_with_retry(|| self.signed_order_url(symbol, order_id), true)
            .await?;
        let order: OrderStatusResponse = response.json().await?;
        Ok(OrderFill {
            status: OrderStatus::parse(&order.status),
            executed_qty: order.executed_qty,
            executed_quote_qty: order.cummulative_quote_qty,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ExchangeInfoResponse {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    filters: Vec<SymbolFilter>,
}

#[derive(Debug, Deserialize)]
struct SymbolFilter {
    #[serde(rename = "filterType")]
    filter_type: String,
    #[serde(rename = "stepSize")]
    step_size: Option<Decimal>,
    #[serde(rename = "tickSize")]
    tick_size: Option<Decimal>,
    #[serde(rename = "minNotional")]
    min_notional: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    price: Decimal,
}

#[derive(Debug, Deserialize)]
struct OrderStatusResponse {
    status: String,
    #[serde(rename = "executedQty")]
    executed_qty: Decimal,
    // Binance spells it this way on the wire.
    #[serde(rename = "cummulativeQuoteQty")]
    cummulative_quote_qty: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_parsing_accepts_both_notional_spellings() {
        let json = r#"{
            "symbols": [{
                "filters": [
                    {"filterType": "LOT_SIZE", "stepSize": "0.001"},
                    {"filterType": "PRICE_FILTER", "tickSize": "0.01"},
                    {"filterType": "MIN_NOTIONAL", "minNotional": "10"}
                ]
            }]
        }"#;
        let info: ExchangeInfoResponse = serde_json::from_str(json).unwrap();
        let filter_types: Vec<_> = info.symbols[0]
            .filters
            .iter()
            .map(|f| f.filter_type.as_str())
            .collect();
        assert_eq!(filter_types, vec!["LOT_SIZE", "PRICE_FILTER", "MIN_NOTIONAL"]);
        assert_eq!(info.symbols[0].filters[2].min_notional, Some(Decimal::new(10, 0)));
    }

    #[test]
    fn signed_order_url_carries_a_fresh_timestamp_per_call() {
        let gateway =
            BinanceGateway::new(None, "key".to_string(), "secret".to_string()).unwrap();
        let first = gateway.signed_order_url("BTCUSDT", 42).unwrap();
        std::thread::sleep(StdDuration::from_millis(5));
        let second = gateway.signed_order_url("BTCUSDT", 42).unwrap();

        // Rebuilding between retry attempts must produce a new
        // timestamp (and therefore a new signature).
        assert_ne!(first, second);
        assert!(first.contains("&signature="));
        assert!(first.starts_with("https://api.binance.com/api/v3/order?symbol=BTCUSDT"));
    }

    #[test]
    fn order_status_response_parses_wire_fields() {
        let json = r#"{
            "status": "FILLED",
            "executedQty": "0.045",
            "cummulativeQuoteQty": "2742.15"
        }"#;
        let order: OrderStatusResponse = serde_json::from_str(json).unwrap();
        assert_eq!(OrderStatus::parse(&order.status), OrderStatus::Filled);
        assert_eq!(order.executed_qty, Decimal::new(45, 3));
    }
}
