//! HTTP client for the order service.
//!
//! The order service executes buys and sells against the exchange with the
//! user's credentials and persists the resulting `trades` row. The engine
//! treats any non-success response as a uniformly retryable failure.

use crate::types::OperationType;
use crate::{Error, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration as StdDuration;
use uuid::Uuid;

/// Order placement, abstracted so tests can run against a fake.
#[async_trait]
pub trait OrderService: Send + Sync {
    async fn submit(&self, request: &OrderRequest) -> Result<OrderResponse>;
}

/// What kind of order to place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    /// Market buy sized in quote currency; the exchange derives the base
    /// quantity from the funds spent, so no lot rounding is needed.
    MarketBuyByQuote { quote_amount: Decimal },
    /// Limit sell for an explicit quantity at an explicit price.
    LimitSell { qty: Decimal, price: Decimal },
}

/// A single order submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub kind: OrderKind,
    pub symbol: String,
    pub user_id: i64,
    pub operation_type: OperationType,
    /// Client-generated idempotency key, persisted as `client_order_id`.
    pub client_order_id: String,
}

impl OrderRequest {
    pub fn market_buy_by_quote(
        symbol: impl Into<String>,
        user_id: i64,
        quote_amount: Decimal,
    ) -> Self {
        Self {
            kind: OrderKind::MarketBuyByQuote { quote_amount },
            symbol: symbol.into(),
            user_id,
            operation_type: OperationType::Auto,
            client_order_id: Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn limit_sell(
        symbol: impl Into<String>,
        user_id: i64,
        qty: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            kind: OrderKind::LimitSell { qty, price },
            symbol: symbol.into(),
            user_id,
            operation_type: OperationType::Auto,
            client_order_id: Uuid::new_v4().simple().to_string(),
        }
    }

    /// Wire payload for `POST /order`.
    fn payload(&self) -> serde_json::Value {
        let mut payload = match &self.kind {
            OrderKind::MarketBuyByQuote { quote_amount } => json!({
                "side": "BUY",
                "type": "MARKET",
                "quoteOrderQty": quote_amount,
            }),
            OrderKind::LimitSell { qty, price } => json!({
                "side": "SELL",
                "type": "LIMIT",
                "quantity": qty,
                "price": price,
            }),
        };
        payload["symbol"] = json!(self.symbol);
        payload["userId"] = json!(self.user_id);
        payload["operationType"] = json!(self.operation_type.as_str());
        payload["clientOrderId"] = json!(self.client_order_id);
        payload
    }
}

/// Details of an accepted order. Executed figures are not trusted from
/// this response; fill reconciliation reads them from the exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedOrder {
    #[serde(rename = "orderId")]
    pub order_id: i64,
}

/// Order service response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub status: String,
    #[serde(default)]
    pub order: Option<PlacedOrder>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl OrderResponse {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// Exchange order id of an accepted order.
    pub fn order_id(&self) -> Result<i64> {
        if !self.is_success() {
            return Err(Error::Order {
                message: self
                    .detail
                    .clone()
                    .unwrap_or_else(|| format!("order service returned status {:?}", self.status)),
            });
        }
        self.order
            .as_ref()
            .map(|o| o.order_id)
            .ok_or_else(|| Error::Order {
                message: "order service success response carried no order id".to_string(),
            })
    }
}

/// HTTP implementation of [`OrderService`].
pub struct OrderServiceClient {
    api_url: String,
    http_client: reqwest::Client,
}

impl OrderServiceClient {
    pub fn new(api_url: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(30))
            .connect_timeout(StdDuration::from_secs(10))
            .build()?;
        Ok(Self {
            api_url: api_url.into(),
            http_client,
        })
    }
}

#[async_trait]
impl OrderService for OrderServiceClient {
    async fn submit(&self, request: &OrderRequest) -> Result<OrderResponse> {
        let url = format!("{}/order", self.api_url);
        let response = self
            .http_client
            .post(&url)
            .json(&request.payload())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Api {
                message: format!("Order service error: {}", response.status()),
                status: Some(response.status().as_u16()),
            });
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_payload_uses_quote_order_qty() {
        let request =
            OrderRequest::market_buy_by_quote("BTCUSDT", 7, Decimal::new(100, 0));
        let payload = request.payload();
        assert_eq!(payload["side"], "BUY");
        assert_eq!(payload["type"], "MARKET");
        assert_eq!(payload["quoteOrderQty"], json!(Decimal::new(100, 0)));
        assert_eq!(payload["userId"], 7);
        assert_eq!(payload["operationType"], "AUTO");
        assert!(payload.get("quantity").is_none());
    }

    #[test]
    fn sell_payload_carries_qty_and_price() {
        let request = OrderRequest::limit_sell(
            "BTCUSDT",
            7,
            Decimal::new(45, 3),
            Decimal::new(6093666, 2),
        );
        let payload = request.payload();
        assert_eq!(payload["side"], "SELL");
        assert_eq!(payload["type"], "LIMIT");
        assert_eq!(payload["quantity"], json!(Decimal::new(45, 3)));
        assert_eq!(payload["price"], json!(Decimal::new(6093666, 2)));
    }

    #[test]
    fn error_response_never_yields_an_order_id() {
        let response = OrderResponse {
            status: "error".to_string(),
            order: None,
            detail: Some("insufficient balance".to_string()),
        };
        assert!(!response.is_success());
        assert!(response.order_id().is_err());
    }

    #[test]
    fn success_response_yields_the_order_id() {
        let response: OrderResponse = serde_json::from_str(
            r#"{"status": "success", "order": {"orderId": 42187}}"#,
        )
        .unwrap();
        assert!(response.is_success());
        assert_eq!(response.order_id().unwrap(), 42187);
    }

    #[test]
    fn client_order_ids_are_unique_per_request() {
        let a = OrderRequest::market_buy_by_quote("BTCUSDT", 7, Decimal::ONE);
        let b = OrderRequest::market_buy_by_quote("BTCUSDT", 7, Decimal::ONE);
        assert_ne!(a.client_order_id, b.client_order_id);
    }
}
