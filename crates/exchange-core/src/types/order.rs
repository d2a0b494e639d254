//! Order status and provenance enums.

use serde::{Deserialize, Serialize};

/// Exchange-reported status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
}

impl OrderStatus {
    /// Parse the exchange wire representation; anything unknown maps to `New`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "PARTIALLY_FILLED" => OrderStatus::PartiallyFilled,
            "FILLED" => OrderStatus::Filled,
            "CANCELED" => OrderStatus::Canceled,
            "REJECTED" => OrderStatus::Rejected,
            "EXPIRED" => OrderStatus::Expired,
            _ => OrderStatus::New,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Expired => "EXPIRED",
        }
    }

    /// The terminal state that closes the positions behind an aggregated sell.
    pub fn is_filled(&self) -> bool {
        matches!(self, OrderStatus::Filled)
    }
}

/// How an order originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
    /// Placed by the automated trading engine.
    Auto,
    /// Placed by the scheduled daily-purchase job.
    Daily,
    /// Placed by a human through the API.
    Manual,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Auto => "AUTO",
            OperationType::Daily => "DAILY",
            OperationType::Manual => "MANUAL",
        }
    }
}
