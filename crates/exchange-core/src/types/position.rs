//! Position lifecycle types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a position. Transitions are monotonic:
/// `Open -> PendingSell -> Closed`, and `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    /// No sell quoted yet; counts toward exposure and sell aggregation.
    Open,
    /// An aggregated sell has been placed, awaiting fill confirmation.
    PendingSell,
    /// The sell was confirmed filled; permanently excluded from processing.
    Closed,
}

/// One tracked buy execution, as persisted in `auto_positions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Exchange order id of the buy that opened this position.
    pub trade_id: i64,
    pub user_id: i64,
    pub symbol: String,
    pub purchase_date: DateTime<Utc>,
    /// Order id of the aggregated sell covering this position, once placed.
    pub sell_trade_id: Option<i64>,
    /// Set only once the aggregated sell is confirmed filled.
    pub sell_date: Option<DateTime<Utc>>,
}

impl Position {
    pub fn state(&self) -> PositionState {
        match (self.sell_trade_id, self.sell_date) {
            (None, _) => PositionState::Open,
            (Some(_), None) => PositionState::PendingSell,
            (Some(_), Some(_)) => PositionState::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == PositionState::Open
    }
}

/// An open position joined to its originating buy trade, carrying the
/// figures sell aggregation needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenLot {
    pub trade_id: i64,
    pub qty: Decimal,
    pub price: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(sell_trade_id: Option<i64>, sold: bool) -> Position {
        Position {
            trade_id: 1,
            user_id: 7,
            symbol: "BTCUSDT".to_string(),
            purchase_date: Utc::now(),
            sell_trade_id,
            sell_date: sold.then(Utc::now),
        }
    }

    #[test]
    fn state_follows_sell_columns() {
        assert_eq!(position(None, false).state(), PositionState::Open);
        assert_eq!(position(Some(9), false).state(), PositionState::PendingSell);
        assert_eq!(position(Some(9), true).state(), PositionState::Closed);
    }
}
