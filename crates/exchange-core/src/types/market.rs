//! Exchange-imposed trading constraints and order fill reports.

use super::OrderStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Authoritative per-symbol constraints fetched from the exchange.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SymbolFilters {
    /// Quantity granularity (LOT_SIZE filter).
    pub step_size: Decimal,
    /// Price granularity (PRICE_FILTER filter).
    pub tick_size: Decimal,
    /// Minimum accepted price x quantity value (NOTIONAL filter).
    pub min_notional: Decimal,
}

/// Current fill state of an order as reported by the exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFill {
    pub status: OrderStatus,
    pub executed_qty: Decimal,
    pub executed_quote_qty: Decimal,
}
