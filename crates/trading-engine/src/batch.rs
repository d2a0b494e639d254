//! Aggregation of open positions into one sell batch.

use exchange_core::types::OpenLot;
use rust_decimal::Decimal;

/// The combined figures for all open lots of a (user, symbol) pair.
///
/// Built from plain sums, so the result is invariant to the input
/// ordering of the lots.
#[derive(Debug, Clone)]
pub struct SellBatch {
    /// Buy order ids of every position included in the batch.
    pub trade_ids: Vec<i64>,
    pub total_qty: Decimal,
    /// Quantity-weighted average entry price. Tying the sell target to
    /// actual cost basis rather than spot price.
    pub avg_price: Decimal,
}

impl SellBatch {
    /// Aggregate open lots. Returns `None` when the lots sum to a
    /// non-positive quantity (inconsistent data, nothing to sell).
    pub fn from_lots(lots: &[OpenLot]) -> Option<Self> {
        let total_qty: Decimal = lots.iter().map(|lot| lot.qty).sum();
        if total_qty <= Decimal::ZERO {
            return None;
        }
        let total_cost: Decimal = lots.iter().map(|lot| lot.qty * lot.price).sum();

        Some(Self {
            trade_ids: lots.iter().map(|lot| lot.trade_id).collect(),
            total_qty,
            avg_price: total_cost / total_qty,
        })
    }

    /// Limit price target: average entry marked up by `threshold_pct` percent.
    pub fn target_price(&self, threshold_pct: Decimal) -> Decimal {
        self.avg_price * (Decimal::ONE + threshold_pct / Decimal::ONE_HUNDRED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn lot(trade_id: i64, qty: &str, price: &str) -> OpenLot {
        OpenLot {
            trade_id,
            qty: dec(qty),
            price: dec(price),
        }
    }

    #[test]
    fn aggregates_total_qty_and_weighted_average() {
        let lots = vec![
            lot(1, "0.01", "60000"),
            lot(2, "0.02", "60500"),
            lot(3, "0.015", "61000"),
        ];
        let batch = SellBatch::from_lots(&lots).unwrap();

        assert_eq!(batch.total_qty, dec("0.045"));
        // (0.01*60000 + 0.02*60500 + 0.015*61000) / 0.045
        assert_eq!(batch.avg_price, dec("2725") / dec("0.045"));
        assert_eq!(batch.trade_ids, vec![1, 2, 3]);
    }

    #[test]
    fn aggregation_is_order_invariant() {
        let forward = vec![
            lot(1, "0.01", "60000"),
            lot(2, "0.02", "60500"),
            lot(3, "0.015", "61000"),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let a = SellBatch::from_lots(&forward).unwrap();
        let b = SellBatch::from_lots(&reversed).unwrap();
        assert_eq!(a.total_qty, b.total_qty);
        assert_eq!(a.avg_price, b.avg_price);
    }

    #[test]
    fn target_price_applies_percent_markup() {
        let batch = SellBatch::from_lots(&[lot(1, "0.5", "60000")]).unwrap();
        assert_eq!(batch.target_price(dec("1.0")), dec("60600"));
        assert_eq!(batch.target_price(Decimal::ZERO), dec("60000"));
    }

    #[test]
    fn zero_quantity_yields_no_batch() {
        assert!(SellBatch::from_lots(&[]).is_none());
        assert!(SellBatch::from_lots(&[lot(1, "0", "60000")]).is_none());
    }
}
