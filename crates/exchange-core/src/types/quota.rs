//! Per-user, per-symbol spending quotas.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Spending ceiling for automated buys on one (user, symbol) pair.
///
/// `quota_used` only ever increases through the engine; replenishment is
/// an external administrative action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quota {
    pub id: i64,
    pub user_id: i64,
    pub symbol: String,
    pub quota_limit: Decimal,
    pub quota_used: Decimal,
}

impl Quota {
    /// Budget still available for automated buys. May go non-positive
    /// after rounding; admission treats that as exhausted.
    pub fn remaining(&self) -> Decimal {
        self.quota_limit - self.quota_used
    }
}
