//! Database operations for trade records.

use crate::types::OrderStatus;
use crate::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

/// Persistence port for the `trades` table. The engine only ever mutates
/// a trade row when fill reconciliation confirms a limit sell.
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Record the executed figures for a filled order.
    async fn mark_filled(
        &self,
        order_id: i64,
        status: OrderStatus,
        qty: Decimal,
        quote_qty: Decimal,
    ) -> Result<()>;
}

/// PostgreSQL-backed [`TradeStore`].
pub struct TradeRepository {
    pool: PgPool,
}

impl TradeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TradeStore for TradeRepository {
    async fn mark_filled(
        &self,
        order_id: i64,
        status: OrderStatus,
        qty: Decimal,
        quote_qty: Decimal,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE trades
            SET status = $2, qty = $3, quote_qty = $4
            WHERE order_id = $1
            "#,
        )
        .bind(order_id)
        .bind(status.as_str())
        .bind(qty)
        .bind(quote_qty)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
