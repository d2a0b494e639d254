//! Database operations for auto-trading positions.

use crate::types::{OpenLot, Position};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};

/// An automated buy that has a `trades` row but no matching position,
/// i.e. the order succeeded but local bookkeeping was lost.
#[derive(Debug, Clone)]
pub struct UnrecordedBuy {
    pub order_id: i64,
    pub user_id: i64,
    pub symbol: String,
    pub created_at: DateTime<Utc>,
}

/// Persistence port for positions. All queries are scoped by
/// `(user_id, symbol)` so concurrent pairs never touch overlapping rows.
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Record a new open position for a confirmed buy. Idempotent: a
    /// duplicate order id is a no-op, which makes startup repair safe.
    async fn insert_open(
        &self,
        trade_id: i64,
        user_id: i64,
        symbol: &str,
        purchase_date: DateTime<Utc>,
    ) -> Result<()>;

    /// Open positions (no sell quoted yet) purchased at or after `since`,
    /// joined to their buy trade for quantity and entry price.
    async fn list_open_lots(
        &self,
        user_id: i64,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<OpenLot>>;

    /// Positions with a sell placed but not yet confirmed filled.
    async fn list_pending_fills(&self, user_id: i64, symbol: &str) -> Result<Vec<Position>>;

    /// Stamp the aggregated sell's order id on every batched position.
    /// Only rows still without a sell are touched. Returns rows updated.
    async fn set_sell_trade_id(&self, trade_ids: &[i64], sell_trade_id: i64) -> Result<u64>;

    /// Close every position covered by a filled aggregated sell.
    /// Returns rows updated.
    async fn close_filled(&self, sell_trade_id: i64, sell_date: DateTime<Utc>) -> Result<u64>;

    /// Quote value currently locked in unsold positions for a pair.
    async fn open_exposure(&self, user_id: i64, symbol: &str) -> Result<Decimal>;

    /// Automated buys missing their position row (startup repair input).
    async fn find_unrecorded_buys(&self) -> Result<Vec<UnrecordedBuy>>;
}

/// PostgreSQL-backed [`PositionStore`].
pub struct PositionRepository {
    pool: PgPool,
}

impl PositionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PositionStore for PositionRepository {
    async fn insert_open(
        &self,
        trade_id: i64,
        user_id: i64,
        symbol: &str,
        purchase_date: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO auto_positions (trade_id, user_id, symbol, purchase_date)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (trade_id) DO NOTHING
            "#,
        )
        .bind(trade_id)
        .bind(user_id)
        .bind(symbol)
        .bind(purchase_date)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_open_lots(
        &self,
        user_id: i64,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<OpenLot>> {
        let rows = sqlx::query(
            r#"
            SELECT ap.trade_id, t.qty, t.price
            FROM auto_positions ap
            JOIN trades t ON t.order_id = ap.trade_id
            WHERE ap.user_id = $1
              AND ap.symbol = $2
              AND ap.sell_trade_id IS NULL
              AND ap.purchase_date >= $3
              AND t.side = 'BUY'
            ORDER BY ap.purchase_date ASC
            "#,
        )
        .bind(user_id)
        .bind(symbol)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| OpenLot {
                trade_id: r.get("trade_id"),
                qty: r.get("qty"),
                price: r.get::<Option<Decimal>, _>("price").unwrap_or_default(),
            })
            .collect())
    }

    async fn list_pending_fills(&self, user_id: i64, symbol: &str) -> Result<Vec<Position>> {
        let rows = sqlx::query(
            r#"
            SELECT trade_id, user_id, symbol, purchase_date, sell_trade_id, sell_date
            FROM auto_positions
            WHERE user_id = $1
              AND symbol = $2
              AND sell_trade_id IS NOT NULL
              AND sell_date IS NULL
            "#,
        )
        .bind(user_id)
        .bind(symbol)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| Position {
                trade_id: r.get("trade_id"),
                user_id: r.get("user_id"),
                symbol: r.get("symbol"),
                purchase_date: r.get("purchase_date"),
                sell_trade_id: r.get("sell_trade_id"),
                sell_date: r.get("sell_date"),
            })
            .collect())
    }

    async fn set_sell_trade_id(&self, trade_ids: &[i64], sell_trade_id: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE auto_positions
            SET sell_trade_id = $2
            WHERE trade_id = ANY($1)
              AND sell_trade_id IS NULL
            "#,
        )
        .bind(trade_ids)
        .bind(sell_trade_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn close_filled(&self, sell_trade_id: i64, sell_date: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE auto_positions
            SET sell_date = $2
            WHERE sell_trade_id = $1
              AND sell_date IS NULL
            "#,
        )
        .bind(sell_trade_id)
        .bind(sell_date)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn open_exposure(&self, user_id: i64, symbol: &str) -> Result<Decimal> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(t.quote_qty), 0) AS exposure
            FROM auto_positions ap
            JOIN trades t ON t.order_id = ap.trade_id
            WHERE ap.user_id = $1
              AND ap.symbol = $2
              AND ap.sell_date IS NULL
              AND t.side = 'BUY'
            "#,
        )
        .bind(user_id)
        .bind(symbol)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("exposure"))
    }

    async fn find_unrecorded_buys(&self) -> Result<Vec<UnrecordedBuy>> {
        let rows = sqlx::query(
            r#"
            SELECT t.order_id, t.user_id, t.symbol, t.created_at
            FROM trades t
            LEFT JOIN auto_positions ap ON ap.trade_id = t.order_id
            WHERE t.side = 'BUY'
              AND t.operation_type = 'AUTO'
              AND ap.trade_id IS NULL
            ORDER BY t.created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| UnrecordedBuy {
                order_id: r.get("order_id"),
                user_id: r.get("user_id"),
                symbol: r.get("symbol"),
                created_at: r.get("created_at"),
            })
            .collect())
    }
}
