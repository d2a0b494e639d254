//! Database operations for buy quotas.

use crate::types::Quota;
use crate::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};

/// Persistence port for per-(user, symbol) buy budgets.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Every configured quota row; this is also the set of pairs the
    /// engine processes each tick.
    async fn list(&self) -> Result<Vec<Quota>>;

    /// Add a confirmed spend to `quota_used`. The update is a single
    /// in-place row mutation, atomic relative to concurrent readers.
    async fn increment_used(&self, id: i64, amount: Decimal) -> Result<()>;
}

/// PostgreSQL-backed [`QuotaStore`].
pub struct QuotaRepository {
    pool: PgPool,
}

impl QuotaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuotaStore for QuotaRepository {
    async fn list(&self) -> Result<Vec<Quota>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, symbol, quota_limit, quota_used
            FROM auto_quotas
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| Quota {
                id: r.get("id"),
                user_id: r.get("user_id"),
                symbol: r.get("symbol"),
                quota_limit: r.get("quota_limit"),
                quota_used: r.get("quota_used"),
            })
            .collect())
    }

    async fn increment_used(&self, id: i64, amount: Decimal) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE auto_quotas
            SET quota_used = quota_used + $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(amount)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
