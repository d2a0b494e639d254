//! The automated trading engine.
//!
//! Once per polling tick, for every configured (user, symbol) pair, the
//! engine runs three phases strictly in order:
//!
//! 1. **Fill reconciliation** — close positions behind filled sells.
//! 2. **Sell aggregation** — batch open positions into one limit sell.
//! 3. **Buy admission** — spend remaining quota, behind a cooldown.
//!
//! Buy admission runs last so the exposure it observes reflects the same
//! tick's reconciliation. Each phase has its own error boundary: a
//! transient failure is logged and the pair's next phase still runs.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use exchange_core::api::{ExchangeGateway, OrderRequest, OrderService};
use exchange_core::config::EngineConfig;
use exchange_core::db::{PositionStore, QuotaStore, TradeStore};
use exchange_core::types::Quota;
use exchange_core::Result;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{debug, info, warn};

use crate::batch::SellBatch;
use crate::rounding::floor_to_step;

/// Pair key for the in-memory cooldown ledger.
type PairKey = (i64, String);

/// The automated position & quota trading engine.
pub struct AutoTrader {
    positions: Arc<dyn PositionStore>,
    trades: Arc<dyn TradeStore>,
    quotas: Arc<dyn QuotaStore>,
    gateway: Arc<dyn ExchangeGateway>,
    orders: Arc<dyn OrderService>,
    config: EngineConfig,
    /// Last successful automated buy per pair. Process-lifetime only:
    /// a restart resets the cooldown.
    last_buy: DashMap<PairKey, DateTime<Utc>>,
}

impl AutoTrader {
    pub fn new(
        positions: Arc<dyn PositionStore>,
        trades: Arc<dyn TradeStore>,
        quotas: Arc<dyn QuotaStore>,
        gateway: Arc<dyn ExchangeGateway>,
        orders: Arc<dyn OrderService>,
        config: EngineConfig,
    ) -> Self {
        Self {
            positions,
            trades,
            quotas,
            gateway,
            orders,
            config,
            last_buy: DashMap::new(),
        }
    }

    /// Run the polling loop indefinitely.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!(
            poll_interval_secs = self.config.poll_interval_secs,
            sell_threshold_pct = %self.config.sell_threshold_pct,
            buy_delay_hours = self.config.buy_delay_hours,
            "Starting auto-trader loop"
        );

        let mut interval =
            tokio::time::interval(StdDuration::from_secs(self.config.poll_interval_secs));
        loop {
            interval.tick().await;
            if let Err(e) = self.tick().await {
                warn!(error = %e, "Tick failed, retrying next interval");
            }
        }
    }

    /// Close the gap left by a crash between order success and local
    /// bookkeeping: re-create position rows for automated buys that have a
    /// trade record but no position, then reconcile pending fills. Safe to
    /// run repeatedly; the repair insert is idempotent.
    pub async fn recover_on_start(&self) -> Result<()> {
        let orphans = self.positions.find_unrecorded_buys().await?;
        for buy in &orphans {
            warn!(
                order_id = buy.order_id,
                user_id = buy.user_id,
                symbol = %buy.symbol,
                "Repairing position row missing for confirmed buy"
            );
            self.positions
                .insert_open(buy.order_id, buy.user_id, &buy.symbol, buy.created_at)
                .await?;
        }
        if !orphans.is_empty() {
            info!(repaired = orphans.len(), "Startup position repair complete");
        }

        for quota in self.quotas.list().await? {
            if let Err(e) = self.reconcile_fills(quota.user_id, &quota.symbol).await {
                warn!(
                    user_id = quota.user_id,
                    symbol = %quota.symbol,
                    error = %e,
                    "Startup fill reconciliation failed for pair"
                );
            }
        }
        Ok(())
    }

    /// One pass over every configured pair.
    pub async fn tick(&self) -> Result<()> {
        for quota in self.quotas.list().await? {
            self.process_pair(&quota).await;
        }
        Ok(())
    }

    /// Run the three phases for one pair, each behind its own error
    /// boundary so a failing phase never blocks the next one.
    pub async fn process_pair(&self, quota: &Quota) {
        let mut quota = quota.clone();
        if let Err(e) = self.reconcile_fills(quota.user_id, &quota.symbol).await {
            warn!(
                user_id = quota.user_id,
                symbol = %quota.symbol,
                error = %e,
                "Fill reconciliation failed, retrying next tick"
            );
        }
        match self.place_aggregated_sell(&quota).await {
            // A supplementary buy inside the sell phase spends quota;
            // admission below must see that spend, not the stale
            // snapshot from the start of the tick.
            Ok(topped_up) => quota.quota_used += topped_up,
            Err(e) => warn!(
                user_id = quota.user_id,
                symbol = %quota.symbol,
                error = %e,
                "Sell aggregation failed, retrying next tick"
            ),
        }
        if let Err(e) = self.admit_buy(&quota).await {
            warn!(
                user_id = quota.user_id,
                symbol = %quota.symbol,
                error = %e,
                "Buy admission failed, retrying next tick"
            );
        }
    }

    /// Phase 1: detect exchange-side completion of previously placed
    /// aggregated sells and close every position they cover.
    async fn reconcile_fills(&self, user_id: i64, symbol: &str) -> Result<()> {
        let pending = self.positions.list_pending_fills(user_id, symbol).await?;
        if pending.is_empty() {
            return Ok(());
        }

        // One aggregated sell covers many positions; query each order once.
        let mut sell_ids: Vec<i64> = pending.iter().filter_map(|p| p.sell_trade_id).collect();
        sell_ids.sort_unstable();
        sell_ids.dedup();

        for sell_trade_id in sell_ids {
            let fill = match self.gateway.get_order_status(symbol, sell_trade_id).await {
                Ok(fill) => fill,
                Err(e) => {
                    warn!(
                        user_id,
                        symbol,
                        sell_trade_id,
                        error = %e,
                        "Sell status lookup failed, retrying next tick"
                    );
                    continue;
                }
            };

            if !fill.status.is_filled() {
                debug!(user_id, symbol, sell_trade_id, status = ?fill.status, "Sell not filled yet");
                continue;
            }

            self.trades
                .mark_filled(
                    sell_trade_id,
                    fill.status,
                    fill.executed_qty,
                    fill.executed_quote_qty,
                )
                .await?;
            let closed = self.positions.close_filled(sell_trade_id, Utc::now()).await?;
            info!(
                user_id,
                symbol,
                sell_trade_id,
                closed,
                executed_qty = %fill.executed_qty,
                executed_quote_qty = %fill.executed_quote_qty,
                "Aggregated sell filled, positions closed"
            );
        }
        Ok(())
    }

    /// Phase 2: batch all open positions into one exchange-compliant
    /// limit sell at the configured markup over cost basis. Returns the
    /// quote amount spent on a supplementary buy, if one was placed.
    async fn place_aggregated_sell(&self, quota: &Quota) -> Result<Decimal> {
        let lots = self
            .positions
            .list_open_lots(quota.user_id, &quota.symbol, self.config.position_cutoff)
            .await?;
        if lots.is_empty() {
            return Ok(Decimal::ZERO);
        }

        let Some(batch) = SellBatch::from_lots(&lots) else {
            warn!(
                user_id = quota.user_id,
                symbol = %quota.symbol,
                lots = lots.len(),
                "Open lots sum to zero quantity, skipping pair"
            );
            return Ok(Decimal::ZERO);
        };

        let filters = self.gateway.get_symbol_filters(&quota.symbol).await?;
        let qty = floor_to_step(batch.total_qty, filters.step_size);
        if qty <= Decimal::ZERO {
            warn!(
                user_id = quota.user_id,
                symbol = %quota.symbol,
                total_qty = %batch.total_qty,
                step_size = %filters.step_size,
                "Batch quantity floors to zero, skipping pair"
            );
            return Ok(Decimal::ZERO);
        }

        let limit_price = floor_to_step(
            batch.target_price(self.config.sell_threshold_pct),
            filters.tick_size,
        );
        let notional = qty * limit_price;
        if notional < filters.min_notional {
            info!(
                user_id = quota.user_id,
                symbol = %quota.symbol,
                notional = %notional,
                min_notional = %filters.min_notional,
                "Batch below minimum notional, not sellable yet"
            );
            if self.config.top_up_below_min_notional {
                return self.top_up_batch(quota, filters.min_notional - notional).await;
            }
            return Ok(Decimal::ZERO);
        }

        let request = OrderRequest::limit_sell(&quota.symbol, quota.user_id, qty, limit_price);
        let response = self.orders.submit(&request).await?;
        let sell_trade_id = response.order_id()?;

        let updated = self
            .positions
            .set_sell_trade_id(&batch.trade_ids, sell_trade_id)
            .await?;
        info!(
            user_id = quota.user_id,
            symbol = %quota.symbol,
            sell_trade_id,
            qty = %qty,
            limit_price = %limit_price,
            batched = updated,
            avg_entry = %batch.avg_price,
            "Aggregated limit sell placed"
        );
        Ok(Decimal::ZERO)
    }

    /// Optional policy: buy the shortfall so the batch clears the
    /// exchange minimum on a later tick. Spends quota but deliberately
    /// leaves the admission cooldown untouched. Returns the quote
    /// amount actually spent.
    async fn top_up_batch(&self, quota: &Quota, shortfall: Decimal) -> Result<Decimal> {
        let remaining = quota.remaining();
        if remaining <= Decimal::ZERO {
            debug!(
                user_id = quota.user_id,
                symbol = %quota.symbol,
                "No quota left for a supplementary buy"
            );
            return Ok(Decimal::ZERO);
        }
        let amount = shortfall.min(remaining);
        info!(
            user_id = quota.user_id,
            symbol = %quota.symbol,
            amount = %amount,
            "Placing supplementary buy to clear minimum notional"
        );
        if self.execute_buy(quota, amount).await? {
            Ok(amount)
        } else {
            Ok(Decimal::ZERO)
        }
    }

    /// Phase 3: spend remaining quota on a new market buy, subject to
    /// the cooldown between buys.
    async fn admit_buy(&self, quota: &Quota) -> Result<()> {
        let remaining = quota.remaining();
        if remaining <= Decimal::ZERO {
            debug!(
                user_id = quota.user_id,
                symbol = %quota.symbol,
                quota_used = %quota.quota_used,
                "Quota exhausted"
            );
            return Ok(());
        }

        let key: PairKey = (quota.user_id, quota.symbol.clone());
        let last = self.last_buy.get(&key).map(|entry| *entry);
        if let Some(last) = last {
            let elapsed = Utc::now().signed_duration_since(last);
            if elapsed < Duration::hours(self.config.buy_delay_hours) {
                debug!(
                    user_id = quota.user_id,
                    symbol = %quota.symbol,
                    elapsed_mins = elapsed.num_minutes(),
                    "Cooling down since last buy"
                );
                return Ok(());
            }
        }

        let exposure = self
            .positions
            .open_exposure(quota.user_id, &quota.symbol)
            .await?;
        let amount = match self.config.buy_increment_quote {
            Some(cap) => remaining.min(cap),
            None => remaining,
        };
        info!(
            user_id = quota.user_id,
            symbol = %quota.symbol,
            amount = %amount,
            remaining = %remaining,
            exposure = %exposure,
            "Submitting automated buy"
        );

        if self.execute_buy(quota, amount).await? {
            self.last_buy.insert(key, Utc::now());
        }
        Ok(())
    }

    /// Submit a market buy sized in quote currency and, on success,
    /// record the open position and the quota spend together. Returns
    /// whether the buy was accepted.
    async fn execute_buy(&self, quota: &Quota, amount: Decimal) -> Result<bool> {
        let request = OrderRequest::market_buy_by_quote(&quota.symbol, quota.user_id, amount);
        let response = self.orders.submit(&request).await?;
        if !response.is_success() {
            warn!(
                user_id = quota.user_id,
                symbol = %quota.symbol,
                detail = ?response.detail,
                "Buy rejected by order service, retrying next tick"
            );
            return Ok(false);
        }

        let order_id = response.order_id()?;
        self.positions
            .insert_open(order_id, quota.user_id, &quota.symbol, Utc::now())
            .await?;
        self.quotas.increment_used(quota.id, amount).await?;
        info!(
            user_id = quota.user_id,
            symbol = %quota.symbol,
            order_id,
            spent = %amount,
            "Buy confirmed, position opened and quota charged"
        );
        Ok(true)
    }
}
