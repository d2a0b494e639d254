//! Auto Trader
//!
//! Headless polling daemon that reconciles sell fills, aggregates open
//! positions into limit sells, and admits quota-bounded buys.

use anyhow::Result;
use exchange_core::api::{BinanceGateway, OrderServiceClient};
use exchange_core::config::Config;
use exchange_core::db::{
    create_pool, run_migrations, PositionRepository, QuotaRepository, TradeRepository,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trading_engine::AutoTrader;

const HEALTH_FILE: &str = "/tmp/healthy";

fn touch_health_file() {
    let _ = std::fs::write(HEALTH_FILE, format!("{}", chrono::Utc::now().timestamp()));
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    // Filter out noisy crates to keep the log volume manageable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auto_trader=info,trading_engine=info,exchange_core=warn,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Auto Trader");
    touch_health_file();

    // Load configuration
    let config = Config::from_env()?;

    // Database
    let pool = create_pool(&config.database).await?;
    run_migrations(&pool).await?;
    info!("Database connected and migrations applied");

    // External collaborators
    let gateway = Arc::new(BinanceGateway::new(
        config.exchange.rest_url.clone(),
        config.exchange.api_key.clone(),
        config.exchange.api_secret.clone(),
    )?);
    let orders = Arc::new(OrderServiceClient::new(config.order_service.url.clone())?);

    let engine = AutoTrader::new(
        Arc::new(PositionRepository::new(pool.clone())),
        Arc::new(TradeRepository::new(pool.clone())),
        Arc::new(QuotaRepository::new(pool.clone())),
        gateway,
        orders,
        config.engine,
    );

    // Repair any bookkeeping gaps left by a previous crash before the
    // first tick runs.
    engine.recover_on_start().await?;

    engine.run().await?;

    Ok(())
}
