//! Automated position & quota trading engine.
//!
//! Drives three phases per (user, symbol) pair per polling tick:
//! fill reconciliation, sell aggregation, and buy admission.

pub mod batch;
pub mod engine;
pub mod rounding;

pub use batch::SellBatch;
pub use engine::AutoTrader;
pub use rounding::floor_to_step;
