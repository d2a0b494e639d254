//! Domain types shared across the auto-trader crates.

mod market;
mod order;
mod position;
mod quota;

pub use market::{OrderFill, SymbolFilters};
pub use order::{OperationType, OrderStatus};
pub use position::{OpenLot, Position, PositionState};
pub use quota::Quota;
