//! API clients for the engine's external collaborators.

pub mod exchange;
pub mod orders;

pub use exchange::{BinanceGateway, ExchangeGateway};
pub use orders::{OrderKind, OrderRequest, OrderResponse, OrderService, OrderServiceClient, PlacedOrder};
