//! Driven ports: interfaces the application layer depends on.

pub mod exchange_port;
pub mod repository_port;

pub use exchange_port::{
    BracketOrderRequest, CancelResult, EntryBracketOrderRequest, ExchangeError,
    ExchangeOrderStatus, ExchangePort, FillSummary, Granularity, LimitOrderRequest, OrderSnapshot,
    PriceSnapshot, StopLimitOrderRequest,
};
pub use repository_port::{ConditionalOrderRepository, ExecutionRepository, StorageError};
