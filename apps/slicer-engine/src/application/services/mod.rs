//! Application services: the engine, the monitor, the conditional order
//! service and the state they share.

pub mod conditional;
pub mod engine;
pub mod monitor;
pub mod shared_state;

#[cfg(test)]
pub(crate) mod test_support;

pub use conditional::{
    ConditionalOrderService, ConditionalServiceError, ConditionalStats, PlaceBracketParams,
    PlaceEntryBracketParams, PlaceStopOrderParams, ReconcileSummary,
};
pub use engine::{EngineError, FeeRates, SliceExecutionEngine};
pub use monitor::{FillEvent, MonitorConfig, MonitorMessage, OrderMonitor};
pub use shared_state::SharedState;
