// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Slicer Engine - Rust Core Library
//!
//! Order scheduling and execution engine: splits large orders into TWAP,
//! VWAP or scaled price-ladder slices, walks the schedule against live
//! market and balance constraints, reconciles fills through a background
//! monitor, and tracks crash-recoverable conditional orders.
//!
//! # Architecture (Clean Architecture + DDD + Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: Core business logic (aggregates, value objects, state machines)
//!   - `strategy`: TWAP, VWAP, Scaled slicing strategies and schedules
//!   - `execution`: Execution aggregate, per-slice records, fill totals
//!   - `conditional`: Stop-limit, bracket and attached-bracket state machines
//!   - `shared`: Identifiers, products, sides, domain errors
//!
//! - **Application**: Use cases and orchestration
//!   - `ports`: Interfaces for external systems (`ExchangePort`, repositories)
//!   - `services`: `SliceExecutionEngine`, `OrderMonitor`,
//!     `ConditionalOrderService`, shared in-flight state
//!
//! - **Infrastructure**: Adapters (implementations)
//!   - `persistence`: Execution and conditional-order repositories
//!     (in-memory, JSON files)
//!
//! Cross-cutting: `resilience` (token-bucket rate limiting), `config`
//! (YAML configuration), `telemetry` (tracing setup).

// =============================================================================
// Clean Architecture Layers
// =============================================================================

pub mod application;
pub mod domain;
pub mod infrastructure;

// =============================================================================
// Cross-cutting Concerns
// =============================================================================

pub mod config;
pub mod resilience;
pub mod telemetry;

// Re-export the surface most callers need.
pub use application::ports::{
    ConditionalOrderRepository, ExchangeError, ExchangePort, ExecutionRepository, StorageError,
};
pub use application::services::{
    ConditionalOrderService, FeeRates, MonitorConfig, OrderMonitor, SharedState,
    SliceExecutionEngine,
};
pub use domain::strategy::{
    ScaledParams, ScaledStrategy, SliceStrategy, TwapParams, TwapStrategy, VwapParams,
    VwapStrategy,
};
pub use resilience::RateLimiter;
