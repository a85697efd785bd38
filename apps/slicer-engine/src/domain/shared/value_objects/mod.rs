//! Shared value objects.

pub mod identifiers;
pub mod product;
pub mod side;

pub use identifiers::{ClientOrderId, ExecutionId, OrderId};
pub use product::ProductId;
pub use side::OrderSide;
