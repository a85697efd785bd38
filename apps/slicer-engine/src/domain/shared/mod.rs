//! Shared kernel: value objects and errors used by every bounded context.

pub mod errors;
pub mod value_objects;

pub use errors::DomainError;
pub use value_objects::{ClientOrderId, ExecutionId, OrderId, OrderSide, ProductId};
