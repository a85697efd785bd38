//! Repository implementations.

pub mod in_memory;
pub mod json_store;

pub use in_memory::{InMemoryConditionalOrderRepository, InMemoryExecutionRepository};
pub use json_store::JsonStore;
