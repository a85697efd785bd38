//! Domain layer: pure business logic with no I/O.

pub mod conditional;
pub mod execution;
pub mod shared;
pub mod strategy;
