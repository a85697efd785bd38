//! Execution bounded context.

pub mod aggregate;

pub use aggregate::{Execution, ExecutionStatus, SliceFailure, SliceOutcome, SliceRecord};
