//! Repository ports (driven ports) for durable state.
//!
//! The engine checkpoints after every slice, so `save` must be an
//! O(1)-ish upsert keyed by id.

use async_trait::async_trait;

use crate::domain::conditional::ConditionalOrder;
use crate::domain::execution::Execution;
use crate::domain::shared::{ExecutionId, OrderId};

/// Persistence failure. The only error class that aborts an execution.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Underlying I/O failure.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload could not be encoded or decoded.
    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific failure.
    #[error("Storage error: {message}")]
    Backend {
        /// Error details.
        message: String,
    },
}

/// Repository for execution aggregates.
#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    /// Upsert an execution (idempotent, total rewrite).
    async fn save(&self, execution: &Execution) -> Result<(), StorageError>;

    /// Load an execution by id.
    async fn get(&self, id: &ExecutionId) -> Result<Option<Execution>, StorageError>;

    /// List all stored executions.
    async fn list(&self) -> Result<Vec<Execution>, StorageError>;

    /// Delete an execution; returns whether it existed.
    async fn delete(&self, id: &ExecutionId) -> Result<bool, StorageError>;
}

/// Repository for conditional orders of every shape, keyed by exchange
/// order id.
#[async_trait]
pub trait ConditionalOrderRepository: Send + Sync {
    /// Upsert a conditional order.
    async fn save(&self, order: &ConditionalOrder) -> Result<(), StorageError>;

    /// Load a conditional order by exchange order id.
    async fn get(&self, order_id: &OrderId) -> Result<Option<ConditionalOrder>, StorageError>;

    /// List all stored conditional orders.
    async fn list(&self) -> Result<Vec<ConditionalOrder>, StorageError>;

    /// Delete a conditional order; returns whether it existed.
    async fn delete(&self, order_id: &OrderId) -> Result<bool, StorageError>;
}
