//! In-memory repositories for testing and development.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::application::ports::{
    ConditionalOrderRepository, ExecutionRepository, StorageError,
};
use crate::domain::conditional::ConditionalOrder;
use crate::domain::execution::Execution;
use crate::domain::shared::{ExecutionId, OrderId};

/// In-memory implementation of `ExecutionRepository`.
///
/// Suitable for testing and development. Not for production use.
#[derive(Debug, Default)]
pub struct InMemoryExecutionRepository {
    executions: RwLock<HashMap<ExecutionId, Execution>>,
}

impl InMemoryExecutionRepository {
    /// Create a new empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored executions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.executions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the repository is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ExecutionRepository for InMemoryExecutionRepository {
    async fn save(&self, execution: &Execution) -> Result<(), StorageError> {
        self.executions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(execution.id.clone(), execution.clone());
        Ok(())
    }

    async fn get(&self, id: &ExecutionId) -> Result<Option<Execution>, StorageError> {
        Ok(self
            .executions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Execution>, StorageError> {
        Ok(self
            .executions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect())
    }

    async fn delete(&self, id: &ExecutionId) -> Result<bool, StorageError> {
        Ok(self
            .executions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some())
    }
}

/// In-memory implementation of `ConditionalOrderRepository`.
#[derive(Debug, Default)]
pub struct InMemoryConditionalOrderRepository {
    orders: RwLock<HashMap<OrderId, ConditionalOrder>>,
}

impl InMemoryConditionalOrderRepository {
    /// Create a new empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the repository is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ConditionalOrderRepository for InMemoryConditionalOrderRepository {
    async fn save(&self, order: &ConditionalOrder) -> Result<(), StorageError> {
        self.orders
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(order.order_id().clone(), order.clone());
        Ok(())
    }

    async fn get(&self, order_id: &OrderId) -> Result<Option<ConditionalOrder>, StorageError> {
        Ok(self
            .orders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(order_id)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<ConditionalOrder>, StorageError> {
        Ok(self
            .orders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect())
    }

    async fn delete(&self, order_id: &OrderId) -> Result<bool, StorageError> {
        Ok(self
            .orders
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(order_id)
            .is_some())
    }
}
