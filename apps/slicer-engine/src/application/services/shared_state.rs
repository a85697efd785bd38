//! Cross-task shared state for in-flight orders.
//!
//! Three independent locks guard three independent maps: the execution
//! table (aggregates plus the child-order index), the conditional tracking
//! index, and the filled-order dedup set. No code path ever holds more than
//! one of these locks at a time, so lock ordering never matters.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::conditional::ConditionalKind;
use crate::domain::execution::Execution;
use crate::domain::shared::{ExecutionId, OrderId};
use crate::domain::strategy::FillInfo;

/// Lock acquisition that survives a poisoned mutex (a panicked writer left
/// the data in a consistent-enough state for bookkeeping to continue).
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct ExecutionTable {
    executions: HashMap<ExecutionId, Execution>,
    order_index: HashMap<OrderId, ExecutionId>,
}

/// Shared mutable state for the engine, the monitor and push callbacks.
#[derive(Debug, Default)]
pub struct SharedState {
    executions: Mutex<ExecutionTable>,
    conditional_index: Mutex<HashMap<OrderId, ConditionalKind>>,
    filled: Mutex<HashSet<OrderId>>,
}

impl SharedState {
    /// Empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new execution aggregate.
    pub fn register_execution(&self, execution: Execution) {
        lock(&self.executions)
            .executions
            .insert(execution.id.clone(), execution);
    }

    /// Index a child order back to its parent execution.
    pub fn index_order(&self, order_id: OrderId, execution_id: ExecutionId) {
        lock(&self.executions)
            .order_index
            .insert(order_id, execution_id);
    }

    /// Whether a child order belongs to a tracked execution.
    #[must_use]
    pub fn is_strategy_order(&self, order_id: &OrderId) -> bool {
        lock(&self.executions).order_index.contains_key(order_id)
    }

    /// Clone the current aggregate state (for persistence checkpoints).
    #[must_use]
    pub fn execution_snapshot(&self, id: &ExecutionId) -> Option<Execution> {
        lock(&self.executions).executions.get(id).cloned()
    }

    /// Mutate an execution under the execution-map lock.
    pub fn with_execution<R>(
        &self,
        id: &ExecutionId,
        f: impl FnOnce(&mut Execution) -> R,
    ) -> Option<R> {
        lock(&self.executions).executions.get_mut(id).map(f)
    }

    /// Drop an execution and its order index entries.
    pub fn remove_execution(&self, id: &ExecutionId) -> Option<Execution> {
        let mut table = lock(&self.executions);
        table.order_index.retain(|_, exec_id| exec_id != id);
        table.executions.remove(id)
    }

    /// Track a conditional order by exchange order id.
    pub fn track_conditional(&self, order_id: OrderId, kind: ConditionalKind) {
        lock(&self.conditional_index).insert(order_id, kind);
    }

    /// Shape of a tracked conditional order, if any.
    #[must_use]
    pub fn conditional_kind(&self, order_id: &OrderId) -> Option<ConditionalKind> {
        lock(&self.conditional_index).get(order_id).copied()
    }

    /// Stop tracking a conditional order (it reached a terminal state).
    pub fn untrack_conditional(&self, order_id: &OrderId) {
        lock(&self.conditional_index).remove(order_id);
    }

    /// Whether anything at all is being tracked.
    #[must_use]
    pub fn has_tracked_orders(&self) -> bool {
        if !lock(&self.executions).order_index.is_empty() {
            return true;
        }
        !lock(&self.conditional_index).is_empty()
    }

    /// Whether an order's fill was already counted.
    #[must_use]
    pub fn already_filled(&self, order_id: &OrderId) -> bool {
        lock(&self.filled).contains(order_id)
    }

    /// Fold a fill into the parent execution exactly once.
    ///
    /// Returns the parent execution id when the fill was newly applied,
    /// `None` when the order is unknown or was already counted — the dedup
    /// guarantee that makes poll and push delivery safe to combine.
    pub fn apply_fill(&self, order_id: &OrderId, fill: &FillInfo) -> Option<ExecutionId> {
        let execution_id = lock(&self.executions).order_index.get(order_id).cloned()?;
        if !lock(&self.filled).insert(order_id.clone()) {
            return None;
        }
        if let Some(execution) = lock(&self.executions).executions.get_mut(&execution_id) {
            execution.apply_fill(fill);
        }
        Some(execution_id)
    }
}
