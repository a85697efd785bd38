//! Conditional order bounded context.
//!
//! Three long-lived order shapes with explicit state machines, persisted
//! across restarts: stop-limit (stop-loss or take-profit), bracket (TP/SL
//! pair protecting an existing position), and attached bracket (entry order
//! whose TP/SL pair activates after the entry fills).

pub mod attached;
pub mod bracket;
pub mod stop_limit;

pub use attached::AttachedBracketOrder;
pub use bracket::BracketOrder;
pub use stop_limit::{StopDirection, StopLimitOrder, TriggerKind};

use serde::{Deserialize, Serialize};

/// Which conditional shape an order id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionalKind {
    /// Single stop-limit order.
    StopLimit,
    /// TP/SL pair for an existing position.
    Bracket,
    /// Entry order with attached TP/SL pair.
    AttachedBracket,
}

/// Unified status vocabulary across the three shapes.
///
/// Each shape accepts only its own subset; `apply_status` rejects the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionalStatus {
    /// Waiting for the trigger (or for the entry to fill).
    Pending,
    /// Stop trigger fired, limit order working.
    Triggered,
    /// Bracket accepted and working on the exchange.
    Active,
    /// Attached bracket's entry order filled; TP/SL pair now live.
    EntryFilled,
    /// Take-profit leg filled.
    TpFilled,
    /// Stop-loss leg filled.
    SlFilled,
    /// Order filled.
    Filled,
    /// Order cancelled (locally, by the exchange, or by reconciliation).
    Cancelled,
    /// Order expired on the exchange.
    Expired,
}

/// State-machine violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionalError {
    /// Status not in the shape's reachable set.
    #[error("Status {status:?} is not valid for a {kind:?} order")]
    InvalidStatus {
        /// Shape being mutated.
        kind: ConditionalKind,
        /// Rejected status.
        status: ConditionalStatus,
    },

    /// Mutation attempted on an order already in a terminal state.
    #[error("Order {order_id} is already completed ({status:?})")]
    AlreadyCompleted {
        /// Order identifier.
        order_id: String,
        /// Terminal status it sits in.
        status: ConditionalStatus,
    },
}

/// One conditional order of any shape, as stored and tracked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionalOrder {
    /// Stop-limit order.
    StopLimit(StopLimitOrder),
    /// Bracket order.
    Bracket(BracketOrder),
    /// Entry + attached bracket.
    AttachedBracket(AttachedBracketOrder),
}

impl ConditionalOrder {
    /// Exchange order id (the tracking key).
    #[must_use]
    pub fn order_id(&self) -> &crate::domain::shared::OrderId {
        match self {
            Self::StopLimit(o) => &o.order_id,
            Self::Bracket(o) => &o.order_id,
            Self::AttachedBracket(o) => &o.order_id,
        }
    }

    /// Shape discriminant.
    #[must_use]
    pub const fn conditional_kind(&self) -> ConditionalKind {
        match self {
            Self::StopLimit(_) => ConditionalKind::StopLimit,
            Self::Bracket(_) => ConditionalKind::Bracket,
            Self::AttachedBracket(_) => ConditionalKind::AttachedBracket,
        }
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> ConditionalStatus {
        match self {
            Self::StopLimit(o) => o.status,
            Self::Bracket(o) => o.status,
            Self::AttachedBracket(o) => o.status,
        }
    }

    /// Whether the order can still trade.
    #[must_use]
    pub fn is_active(&self) -> bool {
        match self {
            Self::StopLimit(o) => o.is_active(),
            Self::Bracket(o) => o.is_active(),
            Self::AttachedBracket(o) => o.is_active(),
        }
    }

    /// Whether the order reached a terminal state.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        match self {
            Self::StopLimit(o) => o.is_completed(),
            Self::Bracket(o) => o.is_completed(),
            Self::AttachedBracket(o) => o.is_completed(),
        }
    }

    /// Apply a status transition, merging fill deltas into the
    /// shape-specific accumulators.
    pub fn apply_status(
        &mut self,
        status: ConditionalStatus,
        fill: Option<&crate::domain::strategy::FillInfo>,
    ) -> Result<(), ConditionalError> {
        match self {
            Self::StopLimit(o) => o.apply_status(status, fill),
            Self::Bracket(o) => o.apply_status(status, fill),
            Self::AttachedBracket(o) => o.apply_status(status, fill),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serde_casing() {
        assert_eq!(
            serde_json::to_string(&ConditionalKind::AttachedBracket).unwrap(),
            "\"attached_bracket\""
        );
        assert_eq!(
            serde_json::to_string(&ConditionalStatus::TpFilled).unwrap(),
            "\"TP_FILLED\""
        );
    }
}
