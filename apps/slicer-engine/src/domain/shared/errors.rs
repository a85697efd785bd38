//! Domain-level validation errors shared across bounded contexts.

use rust_decimal::Decimal;

use crate::domain::shared::value_objects::OrderSide;

/// Validation failures raised when constructing domain objects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Product identifier is not in `BASE-QUOTE` form.
    #[error("Invalid product identifier: {value}")]
    InvalidProduct {
        /// The offending input.
        value: String,
    },

    /// Order size must be strictly positive.
    #[error("Order size must be positive, got {size}")]
    NonPositiveSize {
        /// The offending size.
        size: Decimal,
    },

    /// Slice or order count must be at least one.
    #[error("Slice count must be at least 1, got {count}")]
    InvalidSliceCount {
        /// The offending count.
        count: u32,
    },

    /// Execution duration must be strictly positive.
    #[error("Execution duration must be positive")]
    NonPositiveDuration,

    /// Price ladder bounds are inverted or non-positive.
    #[error("Invalid price range: low {low} must be positive and below high {high}")]
    InvalidPriceRange {
        /// Lower bound.
        low: Decimal,
        /// Upper bound.
        high: Decimal,
    },

    /// Bracket take-profit and stop-loss are on the wrong sides of each other.
    #[error(
        "Invalid bracket prices for {side}: take-profit {take_profit} vs stop-loss {stop_loss}"
    )]
    InvalidBracketPrices {
        /// Side of the exit order.
        side: OrderSide,
        /// Take-profit limit price.
        take_profit: Decimal,
        /// Stop-loss trigger price.
        stop_loss: Decimal,
    },
}
