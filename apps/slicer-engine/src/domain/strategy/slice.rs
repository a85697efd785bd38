//! Slice specification value objects.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a slice's abstract target price resolves against live market data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceType {
    /// Use the strategy's fixed limit price (or the slice's own ladder price).
    Limit,
    /// Use the live best bid.
    Bid,
    /// Use the live mid price.
    Mid,
    /// Use the live best ask.
    Ask,
}

/// One child-order specification produced by a strategy.
///
/// Immutable once produced by `calculate_slices`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceSpec {
    /// 1-based position in the schedule.
    pub slice_number: u32,
    /// Size in base currency.
    pub size: Decimal,
    /// Target price (limit price for ladder slices, reference otherwise).
    pub price: Decimal,
    /// When the slice becomes eligible for placement.
    pub scheduled_time: DateTime<Utc>,
    /// How the execution price resolves at placement time.
    pub price_type: PriceType,
}

impl SliceSpec {
    /// Create a new slice specification.
    #[must_use]
    pub const fn new(
        slice_number: u32,
        size: Decimal,
        price: Decimal,
        scheduled_time: DateTime<Utc>,
        price_type: PriceType,
    ) -> Self {
        Self {
            slice_number,
            size,
            price,
            scheduled_time,
            price_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn price_type_serde() {
        assert_eq!(serde_json::to_string(&PriceType::Mid).unwrap(), "\"mid\"");
        let parsed: PriceType = serde_json::from_str("\"ask\"").unwrap();
        assert_eq!(parsed, PriceType::Ask);
    }

    #[test]
    fn slice_spec_new() {
        let at = Utc::now();
        let slice = SliceSpec::new(1, dec!(0.25), dec!(50_000), at, PriceType::Limit);
        assert_eq!(slice.slice_number, 1);
        assert_eq!(slice.size, dec!(0.25));
        assert_eq!(slice.scheduled_time, at);
    }
}
