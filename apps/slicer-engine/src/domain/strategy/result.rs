//! Strategy outcome snapshot and fill bookkeeping.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::shared::ExecutionId;

/// Lifecycle of a strategy run as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyStatus {
    /// Created, no slice attempted yet.
    Pending,
    /// At least one slice attempted, schedule still running.
    Active,
    /// Every slice accounted for (filled, skipped, or failed).
    Completed,
    /// Cancelled before the schedule finished.
    Cancelled,
}

/// Fill data for one child order, real or estimated.
///
/// The engine hands the strategy a synthetic estimate at placement time; the
/// authoritative numbers arrive later from the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillInfo {
    /// Filled size in base currency.
    pub size: Decimal,
    /// Filled value in quote currency.
    pub value: Decimal,
    /// Fees paid in quote currency.
    pub fees: Decimal,
    /// Whether the fill provided liquidity.
    pub is_maker: bool,
}

impl FillInfo {
    /// Build a fill record from size, price and fee.
    #[must_use]
    pub fn new(size: Decimal, price: Decimal, fees: Decimal, is_maker: bool) -> Self {
        Self {
            size,
            value: size * price,
            fees,
            is_maker,
        }
    }
}

/// Aggregate snapshot of one strategy run.
///
/// Derived on demand from completed-slice records; never the persistence
/// source of truth (the execution aggregate is).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyResult {
    /// Execution identifier.
    pub id: ExecutionId,
    /// Current lifecycle status.
    pub status: StrategyStatus,
    /// Requested total size.
    pub total_size: Decimal,
    /// Size filled so far (estimates until reconciled).
    pub total_filled: Decimal,
    /// Quote value filled so far.
    pub total_value: Decimal,
    /// Fees accrued so far.
    pub total_fees: Decimal,
    /// Volume-weighted average fill price, if anything filled.
    pub average_price: Option<Decimal>,
    /// Benchmark VWAP for slippage scoring, if the strategy computes one.
    pub vwap: Option<Decimal>,
    /// Number of slices in the schedule.
    pub num_slices: u32,
    /// Slices that placed an order.
    pub num_filled: u32,
    /// Slices skipped or failed.
    pub num_failed: u32,
    /// Strategy-specific extras (slippage, profile shape, ...).
    pub metadata: BTreeMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn fill_info_derives_value_from_price() {
        let fill = FillInfo::new(dec!(0.5), dec!(50_000), dec!(12.5), true);
        assert_eq!(fill.value, dec!(25_000));
        assert!(fill.is_maker);
    }

    #[test]
    fn status_serde_casing() {
        let json = serde_json::to_string(&StrategyStatus::Completed).unwrap();
        assert_eq!(json, "\"COMPLETED\"");
    }
}
