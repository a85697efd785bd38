//! Execution aggregate: the persistence source of truth for one strategy run.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shared::{ExecutionId, OrderId, OrderSide, ProductId};
use crate::domain::strategy::{FillInfo, StrategyKind};

/// Lifecycle of an execution aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// Created, no slice attempted yet.
    Pending,
    /// Schedule in progress.
    Active,
    /// Schedule finished with a mix of placed and failed slices.
    Partial,
    /// Schedule finished and at least one slice placed.
    Completed,
    /// Cancelled before the schedule finished.
    Cancelled,
    /// Schedule finished with no slice placed.
    Error,
}

impl ExecutionStatus {
    /// Whether no further mutation is expected from the engine.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Error | Self::Partial)
    }
}

/// Why a slice did not place an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SliceFailure {
    /// Market snapshot fetch failed or returned nothing.
    PriceFetchFailed,
    /// Base-currency balance did not cover a SELL slice.
    BalanceInsufficient,
    /// Resolved price breached the limit; deliberate soft skip.
    PriceUnfavorable,
    /// Slice would exceed the participation cap (or volume was unknown).
    ParticipationCapped,
    /// Exchange rejected the order or the call failed.
    PlacementFailed,
}

/// Outcome of one slice attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SliceOutcome {
    /// Order placed.
    Placed,
    /// Skipped or failed with the recorded reason.
    Failed,
}

/// Per-slice record kept for crash recovery and post-trade reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceRecord {
    /// 1-based slice number.
    pub slice_number: u32,
    /// Placed or failed.
    pub outcome: SliceOutcome,
    /// Failure reason when not placed.
    pub failure: Option<SliceFailure>,
    /// Execution price used at placement.
    pub price: Option<Decimal>,
    /// Child order id when placed.
    pub order_id: Option<OrderId>,
    /// When the attempt concluded.
    pub at: DateTime<Utc>,
}

/// One TWAP/VWAP/Scaled execution.
///
/// Mutated only by the slice execution engine and the background monitor,
/// always under the execution-map lock. Fully serde round-trippable: this is
/// what the crash-recovery checkpoint persists after every slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    /// Execution identifier.
    pub id: ExecutionId,
    /// Product being traded.
    pub product: ProductId,
    /// Order side.
    pub side: OrderSide,
    /// Strategy variant driving the run.
    pub kind: StrategyKind,
    /// Requested total size.
    pub total_size: Decimal,
    /// Limit price bounding every slice.
    pub limit_price: Decimal,
    /// Number of slices in the schedule.
    pub num_slices: u32,
    /// Size placed so far (order submitted, fill pending or confirmed).
    pub placed_size: Decimal,
    /// Size confirmed filled.
    pub filled_size: Decimal,
    /// Quote value confirmed filled.
    pub filled_value: Decimal,
    /// Fees confirmed.
    pub total_fees: Decimal,
    /// Confirmed maker fills.
    pub maker_fills: u32,
    /// Confirmed taker fills.
    pub taker_fills: u32,
    /// Child orders placed, in slice order.
    pub order_ids: Vec<OrderId>,
    /// Per-slice attempt records.
    pub slice_records: Vec<SliceRecord>,
    /// Lifecycle status.
    pub status: ExecutionStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Execution {
    /// Create a pending execution for a computed schedule.
    #[must_use]
    pub fn new(
        id: ExecutionId,
        product: ProductId,
        side: OrderSide,
        kind: StrategyKind,
        total_size: Decimal,
        limit_price: Decimal,
        num_slices: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            product,
            side,
            kind,
            total_size,
            limit_price,
            num_slices,
            placed_size: Decimal::ZERO,
            filled_size: Decimal::ZERO,
            filled_value: Decimal::ZERO,
            total_fees: Decimal::ZERO,
            maker_fills: 0,
            taker_fills: 0,
            order_ids: Vec::new(),
            slice_records: Vec::new(),
            status: ExecutionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a placed slice.
    pub fn record_placed(&mut self, slice_number: u32, order_id: OrderId, size: Decimal, price: Decimal) {
        self.order_ids.push(order_id.clone());
        self.placed_size += size;
        self.slice_records.push(SliceRecord {
            slice_number,
            outcome: SliceOutcome::Placed,
            failure: None,
            price: Some(price),
            order_id: Some(order_id),
            at: Utc::now(),
        });
        self.status = ExecutionStatus::Active;
        self.touch();
    }

    /// Record a skipped or failed slice.
    pub fn record_failure(&mut self, slice_number: u32, failure: SliceFailure) {
        self.slice_records.push(SliceRecord {
            slice_number,
            outcome: SliceOutcome::Failed,
            failure: Some(failure),
            price: None,
            order_id: None,
            at: Utc::now(),
        });
        if self.status == ExecutionStatus::Pending {
            self.status = ExecutionStatus::Active;
        }
        self.touch();
    }

    /// Fold one confirmed fill into the running totals.
    ///
    /// Caller holds the execution-map lock; this is the read-modify-write
    /// half of the dedup-then-apply sequence.
    pub fn apply_fill(&mut self, fill: &FillInfo) {
        self.filled_size += fill.size;
        self.filled_value += fill.value;
        self.total_fees += fill.fees;
        if fill.is_maker {
            self.maker_fills += 1;
        } else {
            self.taker_fills += 1;
        }
        self.touch();
    }

    /// Settle the terminal status once the schedule is exhausted.
    pub fn finish(&mut self) {
        let placed = self
            .slice_records
            .iter()
            .filter(|r| r.outcome == SliceOutcome::Placed)
            .count();
        let failed = self.slice_records.len() - placed;
        self.status = if placed == 0 {
            ExecutionStatus::Error
        } else if failed > 0 {
            ExecutionStatus::Partial
        } else {
            ExecutionStatus::Completed
        };
        self.touch();
    }

    /// Mark the execution cancelled.
    pub fn cancel(&mut self) {
        self.status = ExecutionStatus::Cancelled;
        self.touch();
    }

    /// Slice numbers that failed, with reasons.
    #[must_use]
    pub fn failed_slices(&self) -> Vec<(u32, SliceFailure)> {
        self.slice_records
            .iter()
            .filter_map(|r| r.failure.map(|f| (r.slice_number, f)))
            .collect()
    }

    /// Volume-weighted average confirmed fill price.
    #[must_use]
    pub fn average_price(&self) -> Option<Decimal> {
        (self.filled_size > Decimal::ZERO).then(|| self.filled_value / self.filled_size)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn execution() -> Execution {
        Execution::new(
            ExecutionId::generate(),
            ProductId::new("BTC-USD").unwrap(),
            OrderSide::Buy,
            StrategyKind::Twap,
            dec!(1),
            dec!(50_000),
            4,
        )
    }

    #[test]
    fn placement_and_failure_bookkeeping() {
        let mut exec = execution();
        exec.record_placed(1, OrderId::new("o1"), dec!(0.25), dec!(50_000));
        exec.record_failure(2, SliceFailure::PriceUnfavorable);
        exec.record_placed(3, OrderId::new("o2"), dec!(0.25), dec!(49_990));

        assert_eq!(exec.status, ExecutionStatus::Active);
        assert_eq!(exec.placed_size, dec!(0.5));
        assert_eq!(exec.order_ids.len(), 2);
        assert_eq!(
            exec.failed_slices(),
            vec![(2, SliceFailure::PriceUnfavorable)]
        );
    }

    #[test]
    fn fills_update_totals_and_liquidity_counters() {
        let mut exec = execution();
        exec.apply_fill(&FillInfo::new(dec!(0.25), dec!(50_000), dec!(6.25), true));
        exec.apply_fill(&FillInfo::new(dec!(0.25), dec!(50_200), dec!(15.05), false));

        assert_eq!(exec.filled_size, dec!(0.5));
        assert_eq!(exec.filled_value, dec!(25_050));
        assert_eq!(exec.total_fees, dec!(21.30));
        assert_eq!(exec.maker_fills, 1);
        assert_eq!(exec.taker_fills, 1);
        assert_eq!(exec.average_price(), Some(dec!(50_100)));
    }

    #[test]
    fn terminal_status_depends_on_placements() {
        let mut all_failed = execution();
        all_failed.record_failure(1, SliceFailure::PriceFetchFailed);
        all_failed.finish();
        assert_eq!(all_failed.status, ExecutionStatus::Error);

        let mut mixed = execution();
        mixed.record_placed(1, OrderId::new("o1"), dec!(0.5), dec!(50_000));
        mixed.record_failure(2, SliceFailure::BalanceInsufficient);
        mixed.finish();
        assert_eq!(mixed.status, ExecutionStatus::Partial);

        let mut clean = execution();
        clean.record_placed(1, OrderId::new("o1"), dec!(1), dec!(50_000));
        clean.finish();
        assert_eq!(clean.status, ExecutionStatus::Completed);
        assert!(clean.status.is_terminal());
    }

    #[test]
    fn serde_round_trip() {
        let mut exec = execution();
        exec.record_placed(1, OrderId::new("o1"), dec!(0.25), dec!(50_000));
        exec.apply_fill(&FillInfo::new(dec!(0.25), dec!(50_000), dec!(1), true));

        let json = serde_json::to_string(&exec).unwrap();
        let parsed: Execution = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, exec);
    }
}
