//! Order slicing strategies.
//!
//! A strategy is a pure scheduling computation: given order parameters (and
//! any historical data supplied at construction), it produces an ordered
//! slice schedule and keeps its own bookkeeping as the engine reports slice
//! outcomes back. Strategies never talk to the exchange themselves.

pub mod market;
pub mod result;
pub mod scaled;
pub mod slice;
pub mod twap;
pub mod vwap;

pub use market::{Candle, MarketContext};
pub use result::{FillInfo, StrategyResult, StrategyStatus};
pub use scaled::{Distribution, ScaledParams, ScaledStrategy};
pub use slice::{PriceType, SliceSpec};
pub use twap::{TwapParams, TwapStrategy};
pub use vwap::{VolumeProfile, VwapParams, VwapStrategy};

use chrono::TimeDelta;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::shared::{ExecutionId, OrderId, OrderSide, ProductId};

/// The closed set of strategy variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Time-weighted: uniform intervals, optional jitter.
    Twap,
    /// Volume-weighted: sizes follow a historical volume profile.
    Vwap,
    /// Price-laddered: all slices placed immediately across a range.
    Scaled,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Twap => write!(f, "twap"),
            Self::Vwap => write!(f, "vwap"),
            Self::Scaled => write!(f, "scaled"),
        }
    }
}

/// Contract implemented by every strategy variant.
pub trait SliceStrategy: Send {
    /// Execution identifier for this run.
    fn id(&self) -> &ExecutionId;

    /// Which variant this is.
    fn kind(&self) -> StrategyKind;

    /// Product being traded.
    fn product(&self) -> &ProductId;

    /// Order side.
    fn side(&self) -> OrderSide;

    /// Requested total size.
    fn total_size(&self) -> Decimal;

    /// Limit price bounding every slice.
    fn limit_price(&self) -> Decimal;

    /// Produce the slice schedule. Sizes sum to `total_size`; slices are
    /// ordered by ascending `scheduled_time` and `slice_number`.
    fn calculate_slices(&mut self) -> Vec<SliceSpec>;

    /// Decide, immediately before placement, whether to skip the slice.
    fn should_skip_slice(&self, slice_number: u32, ctx: &MarketContext) -> bool;

    /// Resolve a slice's abstract price type to a concrete number, falling
    /// back to the stored limit price when market data is unavailable.
    fn execution_price(&self, slice: &SliceSpec, ctx: &MarketContext) -> Decimal;

    /// Record a slice outcome. `order_id` is present when the slice placed;
    /// `fill` is the engine's synthetic estimate (authoritative fills arrive
    /// asynchronously through the monitor).
    fn on_slice_complete(&mut self, slice_number: u32, order_id: Option<OrderId>, fill: Option<FillInfo>);

    /// Snapshot the run's aggregate outcome.
    fn result(&self) -> StrategyResult;

    /// Trailing-volume window the engine should supply in the market
    /// context, if this strategy uses one.
    fn volume_lookback(&self) -> Option<TimeDelta> {
        None
    }
}

/// Resolve a price type against live data, with the limit fallback shared by
/// the time-based variants.
fn resolve_price(price_type: PriceType, fallback: Decimal, ctx: &MarketContext) -> Decimal {
    match price_type {
        PriceType::Limit => fallback,
        PriceType::Bid => ctx.bid.unwrap_or(fallback),
        PriceType::Mid => ctx.mid.unwrap_or(fallback),
        PriceType::Ask => ctx.ask.unwrap_or(fallback),
    }
}

/// Shared bookkeeping embedded in every variant.
#[derive(Debug, Clone)]
struct StrategyLedger {
    id: ExecutionId,
    product: ProductId,
    side: OrderSide,
    total_size: Decimal,
    limit_price: Decimal,
    status: StrategyStatus,
    num_slices: u32,
    accounted: u32,
    num_filled: u32,
    failed_slices: Vec<u32>,
    order_ids: Vec<OrderId>,
    total_filled: Decimal,
    total_value: Decimal,
    total_fees: Decimal,
}

impl StrategyLedger {
    fn new(product: ProductId, side: OrderSide, total_size: Decimal, limit_price: Decimal) -> Self {
        Self {
            id: ExecutionId::generate(),
            product,
            side,
            total_size,
            limit_price,
            status: StrategyStatus::Pending,
            num_slices: 0,
            accounted: 0,
            num_filled: 0,
            failed_slices: Vec::new(),
            order_ids: Vec::new(),
            total_filled: Decimal::ZERO,
            total_value: Decimal::ZERO,
            total_fees: Decimal::ZERO,
        }
    }

    fn schedule_computed(&mut self, num_slices: u32) {
        self.num_slices = num_slices;
    }

    fn record_outcome(&mut self, slice_number: u32, order_id: Option<OrderId>, fill: Option<FillInfo>) {
        self.accounted += 1;
        match order_id {
            Some(id) => {
                self.order_ids.push(id);
                self.num_filled += 1;
                if let Some(fill) = fill {
                    self.total_filled += fill.size;
                    self.total_value += fill.value;
                    self.total_fees += fill.fees;
                }
            }
            None => self.failed_slices.push(slice_number),
        }
        self.status = if self.num_slices > 0 && self.accounted >= self.num_slices {
            StrategyStatus::Completed
        } else {
            StrategyStatus::Active
        };
    }

    fn average_price(&self) -> Option<Decimal> {
        (self.total_filled > Decimal::ZERO).then(|| self.total_value / self.total_filled)
    }

    fn result(
        &self,
        vwap: Option<Decimal>,
        metadata: BTreeMap<String, serde_json::Value>,
    ) -> StrategyResult {
        StrategyResult {
            id: self.id.clone(),
            status: self.status,
            total_size: self.total_size,
            total_filled: self.total_filled,
            total_value: self.total_value,
            total_fees: self.total_fees,
            average_price: self.average_price(),
            vwap,
            num_slices: self.num_slices,
            num_filled: self.num_filled,
            num_failed: self.failed_slices.len() as u32,
            metadata,
        }
    }
}

/// Split `total` into `count` near-equal parts that sum to `total` exactly.
///
/// Decimal division can round; the last part absorbs the residue.
fn split_evenly(total: Decimal, count: u32) -> Vec<Decimal> {
    split_weighted(total, &vec![Decimal::ONE; count as usize])
}

/// Distribute `total` across `weights` (need not be normalized), with the
/// last part absorbing rounding residue so the sum is exact.
fn split_weighted(total: Decimal, weights: &[Decimal]) -> Vec<Decimal> {
    let weight_sum: Decimal = weights.iter().copied().sum();
    if weights.is_empty() || weight_sum <= Decimal::ZERO {
        return Vec::new();
    }
    let mut sizes = Vec::with_capacity(weights.len());
    let mut allocated = Decimal::ZERO;
    for weight in &weights[..weights.len() - 1] {
        let size = total * weight / weight_sum;
        allocated += size;
        sizes.push(size);
    }
    sizes.push(total - allocated);
    sizes
}
