//! Time-weighted average price strategy.
//!
//! Splits the order into equal slices placed at uniform intervals, with
//! optional symmetric jitter on each scheduled time so the footprint is not
//! perfectly periodic. An optional participation cap skips a slice whenever
//! it would represent too large a fraction of recent traded volume.

use chrono::{TimeDelta, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::BTreeMap;

use crate::domain::shared::{DomainError, ExecutionId, OrderId, OrderSide, ProductId};
use crate::domain::strategy::{
    FillInfo, MarketContext, PriceType, SliceSpec, SliceStrategy, StrategyKind, StrategyLedger,
    StrategyResult, resolve_price, split_evenly,
};

/// Parameters for a TWAP run.
#[derive(Debug, Clone)]
pub struct TwapParams {
    /// Product to trade.
    pub product: ProductId,
    /// Order side.
    pub side: OrderSide,
    /// Total size in base currency.
    pub total_size: Decimal,
    /// Limit price bounding every slice.
    pub limit_price: Decimal,
    /// Number of slices.
    pub num_slices: u32,
    /// Total schedule duration.
    pub duration: TimeDelta,
    /// How slice prices resolve at placement time.
    pub price_type: PriceType,
    /// Jitter as a fraction of the interval (0 disables). Values above 0.5
    /// are clamped so adjacent scheduled times can never invert.
    pub jitter_pct: f64,
    /// Maximum fraction of trailing volume one slice may represent.
    /// `None` or zero disables the check.
    pub participation_cap: Option<Decimal>,
    /// Trailing window for the participation check.
    pub volume_lookback: TimeDelta,
    /// Seed for the jitter RNG; random when `None`.
    pub seed: Option<u64>,
}

/// Time-weighted slicing strategy.
pub struct TwapStrategy {
    ledger: StrategyLedger,
    num_slices: u32,
    duration: TimeDelta,
    price_type: PriceType,
    jitter_pct: f64,
    participation_cap: Option<Decimal>,
    volume_lookback: TimeDelta,
    rng: StdRng,
    slices: Vec<SliceSpec>,
}

impl TwapStrategy {
    /// Validate parameters and build the strategy.
    pub fn new(params: TwapParams) -> Result<Self, DomainError> {
        if params.total_size <= Decimal::ZERO {
            return Err(DomainError::NonPositiveSize {
                size: params.total_size,
            });
        }
        if params.num_slices == 0 {
            return Err(DomainError::InvalidSliceCount { count: 0 });
        }
        if params.duration <= TimeDelta::zero() {
            return Err(DomainError::NonPositiveDuration);
        }
        let rng = params
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        Ok(Self {
            ledger: StrategyLedger::new(
                params.product,
                params.side,
                params.total_size,
                params.limit_price,
            ),
            num_slices: params.num_slices,
            duration: params.duration,
            price_type: params.price_type,
            jitter_pct: params.jitter_pct.max(0.0),
            participation_cap: params
                .participation_cap
                .filter(|cap| *cap > Decimal::ZERO),
            volume_lookback: params.volume_lookback,
            rng,
            slices: Vec::new(),
        })
    }

    /// Interval between consecutive slices.
    #[must_use]
    pub fn interval(&self) -> TimeDelta {
        self.duration / self.num_slices as i32
    }

    fn slice_size(&self, slice_number: u32) -> Option<Decimal> {
        self.slices
            .iter()
            .find(|s| s.slice_number == slice_number)
            .map(|s| s.size)
    }
}

impl SliceStrategy for TwapStrategy {
    fn id(&self) -> &ExecutionId {
        &self.ledger.id
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Twap
    }

    fn product(&self) -> &ProductId {
        &self.ledger.product
    }

    fn side(&self) -> OrderSide {
        self.ledger.side
    }

    fn total_size(&self) -> Decimal {
        self.ledger.total_size
    }

    fn limit_price(&self) -> Decimal {
        self.ledger.limit_price
    }

    fn calculate_slices(&mut self) -> Vec<SliceSpec> {
        let sizes = split_evenly(self.ledger.total_size, self.num_slices);
        let interval = self.interval();
        let interval_ms = interval.num_milliseconds();
        // Clamped to half the interval: each slice moves at most half-way
        // toward its neighbours, so scheduled times never invert.
        let jitter = self.jitter_pct.min(0.5);
        let start = Utc::now();

        let mut slices = Vec::with_capacity(sizes.len());
        for (i, size) in sizes.into_iter().enumerate() {
            let base = start + interval * i as i32;
            // The first slice fires immediately and is never jittered.
            let scheduled = if i == 0 || jitter <= 0.0 {
                base
            } else {
                let offset = self.rng.random_range(-jitter..jitter);
                base + TimeDelta::milliseconds((offset * interval_ms as f64) as i64)
            };
            slices.push(SliceSpec::new(
                (i + 1) as u32,
                size,
                self.ledger.limit_price,
                scheduled,
                self.price_type,
            ));
        }

        self.ledger.schedule_computed(slices.len() as u32);
        self.slices = slices.clone();
        slices
    }

    fn should_skip_slice(&self, slice_number: u32, ctx: &MarketContext) -> bool {
        let Some(cap) = self.participation_cap else {
            return false;
        };
        let Some(size) = self.slice_size(slice_number) else {
            return false;
        };
        match ctx.recent_volume {
            Some(volume) if volume > Decimal::ZERO => size / volume > cap,
            // No volume data: skipping is the safe default under a cap.
            _ => true,
        }
    }

    fn execution_price(&self, slice: &SliceSpec, ctx: &MarketContext) -> Decimal {
        resolve_price(slice.price_type, self.ledger.limit_price, ctx)
    }

    fn on_slice_complete(&mut self, slice_number: u32, order_id: Option<OrderId>, fill: Option<FillInfo>) {
        self.ledger.record_outcome(slice_number, order_id, fill);
    }

    fn result(&self) -> StrategyResult {
        let mut metadata = BTreeMap::new();
        metadata.insert(
            "interval_seconds".to_string(),
            serde_json::json!(self.interval().num_seconds()),
        );
        metadata.insert("jitter_pct".to_string(), serde_json::json!(self.jitter_pct));
        if let Some(cap) = self.participation_cap {
            metadata.insert(
                "participation_cap".to_string(),
                serde_json::json!(cap.to_f64()),
            );
        }
        self.ledger.result(None, metadata)
    }

    fn volume_lookback(&self) -> Option<TimeDelta> {
        self.participation_cap.map(|_| self.volume_lookback)
    }
}
