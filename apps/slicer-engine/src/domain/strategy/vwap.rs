//! Volume-weighted average price strategy.
//!
//! Slice sizes follow a historical volume profile: traded volume is averaged
//! per hour-of-day over a lookback window, each slice inherits the weight of
//! the hour it is scheduled in, and weights are normalized so sizes sum to
//! the total. With no historical data the profile degrades to flat, which is
//! arithmetically identical to TWAP.
//!
//! The same lookback also yields a benchmark VWAP used post-execution to
//! score slippage in basis points (positive = unfavorable for the side).

use chrono::{TimeDelta, Timelike, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::BTreeMap;

use crate::domain::shared::{DomainError, ExecutionId, OrderId, OrderSide, ProductId};
use crate::domain::strategy::{
    Candle, FillInfo, MarketContext, PriceType, SliceSpec, SliceStrategy, StrategyKind,
    StrategyLedger, StrategyResult, resolve_price, split_weighted,
};

/// Average traded volume per hour-of-day, built from historical candles.
#[derive(Debug, Clone, Default)]
pub struct VolumeProfile {
    averages: BTreeMap<u32, Decimal>,
}

impl VolumeProfile {
    /// Build a profile by averaging candle volume per hour-of-day.
    #[must_use]
    pub fn from_candles(candles: &[Candle]) -> Self {
        let mut totals: BTreeMap<u32, (Decimal, u32)> = BTreeMap::new();
        for candle in candles {
            let entry = totals.entry(candle.start.hour()).or_default();
            entry.0 += candle.volume;
            entry.1 += 1;
        }
        let averages = totals
            .into_iter()
            .filter(|(_, (_, count))| *count > 0)
            .map(|(hour, (sum, count))| (hour, sum / Decimal::from(count)))
            .collect();
        Self { averages }
    }

    /// Average volume for an hour-of-day; zero when the hour was never seen.
    #[must_use]
    pub fn average_for_hour(&self, hour: u32) -> Decimal {
        self.averages.get(&hour).copied().unwrap_or(Decimal::ZERO)
    }

    /// Whether the profile carries no usable data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.averages.values().all(|v| *v <= Decimal::ZERO)
    }
}

/// Benchmark VWAP over a candle window:
/// `Σ(typical_price × volume) / Σ(volume)` with `typical = (h + l + c) / 3`.
#[must_use]
pub fn benchmark_vwap(candles: &[Candle]) -> Option<Decimal> {
    let mut value = Decimal::ZERO;
    let mut volume = Decimal::ZERO;
    for candle in candles {
        value += candle.typical_price() * candle.volume;
        volume += candle.volume;
    }
    (volume > Decimal::ZERO).then(|| value / volume)
}

/// Parameters for a VWAP run.
#[derive(Debug, Clone)]
pub struct VwapParams {
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
}

/// Volume-weighted slicing strategy.
pub struct VwapStrategy {
    ledger: StrategyLedger,
    num_slices: u32,
    duration: TimeDelta,
    price_type: PriceType,
    profile: VolumeProfile,
    benchmark: Option<Decimal>,
    used_flat_profile: bool,
}

impl VwapStrategy {
    /// Validate parameters and build the strategy from a historical candle
    /// window (fetched by the caller).
    pub fn new(params: VwapParams, candles: &[Candle]) -> Result<Self, DomainError> {
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
            profile: VolumeProfile::from_candles(candles),
            benchmark: benchmark_vwap(candles),
            used_flat_profile: false,
        })
    }

    /// Benchmark VWAP over the construction-time lookback, if computable.
    #[must_use]
    pub const fn benchmark(&self) -> Option<Decimal> {
        self.benchmark
    }

    /// Signed slippage of the realized average price against the benchmark,
    /// in basis points. Positive means unfavorable for the order's side.
    #[must_use]
    pub fn slippage_bps(&self) -> Option<Decimal> {
        let benchmark = self.benchmark.filter(|b| *b > Decimal::ZERO)?;
        let average = self.ledger.average_price()?;
        let raw = (average - benchmark) / benchmark * Decimal::from(10_000);
        Some(match self.ledger.side {
            // Paying above benchmark hurts a buyer; selling below hurts a seller.
            OrderSide::Buy => raw,
            OrderSide::Sell => -raw,
        })
    }
}

impl SliceStrategy for VwapStrategy {
    fn id(&self) -> &ExecutionId {
        &self.ledger.id
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Vwap
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
        let interval = self.duration / self.num_slices as i32;
        let start = Utc::now();
        let times: Vec<_> = (0..self.num_slices)
            .map(|i| start + interval * i as i32)
            .collect();

        let mut weights: Vec<Decimal> = times
            .iter()
            .map(|t| self.profile.average_for_hour(t.hour()))
            .collect();
        let unusable =
            self.profile.is_empty() || weights.iter().all(|w| *w <= Decimal::ZERO);
        if unusable {
            weights = vec![Decimal::ONE; times.len()];
        } else {
            // An hour with no recorded volume still gets a sliver rather than
            // a zero-size slice.
            let floor = weights
                .iter()
                .filter(|w| **w > Decimal::ZERO)
                .copied()
                .min()
                .unwrap_or(Decimal::ONE)
                / Decimal::from(100);
            for weight in &mut weights {
                if *weight <= Decimal::ZERO {
                    *weight = floor;
                }
            }
        }
        self.used_flat_profile = unusable;

        let sizes = split_weighted(self.ledger.total_size, &weights);
        let slices: Vec<_> = sizes
            .into_iter()
            .zip(times)
            .enumerate()
            .map(|(i, (size, scheduled))| {
                SliceSpec::new(
                    (i + 1) as u32,
                    size,
                    self.ledger.limit_price,
                    scheduled,
                    self.price_type,
                )
            })
            .collect();

        self.ledger.schedule_computed(slices.len() as u32);
        slices
    }

    fn should_skip_slice(&self, _slice_number: u32, _ctx: &MarketContext) -> bool {
        false
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
            "profile".to_string(),
            serde_json::json!(if self.used_flat_profile { "flat" } else { "historical" }),
        );
        if let Some(slippage) = self.slippage_bps() {
            metadata.insert(
                "slippage_bps".to_string(),
                serde_json::json!(slippage.to_f64()),
            );
        }
        self.ledger.result(self.benchmark, metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration};
    use rust_decimal_macros::dec;
    use test_case::test_case;

    fn candle(start: DateTime<Utc>, volume: Decimal, price: Decimal) -> Candle {
        Candle {
            start,
            low: price,
            high: price,
            open: price,
            close: price,
            volume,
        }
    }

    fn params(total_size: Decimal, num_slices: u32) -> VwapParams {
        VwapParams {
            product: ProductId::new("BTC-USD").unwrap(),
            side: OrderSide::Buy,
            total_size,
            limit_price: dec!(50_000),
            num_slices,
            duration: TimeDelta::minutes(10),
            price_type: PriceType::Limit,
        }
    }

    fn flat_candles() -> Vec<Candle> {
        // One equal-volume candle per hour-of-day, so every scheduled hour
        // carries the same weight.
        let base = Utc::now() - Duration::hours(24);
        (0..24)
            .map(|i| candle(base + Duration::hours(i), dec!(100), dec!(50_000)))
            .collect()
    }

    #[test_case(1)]
    #[test_case(2)]
    #[test_case(5)]
    #[test_case(10)]
    #[test_case(100)]
    fn sizes_sum_to_total(num_slices: u32) {
        let mut strategy = VwapStrategy::new(params(dec!(1), num_slices), &flat_candles()).unwrap();
        let slices = strategy.calculate_slices();
        let sum: Decimal = slices.iter().map(|s| s.size).sum();
        assert_eq!(sum, dec!(1));
    }

    #[test]
    fn flat_volume_matches_twap_sizing() {
        // Five equal-volume buckets, total 2.5 => every slice is 0.5.
        let mut strategy = VwapStrategy::new(params(dec!(2.5), 5), &flat_candles()).unwrap();
        let slices = strategy.calculate_slices();
        assert_eq!(slices.len(), 5);
        for slice in &slices {
            assert_eq!(slice.size, dec!(0.5));
        }
    }

    #[test]
    fn no_history_degrades_to_flat() {
        let mut strategy = VwapStrategy::new(params(dec!(2), 4), &[]).unwrap();
        let slices = strategy.calculate_slices();
        for slice in &slices {
            assert_eq!(slice.size, dec!(0.5));
        }
        assert_eq!(strategy.benchmark(), None);
        let result = strategy.result();
        assert_eq!(result.metadata["profile"], serde_json::json!("flat"));
    }

    #[test]
    fn profile_averages_per_hour() {
        let base = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc();
        let candles = vec![
            candle(base, dec!(100), dec!(1)),
            candle(base + Duration::minutes(30), dec!(300), dec!(1)),
            candle(base + Duration::hours(1), dec!(500), dec!(1)),
        ];
        let profile = VolumeProfile::from_candles(&candles);
        assert_eq!(profile.average_for_hour(0), dec!(200));
        assert_eq!(profile.average_for_hour(1), dec!(500));
        assert_eq!(profile.average_for_hour(2), dec!(0));
        assert!(!profile.is_empty());
    }

    #[test]
    fn benchmark_is_volume_weighted_typical_price() {
        let base = Utc::now();
        let candles = vec![
            Candle {
                start: base,
                low: dec!(90),
                high: dec!(110),
                open: dec!(95),
                close: dec!(100),
                volume: dec!(10),
            },
            Candle {
                start: base + Duration::hours(1),
                low: dec!(190),
                high: dec!(210),
                open: dec!(195),
                close: dec!(200),
                volume: dec!(30),
            },
        ];
        // typical prices 100 and 200, volumes 10 and 30 => 175.
        assert_eq!(benchmark_vwap(&candles), Some(dec!(175)));
    }

    #[test]
    fn slippage_sign_follows_side() {
        let candles = flat_candles(); // benchmark 50_000
        let fill = |strategy: &mut VwapStrategy, price: Decimal| {
            let slices = strategy.calculate_slices();
            for slice in &slices {
                strategy.on_slice_complete(
                    slice.slice_number,
                    Some(OrderId::generate()),
                    Some(FillInfo::new(slice.size, price, dec!(0), true)),
                );
            }
        };

        // Buyer filled above benchmark: unfavorable, positive bps.
        let mut buy = VwapStrategy::new(params(dec!(1), 2), &candles).unwrap();
        fill(&mut buy, dec!(50_500));
        assert!(buy.slippage_bps().unwrap() > Decimal::ZERO);

        // Seller filled above benchmark: favorable, negative bps.
        let mut p = params(dec!(1), 2);
        p.side = OrderSide::Sell;
        let mut sell = VwapStrategy::new(p, &candles).unwrap();
        fill(&mut sell, dec!(50_500));
        assert!(sell.slippage_bps().unwrap() < Decimal::ZERO);
    }

    #[test]
    fn never_skips() {
        let strategy = VwapStrategy::new(params(dec!(1), 3), &[]).unwrap();
        assert!(!strategy.should_skip_slice(1, &MarketContext::unavailable()));
        assert!(strategy.volume_lookback().is_none());
    }
}
