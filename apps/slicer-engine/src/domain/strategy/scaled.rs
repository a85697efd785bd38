//! Scaled (laddered) order strategy.
//!
//! Places every slice immediately as a limit order at evenly spaced prices
//! across `[price_low, price_high]`, sized by a distribution function. The
//! ladder never waits on market conditions and never skips.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::shared::{DomainError, ExecutionId, OrderId, OrderSide, ProductId};
use crate::domain::strategy::{
    FillInfo, MarketContext, PriceType, SliceSpec, SliceStrategy, StrategyKind, StrategyLedger,
    StrategyResult, split_weighted,
};

/// How size distributes across ladder levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    /// Equal size at every level.
    Linear,
    /// Doubling weights, heaviest at the side's favorable price end
    /// (high prices for SELL, low prices for BUY).
    Geometric,
    /// Linearly decreasing weights away from the market-proximal end.
    FrontWeighted,
}

/// Parameters for a scaled run.
#[derive(Debug, Clone)]
pub struct ScaledParams {
    /// Product to trade.
    pub product: ProductId,
    /// Order side.
    pub side: OrderSide,
    /// Total size in base currency.
    pub total_size: Decimal,
    /// Bottom of the price ladder.
    pub price_low: Decimal,
    /// Top of the price ladder.
    pub price_high: Decimal,
    /// Number of ladder levels.
    pub num_orders: u32,
    /// Size distribution across levels.
    pub distribution: Distribution,
}

/// Price-laddered strategy.
pub struct ScaledStrategy {
    ledger: StrategyLedger,
    num_orders: u32,
    price_low: Decimal,
    price_high: Decimal,
    distribution: Distribution,
}

impl ScaledStrategy {
    /// Validate parameters and build the strategy.
    pub fn new(params: ScaledParams) -> Result<Self, DomainError> {
        if params.total_size <= Decimal::ZERO {
            return Err(DomainError::NonPositiveSize {
                size: params.total_size,
            });
        }
        if params.num_orders == 0 {
            return Err(DomainError::InvalidSliceCount { count: 0 });
        }
        if params.price_low <= Decimal::ZERO || params.price_low >= params.price_high {
            return Err(DomainError::InvalidPriceRange {
                low: params.price_low,
                high: params.price_high,
            });
        }
        // The ladder's worst price doubles as the limit for favorability:
        // a BUY never pays above the top, a SELL never accepts below the bottom.
        let limit_price = match params.side {
            OrderSide::Buy => params.price_high,
            OrderSide::Sell => params.price_low,
        };
        Ok(Self {
            ledger: StrategyLedger::new(params.product, params.side, params.total_size, limit_price),
            num_orders: params.num_orders,
            price_low: params.price_low,
            price_high: params.price_high,
            distribution: params.distribution,
        })
    }

    /// Evenly spaced ladder prices, ascending. A single order sits at the
    /// midpoint.
    fn ladder_prices(&self) -> Vec<Decimal> {
        let n = self.num_orders;
        if n == 1 {
            return vec![(self.price_low + self.price_high) / Decimal::from(2)];
        }
        let step = (self.price_high - self.price_low) / Decimal::from(n - 1);
        (0..n)
            .map(|i| {
                if i == n - 1 {
                    // Land exactly on the bound, free of step rounding.
                    self.price_high
                } else {
                    self.price_low + step * Decimal::from(i)
                }
            })
            .collect()
    }

    /// Level weights, indexed in ascending price order.
    fn level_weights(&self) -> Vec<Decimal> {
        let n = self.num_orders as usize;
        match self.distribution {
            Distribution::Linear => vec![Decimal::ONE; n],
            Distribution::Geometric => {
                // Doubling toward the favorable end: high prices for SELL,
                // low prices for BUY.
                let mut weights = Vec::with_capacity(n);
                let mut weight = Decimal::ONE;
                for _ in 0..n {
                    weights.push(weight);
                    weight *= Decimal::from(2);
                }
                if self.ledger.side == OrderSide::Buy {
                    weights.reverse();
                }
                weights
            }
            Distribution::FrontWeighted => {
                // Heaviest at the market-proximal end: the top of a BUY
                // ladder, the bottom of a SELL ladder.
                let weights: Vec<_> = (1..=n).map(Decimal::from).collect();
                match self.ledger.side {
                    OrderSide::Buy => weights,
                    OrderSide::Sell => weights.into_iter().rev().collect(),
                }
            }
        }
    }
}

impl SliceStrategy for ScaledStrategy {
    fn id(&self) -> &ExecutionId {
        &self.ledger.id
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Scaled
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
        let prices = self.ladder_prices();
        let sizes = split_weighted(self.ledger.total_size, &self.level_weights());
        let now = Utc::now();

        let slices: Vec<_> = sizes
            .into_iter()
            .zip(prices)
            .enumerate()
            .map(|(i, (size, price))| {
                SliceSpec::new((i + 1) as u32, size, price, now, PriceType::Limit)
            })
            .collect();

        self.ledger.schedule_computed(slices.len() as u32);
        slices
    }

    fn should_skip_slice(&self, _slice_number: u32, _ctx: &MarketContext) -> bool {
        false
    }

    fn execution_price(&self, slice: &SliceSpec, _ctx: &MarketContext) -> Decimal {
        // Each ladder level carries its own limit price.
        slice.price
    }

    fn on_slice_complete(&mut self, slice_number: u32, order_id: Option<OrderId>, fill: Option<FillInfo>) {
        self.ledger.record_outcome(slice_number, order_id, fill);
    }

    fn result(&self) -> StrategyResult {
        let mut metadata = BTreeMap::new();
        metadata.insert(
            "distribution".to_string(),
            serde_json::json!(self.distribution),
        );
        metadata.insert(
            "price_low".to_string(),
            serde_json::json!(self.price_low.to_string()),
        );
        metadata.insert(
            "price_high".to_string(),
            serde_json::json!(self.price_high.to_string()),
        );
        self.ledger.result(None, metadata)
    }
}
