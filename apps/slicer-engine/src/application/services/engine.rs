//! Slice execution engine.
//!
//! Walks a strategy's slice schedule: waits for each slice's scheduled time,
//! takes a fresh market snapshot, applies the skip and limit-price guards,
//! places the order, and checkpoints the execution aggregate after every
//! slice so a crash never loses more than the slice in flight.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::application::ports::{
    ExchangePort, ExecutionRepository, Granularity, LimitOrderRequest, StorageError,
};
use crate::application::services::monitor::OrderMonitor;
use crate::application::services::shared_state::SharedState;
use crate::domain::execution::{Execution, SliceFailure};
use crate::domain::shared::{ClientOrderId, OrderSide};
use crate::domain::strategy::{FillInfo, MarketContext, SliceSpec, SliceStrategy, StrategyResult};
use crate::resilience::RateLimiter;

/// Fee rates used for the engine's synthetic fill estimates. Authoritative
/// fees arrive with confirmed fills through the monitor.
#[derive(Debug, Clone, Copy)]
pub struct FeeRates {
    /// Maker fee as a fraction of notional.
    pub maker: Decimal,
    /// Taker fee as a fraction of notional.
    pub taker: Decimal,
}

impl Default for FeeRates {
    fn default() -> Self {
        Self {
            maker: Decimal::new(4, 3),  // 0.4%
            taker: Decimal::new(6, 3),  // 0.6%
        }
    }
}

/// Engine failures that abort a run.
///
/// Per-slice problems (bad prices, rejections, missing market data) are
/// recorded on the aggregate and never abort; only losing the checkpoint
/// store does.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Checkpoint persistence failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Drives strategy schedules against the exchange.
pub struct SliceExecutionEngine {
    exchange: Arc<dyn ExchangePort>,
    repository: Arc<dyn ExecutionRepository>,
    state: Arc<SharedState>,
    monitor: Arc<OrderMonitor>,
    limiter: Arc<RateLimiter>,
    fees: FeeRates,
}

impl SliceExecutionEngine {
    /// Wire the engine to its collaborators.
    #[must_use]
    pub fn new(
        exchange: Arc<dyn ExchangePort>,
        repository: Arc<dyn ExecutionRepository>,
        state: Arc<SharedState>,
        monitor: Arc<OrderMonitor>,
        limiter: Arc<RateLimiter>,
        fees: FeeRates,
    ) -> Self {
        Self {
            exchange,
            repository,
            state,
            monitor,
            limiter,
            fees,
        }
    }

    /// Execute a strategy's full schedule and return its aggregate result.
    ///
    /// The execution aggregate is checkpointed after every slice. Confirmed
    /// fills flow in asynchronously via the monitor; the result returned here
    /// carries the strategy's own (estimate-based) view of the run.
    pub async fn execute(
        &self,
        strategy: &mut dyn SliceStrategy,
    ) -> Result<StrategyResult, EngineError> {
        let slices = strategy.calculate_slices();
        let execution = Execution::new(
            strategy.id().clone(),
            strategy.product().clone(),
            strategy.side(),
            strategy.kind(),
            strategy.total_size(),
            strategy.limit_price(),
            slices.len() as u32,
        );
        let execution_id = execution.id.clone();
        info!(
            execution_id = %execution_id,
            kind = %strategy.kind(),
            product = %strategy.product(),
            side = ?strategy.side(),
            total_size = %strategy.total_size(),
            num_slices = slices.len(),
            "execution started"
        );
        self.repository.save(&execution).await?;
        self.state.register_execution(execution);

        for slice in &slices {
            self.wait_until(slice).await;
            let failure = self.attempt_slice(strategy, slice).await;
            match failure {
                None => {}
                Some(failure) => {
                    warn!(
                        execution_id = %execution_id,
                        slice = slice.slice_number,
                        reason = ?failure,
                        "slice not placed"
                    );
                    self.state
                        .with_execution(&execution_id, |e| e.record_failure(slice.slice_number, failure));
                    strategy.on_slice_complete(slice.slice_number, None, None);
                }
            }
            self.checkpoint(&execution_id).await?;
        }

        self.state.with_execution(&execution_id, Execution::finish);
        self.reconcile_fills(&execution_id).await;
        self.checkpoint(&execution_id).await?;
        let result = strategy.result();
        info!(
            execution_id = %execution_id,
            status = ?result.status,
            filled = %result.total_filled,
            failed = result.num_failed,
            "execution finished"
        );
        Ok(result)
    }

    async fn wait_until(&self, slice: &SliceSpec) {
        let delay = slice.scheduled_time - Utc::now();
        if let Ok(delay) = delay.to_std() {
            if delay > Duration::ZERO {
                debug!(slice = slice.slice_number, delay_ms = delay.as_millis() as u64, "waiting for slice");
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// One slice attempt. Returns the failure reason, or `None` if an order
    /// was placed.
    async fn attempt_slice(
        &self,
        strategy: &mut dyn SliceStrategy,
        slice: &SliceSpec,
    ) -> Option<SliceFailure> {
        let ctx = match self.market_context(strategy).await {
            Some(ctx) => ctx,
            None => return Some(SliceFailure::PriceFetchFailed),
        };

        if strategy.should_skip_slice(slice.slice_number, &ctx) {
            return Some(SliceFailure::ParticipationCapped);
        }

        if strategy.side() == OrderSide::Sell && !self.covers_sell(strategy, slice.size).await {
            return Some(SliceFailure::BalanceInsufficient);
        }

        let price = strategy.execution_price(slice, &ctx);
        if !strategy.side().price_is_favorable(price, strategy.limit_price()) {
            return Some(SliceFailure::PriceUnfavorable);
        }

        self.limiter.wait().await;
        let request = LimitOrderRequest {
            client_order_id: ClientOrderId::generate(),
            product: strategy.product().clone(),
            side: strategy.side(),
            size: slice.size,
            price,
            post_only: true,
        };
        let order_id = match self.exchange.place_limit_order(request).await {
            Ok(order_id) => order_id,
            Err(e) => {
                warn!(slice = slice.slice_number, error = %e, "placement failed");
                return Some(SliceFailure::PlacementFailed);
            }
        };
        debug!(slice = slice.slice_number, order_id = %order_id, price = %price, "slice placed");

        let execution_id = strategy.id().clone();
        self.state.with_execution(&execution_id, |e| {
            e.record_placed(slice.slice_number, order_id.clone(), slice.size, price);
        });
        self.state.index_order(order_id.clone(), execution_id);
        self.monitor.enqueue(order_id.clone());

        // Post-only orders rest on the book, so estimate at the maker rate.
        let estimate = FillInfo::new(slice.size, price, slice.size * price * self.fees.maker, true);
        strategy.on_slice_complete(slice.slice_number, Some(order_id), Some(estimate));
        None
    }

    /// Fresh market context: live prices, plus trailing volume when the
    /// strategy asked for a lookback window.
    async fn market_context(&self, strategy: &dyn SliceStrategy) -> Option<MarketContext> {
        self.limiter.wait().await;
        let snapshot = match self.exchange.price_snapshot(strategy.product()).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "price snapshot failed");
                return None;
            }
        };
        let mut ctx = MarketContext::with_prices(snapshot.bid, snapshot.ask, snapshot.mid);

        if let Some(lookback) = strategy.volume_lookback() {
            let end = Utc::now();
            self.limiter.wait().await;
            match self
                .exchange
                .candles(strategy.product(), end - lookback, end, Granularity::OneMinute)
                .await
            {
                Ok(candles) => {
                    let volume: Decimal = candles.iter().map(|c| c.volume).sum();
                    ctx = ctx.with_recent_volume(volume);
                }
                Err(e) => {
                    // Leave recent_volume unset; the strategy decides whether
                    // that forces a skip.
                    warn!(error = %e, "trailing volume fetch failed");
                }
            }
        }
        Some(ctx)
    }

    async fn covers_sell(&self, strategy: &dyn SliceStrategy, size: Decimal) -> bool {
        self.limiter.wait().await;
        match self.exchange.balance(strategy.product().base()).await {
            Ok(balance) => balance >= size,
            Err(e) => {
                warn!(error = %e, "balance check failed");
                false
            }
        }
    }

    /// Best-effort sweep for fills that landed while the schedule ran. The
    /// monitor keeps polling afterwards; this just tightens the result for
    /// orders that already show fills.
    async fn reconcile_fills(&self, execution_id: &crate::domain::shared::ExecutionId) {
        let Some(snapshot) = self.state.execution_snapshot(execution_id) else {
            return;
        };
        let pending: Vec<_> = snapshot
            .order_ids
            .iter()
            .filter(|id| !self.state.already_filled(id))
            .cloned()
            .collect();
        if pending.is_empty() {
            return;
        }
        self.limiter.wait().await;
        match self.exchange.fills(&pending).await {
            Ok(fills) => {
                for (order_id, summary) in &fills {
                    let price = if summary.filled_size > Decimal::ZERO {
                        summary.filled_value / summary.filled_size
                    } else {
                        Decimal::ZERO
                    };
                    let fill =
                        FillInfo::new(summary.filled_size, price, summary.fees, summary.is_maker);
                    self.state.apply_fill(order_id, &fill);
                }
            }
            Err(e) => warn!(execution_id = %execution_id, error = %e, "final fill sweep failed"),
        }
    }

    async fn checkpoint(
        &self,
        execution_id: &crate::domain::shared::ExecutionId,
    ) -> Result<(), EngineError> {
        if let Some(snapshot) = self.state.execution_snapshot(execution_id) {
            self.repository.save(&snapshot).await?;
        }
        Ok(())
    }
}
