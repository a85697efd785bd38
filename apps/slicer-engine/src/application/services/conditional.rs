//! Conditional order service.
//!
//! Places stop-limit, bracket and entry+bracket orders, routes every status
//! mutation through one entry point, and reconciles local state against the
//! exchange's order listing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::ports::{
    BracketOrderRequest, CancelResult, ConditionalOrderRepository, EntryBracketOrderRequest,
    ExchangeError, ExchangeOrderStatus, ExchangePort, StopLimitOrderRequest, StorageError,
};
use crate::application::services::SharedState;
use crate::domain::conditional::{
    AttachedBracketOrder, BracketOrder, ConditionalError, ConditionalKind, ConditionalOrder,
    ConditionalStatus, StopLimitOrder,
};
use crate::domain::shared::{ClientOrderId, DomainError, OrderId, OrderSide, ProductId};
use crate::domain::strategy::FillInfo;
use crate::resilience::RateLimiter;

/// Conditional service failures.
#[derive(Debug, thiserror::Error)]
pub enum ConditionalServiceError {
    /// No live price to derive the trigger from.
    #[error("Market data unavailable for {product}")]
    MarketDataUnavailable {
        /// Product queried.
        product: ProductId,
    },

    /// Mutation addressed to an unknown order.
    #[error("Conditional order not found: {order_id}")]
    NotFound {
        /// Missing order id.
        order_id: OrderId,
    },

    /// Parameter validation failure.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// State-machine violation.
    #[error(transparent)]
    State(#[from] ConditionalError),

    /// Exchange call failure.
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    /// Persistence failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Parameters for a stop-limit placement (stop-loss or take-profit; the
/// classification is derived, never supplied).
#[derive(Debug, Clone)]
pub struct PlaceStopOrderParams {
    /// Product.
    pub product: ProductId,
    /// Side of the triggered order.
    pub side: OrderSide,
    /// Size in base currency.
    pub size: Decimal,
    /// Trigger price.
    pub stop_price: Decimal,
    /// Limit price once triggered.
    pub limit_price: Decimal,
}

/// Parameters for a bracket protecting an existing position.
#[derive(Debug, Clone)]
pub struct PlaceBracketParams {
    /// Product.
    pub product: ProductId,
    /// Side of the exit orders.
    pub side: OrderSide,
    /// Size in base currency.
    pub size: Decimal,
    /// Take-profit limit price.
    pub take_profit_price: Decimal,
    /// Stop-loss trigger price.
    pub stop_loss_price: Decimal,
}

/// Parameters for an entry order with attached bracket.
#[derive(Debug, Clone)]
pub struct PlaceEntryBracketParams {
    /// Product.
    pub product: ProductId,
    /// Side of the entry order.
    pub side: OrderSide,
    /// Entry size in base currency.
    pub size: Decimal,
    /// Entry limit price.
    pub entry_price: Decimal,
    /// Take-profit limit price for the exit.
    pub take_profit_price: Decimal,
    /// Stop-loss trigger price for the exit.
    pub stop_loss_price: Decimal,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    /// Locally active orders examined.
    pub checked: u32,
    /// Terminal exchange statuses mirrored locally.
    pub mirrored: u32,
    /// Orders absent from the exchange, defaulted to cancelled.
    pub cancelled_missing: u32,
}

/// Counts over the stored conditional orders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalStats {
    /// All stored orders.
    pub total: u32,
    /// Orders that can still trade.
    pub active: u32,
    /// Orders in a terminal state.
    pub completed: u32,
    /// Stop-limit orders.
    pub stop_limit: u32,
    /// Brackets.
    pub bracket: u32,
    /// Entry + attached brackets.
    pub attached_bracket: u32,
    /// Stop-limit orders classified as stop-loss.
    pub stop_loss: u32,
    /// Stop-limit orders classified as take-profit.
    pub take_profit: u32,
}

/// Application service for the three conditional shapes.
pub struct ConditionalOrderService {
    exchange: Arc<dyn ExchangePort>,
    repository: Arc<dyn ConditionalOrderRepository>,
    limiter: Arc<RateLimiter>,
    state: Arc<SharedState>,
}

impl ConditionalOrderService {
    /// Wire the service to its ports.
    #[must_use]
    pub fn new(
        exchange: Arc<dyn ExchangePort>,
        repository: Arc<dyn ConditionalOrderRepository>,
        limiter: Arc<RateLimiter>,
        state: Arc<SharedState>,
    ) -> Self {
        Self {
            exchange,
            repository,
            limiter,
            state,
        }
    }

    /// Place a stop-limit order. Stop-loss vs take-profit falls out of the
    /// side and where the stop sits relative to the live mid.
    pub async fn place_stop_order(
        &self,
        params: PlaceStopOrderParams,
    ) -> Result<StopLimitOrder, ConditionalServiceError> {
        if params.size <= Decimal::ZERO {
            return Err(DomainError::NonPositiveSize { size: params.size }.into());
        }
        self.limiter.wait().await;
        let snapshot = self
            .exchange
            .price_snapshot(&params.product)
            .await?
            .ok_or_else(|| ConditionalServiceError::MarketDataUnavailable {
                product: params.product.clone(),
            })?;

        let (direction, _) =
            StopLimitOrder::derive_trigger(params.side, params.stop_price, snapshot.mid);
        let client_order_id = ClientOrderId::generate();

        self.limiter.wait().await;
        let order_id = self
            .exchange
            .place_stop_limit_order(StopLimitOrderRequest {
                client_order_id: client_order_id.clone(),
                product: params.product.clone(),
                side: params.side,
                size: params.size,
                stop_price: params.stop_price,
                limit_price: params.limit_price,
                direction,
            })
            .await?;

        let order = StopLimitOrder::new(
            order_id.clone(),
            client_order_id,
            params.product,
            params.side,
            params.size,
            params.stop_price,
            params.limit_price,
            snapshot.mid,
        );
        self.repository
            .save(&ConditionalOrder::StopLimit(order.clone()))
            .await?;
        self.state
            .track_conditional(order_id.clone(), ConditionalKind::StopLimit);
        info!(
            order_id = %order_id,
            kind = ?order.trigger_kind,
            stop = %params.stop_price,
            "stop-limit order placed"
        );
        Ok(order)
    }

    /// Place a TP/SL bracket for an existing position.
    pub async fn place_bracket_order(
        &self,
        params: PlaceBracketParams,
    ) -> Result<BracketOrder, ConditionalServiceError> {
        BracketOrder::validate_prices(params.side, params.take_profit_price, params.stop_loss_price)?;
        let client_order_id = ClientOrderId::generate();

        self.limiter.wait().await;
        let order_id = self
            .exchange
            .place_bracket_order(BracketOrderRequest {
                client_order_id: client_order_id.clone(),
                product: params.product.clone(),
                side: params.side,
                size: params.size,
                take_profit_price: params.take_profit_price,
                stop_loss_price: params.stop_loss_price,
            })
            .await?;

        let order = BracketOrder::new(
            order_id.clone(),
            client_order_id,
            params.product,
            params.side,
            params.size,
            params.take_profit_price,
            params.stop_loss_price,
        )?;
        self.repository
            .save(&ConditionalOrder::Bracket(order.clone()))
            .await?;
        self.state
            .track_conditional(order_id.clone(), ConditionalKind::Bracket);
        info!(order_id = %order_id, "bracket order placed");
        Ok(order)
    }

    /// Place an entry order with an attached TP/SL pair.
    pub async fn place_entry_with_bracket(
        &self,
        params: PlaceEntryBracketParams,
    ) -> Result<AttachedBracketOrder, ConditionalServiceError> {
        let client_order_id = ClientOrderId::generate();

        self.limiter.wait().await;
        let order_id = self
            .exchange
            .place_entry_with_bracket(EntryBracketOrderRequest {
                client_order_id: client_order_id.clone(),
                product: params.product.clone(),
                side: params.side,
                size: params.size,
                entry_price: params.entry_price,
                take_profit_price: params.take_profit_price,
                stop_loss_price: params.stop_loss_price,
            })
            .await?;

        let order = AttachedBracketOrder::new(
            order_id.clone(),
            client_order_id,
            params.product,
            params.side,
            params.size,
            params.entry_price,
            params.take_profit_price,
            params.stop_loss_price,
        )?;
        self.repository
            .save(&ConditionalOrder::AttachedBracket(order.clone()))
            .await?;
        self.state
            .track_conditional(order_id.clone(), ConditionalKind::AttachedBracket);
        info!(order_id = %order_id, "entry with attached bracket placed");
        Ok(order)
    }

    /// Cancel a batch of conditional orders, reporting per-order outcomes.
    /// One order's failure never fails the batch.
    pub async fn cancel_orders(
        &self,
        order_ids: &[OrderId],
    ) -> Result<Vec<CancelResult>, ConditionalServiceError> {
        self.limiter.wait().await;
        let results = self.exchange.cancel_orders(order_ids).await?;
        for result in &results {
            if !result.success {
                warn!(
                    order_id = %result.order_id,
                    reason = result.reason.as_deref().unwrap_or("unknown"),
                    "cancel rejected"
                );
                continue;
            }
            match self
                .update_order_status(&result.order_id, ConditionalStatus::Cancelled, None)
                .await
            {
                Ok(_) => {}
                Err(ConditionalServiceError::NotFound { .. }) => {
                    // Cancelled something we never tracked; nothing to mirror.
                }
                Err(e) => warn!(order_id = %result.order_id, error = %e, "local cancel update failed"),
            }
        }
        Ok(results)
    }

    /// The single mutation entry point for all three shapes: load, apply,
    /// merge fill deltas, stamp, persist. Terminal states drop the order
    /// from live tracking.
    pub async fn update_order_status(
        &self,
        order_id: &OrderId,
        status: ConditionalStatus,
        fill: Option<FillInfo>,
    ) -> Result<ConditionalOrder, ConditionalServiceError> {
        let mut order = self.repository.get(order_id).await?.ok_or_else(|| {
            ConditionalServiceError::NotFound {
                order_id: order_id.clone(),
            }
        })?;
        order.apply_status(status, fill.as_ref())?;
        self.repository.save(&order).await?;
        if order.is_completed() {
            self.state.untrack_conditional(order_id);
        }
        debug!(order_id = %order_id, status = ?status, "conditional order updated");
        Ok(order)
    }

    /// Mirror an exchange-reported terminal status onto the local shape,
    /// translating into the shape's own vocabulary.
    pub async fn apply_exchange_status(
        &self,
        order_id: &OrderId,
        status: ExchangeOrderStatus,
        fill: Option<FillInfo>,
    ) -> Result<ConditionalOrder, ConditionalServiceError> {
        let order = self.repository.get(order_id).await?.ok_or_else(|| {
            ConditionalServiceError::NotFound {
                order_id: order_id.clone(),
            }
        })?;
        if !status.is_terminal() {
            return Ok(order);
        }
        let local = Self::translate_status(&order, status);
        self.update_order_status(order_id, local, fill).await
    }

    fn translate_status(order: &ConditionalOrder, status: ExchangeOrderStatus) -> ConditionalStatus {
        match (order, status) {
            (_, ExchangeOrderStatus::Cancelled | ExchangeOrderStatus::Failed) => {
                ConditionalStatus::Cancelled
            }
            (ConditionalOrder::StopLimit(_), ExchangeOrderStatus::Expired) => {
                ConditionalStatus::Expired
            }
            (_, ExchangeOrderStatus::Expired) => ConditionalStatus::Cancelled,
            // A filled entry order is ENTRY_FILLED while pending; once the
            // bracket is live a fill report means an exit leg traded.
            (ConditionalOrder::AttachedBracket(o), ExchangeOrderStatus::Filled) => {
                if o.status == ConditionalStatus::Pending {
                    ConditionalStatus::EntryFilled
                } else {
                    ConditionalStatus::TpFilled
                }
            }
            (_, ExchangeOrderStatus::Filled) => ConditionalStatus::Filled,
            // Guarded by the is_terminal check above.
            (_, ExchangeOrderStatus::Open) => order.status(),
        }
    }

    /// Reconciliation pass: list the exchange's orders once, then for every
    /// locally active conditional order mirror a terminal exchange status,
    /// and default orders the exchange no longer knows about to cancelled.
    pub async fn reconcile(&self) -> Result<ReconcileSummary, ConditionalServiceError> {
        self.limiter.wait().await;
        let listed = self.exchange.list_orders(None).await?;
        let statuses: std::collections::HashMap<_, _> = listed
            .into_iter()
            .map(|s| (s.order_id, s.status))
            .collect();

        let mut summary = ReconcileSummary::default();
        for order in self.repository.list().await? {
            if order.is_completed() {
                continue;
            }
            summary.checked += 1;
            let order_id = order.order_id().clone();
            match statuses.get(&order_id) {
                Some(status) if status.is_terminal() => {
                    if let Err(e) = self.apply_exchange_status(&order_id, *status, None).await {
                        warn!(order_id = %order_id, error = %e, "status mirror failed");
                    } else {
                        summary.mirrored += 1;
                    }
                }
                Some(_) => {} // still open on the exchange
                None => {
                    // The exchange no longer knows this order; it cannot
                    // still be active.
                    if let Err(e) = self
                        .update_order_status(&order_id, ConditionalStatus::Cancelled, None)
                        .await
                    {
                        warn!(order_id = %order_id, error = %e, "fail-safe cancel failed");
                    } else {
                        summary.cancelled_missing += 1;
                    }
                }
            }
        }
        info!(
            checked = summary.checked,
            mirrored = summary.mirrored,
            cancelled_missing = summary.cancelled_missing,
            "conditional reconciliation pass complete"
        );
        Ok(summary)
    }

    /// Counts by shape, liveness and trigger classification.
    pub async fn statistics(&self) -> Result<ConditionalStats, ConditionalServiceError> {
        let mut stats = ConditionalStats::default();
        for order in self.repository.list().await? {
            stats.total += 1;
            if order.is_active() {
                stats.active += 1;
            } else {
                stats.completed += 1;
            }
            match &order {
                ConditionalOrder::StopLimit(o) => {
                    stats.stop_limit += 1;
                    match o.trigger_kind {
                        crate::domain::conditional::TriggerKind::StopLoss => stats.stop_loss += 1,
                        crate::domain::conditional::TriggerKind::TakeProfit => {
                            stats.take_profit += 1;
                        }
                    }
                }
                ConditionalOrder::Bracket(_) => stats.bracket += 1,
                ConditionalOrder::AttachedBracket(_) => stats.attached_bracket += 1,
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::test_support::FakeExchange;
    use crate::application::ports::OrderSnapshot;
    use crate::infrastructure::persistence::InMemoryConditionalOrderRepository;
    use rust_decimal_macros::dec;

    fn service() -> (
        ConditionalOrderService,
        Arc<FakeExchange>,
        Arc<InMemoryConditionalOrderRepository>,
        Arc<SharedState>,
    ) {
        let exchange = Arc::new(FakeExchange::default());
        let repository = Arc::new(InMemoryConditionalOrderRepository::new());
        let state = Arc::new(SharedState::new());
        let svc = ConditionalOrderService::new(
            exchange.clone(),
            repository.clone(),
            Arc::new(RateLimiter::new(1_000.0, 100)),
            state.clone(),
        );
        (svc, exchange, repository, state)
    }

    fn product() -> ProductId {
        ProductId::new("BTC-USD").unwrap()
    }

    #[tokio::test]
    async fn stop_order_is_placed_persisted_and_tracked() {
        let (svc, exchange, repository, state) = service();
        let order = svc
            .place_stop_order(PlaceStopOrderParams {
                product: product(),
                side: OrderSide::Sell,
                size: dec!(0.5),
                stop_price: dec!(48_000),
                limit_price: dec!(47_900),
            })
            .await
            .unwrap();

        // Mid is 50_000 in the fake; a SELL stop below mid is a stop-loss.
        assert_eq!(
            order.trigger_kind,
            crate::domain::conditional::TriggerKind::StopLoss
        );
        assert_eq!(exchange.placed_stop.lock().unwrap().len(), 1);
        assert!(repository.get(&order.order_id).await.unwrap().is_some());
        assert_eq!(
            state.conditional_kind(&order.order_id),
            Some(ConditionalKind::StopLimit)
        );
    }

    #[tokio::test]
    async fn stop_order_requires_market_data() {
        let (svc, exchange, _, _) = service();
        *exchange.snapshot.lock().unwrap() = None;
        let err = svc
            .place_stop_order(PlaceStopOrderParams {
                product: product(),
                side: OrderSide::Sell,
                size: dec!(0.5),
                stop_price: dec!(48_000),
                limit_price: dec!(47_900),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ConditionalServiceError::MarketDataUnavailable { .. }
        ));
    }

    #[tokio::test]
    async fn bracket_validation_rejects_inverted_prices() {
        let (svc, _, _, _) = service();
        let err = svc
            .place_bracket_order(PlaceBracketParams {
                product: product(),
                side: OrderSide::Sell,
                size: dec!(1),
                take_profit_price: dec!(45_000),
                stop_loss_price: dec!(55_000),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ConditionalServiceError::Domain(_)));
    }

    #[tokio::test]
    async fn update_rejects_unknown_orders() {
        let (svc, _, _, _) = service();
        let err = svc
            .update_order_status(&OrderId::new("ghost"), ConditionalStatus::Filled, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConditionalServiceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn terminal_update_untracks_the_order() {
        let (svc, _, _, state) = service();
        let order = svc
            .place_stop_order(PlaceStopOrderParams {
                product: product(),
                side: OrderSide::Sell,
                size: dec!(0.5),
                stop_price: dec!(48_000),
                limit_price: dec!(47_900),
            })
            .await
            .unwrap();

        let fill = FillInfo::new(dec!(0.5), dec!(47_950), dec!(2), false);
        let updated = svc
            .update_order_status(&order.order_id, ConditionalStatus::Filled, Some(fill))
            .await
            .unwrap();
        assert!(updated.is_completed());
        assert_eq!(state.conditional_kind(&order.order_id), None);
    }

    #[tokio::test]
    async fn reconcile_defaults_missing_orders_to_cancelled() {
        let (svc, exchange, repository, _) = service();
        let order = svc
            .place_stop_order(PlaceStopOrderParams {
                product: product(),
                side: OrderSide::Sell,
                size: dec!(0.5),
                stop_price: dec!(48_000),
                limit_price: dec!(47_900),
            })
            .await
            .unwrap();

        // Exchange listing comes back empty: the order is gone.
        exchange.listed.lock().unwrap().clear();
        let summary = svc.reconcile().await.unwrap();
        assert_eq!(summary.checked, 1);
        assert_eq!(summary.cancelled_missing, 1);

        let stored = repository.get(&order.order_id).await.unwrap().unwrap();
        assert_eq!(stored.status(), ConditionalStatus::Cancelled);
    }

    #[tokio::test]
    async fn reconcile_mirrors_terminal_statuses() {
        let (svc, exchange, repository, _) = service();
        let order = svc
            .place_stop_order(PlaceStopOrderParams {
                product: product(),
                side: OrderSide::Sell,
                size: dec!(0.5),
                stop_price: dec!(48_000),
                limit_price: dec!(47_900),
            })
            .await
            .unwrap();

        exchange.listed.lock().unwrap().push(OrderSnapshot {
            order_id: order.order_id.clone(),
            product: product(),
            status: ExchangeOrderStatus::Expired,
            filled_size: dec!(0),
            average_price: None,
        });
        let summary = svc.reconcile().await.unwrap();
        assert_eq!(summary.mirrored, 1);

        let stored = repository.get(&order.order_id).await.unwrap().unwrap();
        assert_eq!(stored.status(), ConditionalStatus::Expired);
    }

    #[tokio::test]
    async fn cancel_reports_per_order_outcomes() {
        let (svc, exchange, _, _) = service();
        let order = svc
            .place_stop_order(PlaceStopOrderParams {
                product: product(),
                side: OrderSide::Sell,
                size: dec!(0.5),
                stop_price: dec!(48_000),
                limit_price: dec!(47_900),
            })
            .await
            .unwrap();

        let other = OrderId::new("not-ours");
        exchange.cancel_results.lock().unwrap().extend([
            CancelResult {
                order_id: order.order_id.clone(),
                success: true,
                reason: None,
            },
            CancelResult {
                order_id: other.clone(),
                success: false,
                reason: Some("unknown order".to_string()),
            },
        ]);

        let results = svc
            .cancel_orders(&[order.order_id.clone(), other])
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].success);
        assert!(!results[1].success);
    }

    #[tokio::test]
    async fn attached_bracket_fill_translation_follows_lifecycle() {
        let (svc, _, _, _) = service();
        let order = svc
            .place_entry_with_bracket(PlaceEntryBracketParams {
                product: product(),
                side: OrderSide::Buy,
                size: dec!(1),
                entry_price: dec!(50_000),
                take_profit_price: dec!(55_000),
                stop_loss_price: dec!(47_000),
            })
            .await
            .unwrap();

        // First FILLED report is the entry.
        let entry_fill = FillInfo::new(dec!(1), dec!(50_000), dec!(25), true);
        let updated = svc
            .apply_exchange_status(&order.order_id, ExchangeOrderStatus::Filled, Some(entry_fill))
            .await
            .unwrap();
        assert_eq!(updated.status(), ConditionalStatus::EntryFilled);

        // Second FILLED report is an exit leg.
        let exit_fill = FillInfo::new(dec!(1), dec!(55_000), dec!(27.5), true);
        let updated = svc
            .apply_exchange_status(&order.order_id, ExchangeOrderStatus::Filled, Some(exit_fill))
            .await
            .unwrap();
        assert_eq!(updated.status(), ConditionalStatus::TpFilled);
        assert!(updated.is_completed());
    }

    #[tokio::test]
    async fn statistics_count_by_shape_and_liveness() {
        let (svc, _, _, _) = service();
        svc.place_stop_order(PlaceStopOrderParams {
            product: product(),
            side: OrderSide::Sell,
            size: dec!(0.5),
            stop_price: dec!(48_000),
            limit_price: dec!(47_900),
        })
        .await
        .unwrap();
        svc.place_bracket_order(PlaceBracketParams {
            product: product(),
            side: OrderSide::Sell,
            size: dec!(1),
            take_profit_price: dec!(55_000),
            stop_loss_price: dec!(45_000),
        })
        .await
        .unwrap();

        let stats = svc.statistics().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.stop_limit, 1);
        assert_eq!(stats.bracket, 1);
        assert_eq!(stats.stop_loss, 1);
    }
}
