//! Background order monitor.
//!
//! A single long-running task owns fill detection for every outstanding
//! order. Strategy child orders are polled in batches through one fills
//! request; conditional orders are checked individually against the order
//! listing. Push-delivered fill events feed the same dedup set, so an order
//! reported by both paths is only ever counted once.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::ports::{ExchangeOrderStatus, ExchangePort, ExecutionRepository};
use crate::application::services::conditional::{ConditionalOrderService, ConditionalServiceError};
use crate::application::services::shared_state::SharedState;
use crate::domain::shared::{OrderId, OrderSide, ProductId};
use crate::domain::strategy::FillInfo;
use crate::resilience::RateLimiter;

/// Work items on the monitor queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorMessage {
    /// Check this order for fills.
    Order(OrderId),
    /// Drain and stop.
    Shutdown,
}

/// A fill reported by a push channel (user-order stream).
#[derive(Debug, Clone)]
pub struct FillEvent {
    /// Exchange order id.
    pub order_id: OrderId,
    /// Product.
    pub product: ProductId,
    /// Side.
    pub side: OrderSide,
    /// Filled size in base currency.
    pub size: Decimal,
    /// Fill price.
    pub price: Decimal,
    /// Fee charged.
    pub fee: Decimal,
    /// Order status reported with the event.
    pub status: ExchangeOrderStatus,
    /// Whether the fill added liquidity.
    pub is_maker: bool,
}

/// Monitor cadence and batching.
#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    /// Queue wait when polling carries detection.
    pub poll_interval: Duration,
    /// Queue wait when push delivery carries detection and polling is only
    /// the safety net.
    pub push_poll_interval: Duration,
    /// Maximum strategy orders folded into one fills request.
    pub batch_size: usize,
    /// Sleep when nothing is tracked.
    pub idle_sleep: Duration,
    /// Whether a push channel is feeding `on_fill_event`.
    pub push_enabled: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            push_poll_interval: Duration::from_secs(30),
            batch_size: 50,
            idle_sleep: Duration::from_secs(5),
            push_enabled: false,
        }
    }
}

/// Background fill-detection worker.
pub struct OrderMonitor {
    state: Arc<SharedState>,
    exchange: Arc<dyn ExchangePort>,
    repository: Arc<dyn ExecutionRepository>,
    conditionals: Arc<ConditionalOrderService>,
    limiter: Arc<RateLimiter>,
    config: MonitorConfig,
    tx: mpsc::UnboundedSender<MonitorMessage>,
    rx: StdMutex<Option<mpsc::UnboundedReceiver<MonitorMessage>>>,
    running: AtomicBool,
}

impl OrderMonitor {
    /// Build a monitor; `spawn` starts the loop.
    #[must_use]
    pub fn new(
        state: Arc<SharedState>,
        exchange: Arc<dyn ExchangePort>,
        repository: Arc<dyn ExecutionRepository>,
        conditionals: Arc<ConditionalOrderService>,
        limiter: Arc<RateLimiter>,
        config: MonitorConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            state,
            exchange,
            repository,
            conditionals,
            limiter,
            config,
            tx,
            rx: StdMutex::new(Some(rx)),
            running: AtomicBool::new(false),
        }
    }

    /// Queue an order for fill checking. Safe from any task.
    pub fn enqueue(&self, order_id: OrderId) {
        if self.tx.send(MonitorMessage::Order(order_id)).is_err() {
            warn!("monitor queue closed; order dropped");
        }
    }

    /// Ask the loop to drain and stop.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.tx.send(MonitorMessage::Shutdown);
    }

    /// Whether the loop is live.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the background loop. Returns `None` if already started.
    pub fn spawn(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let rx = self.rx.lock().unwrap_or_else(std::sync::PoisonError::into_inner).take()?;
        self.running.store(true, Ordering::SeqCst);
        let monitor = Arc::clone(self);
        Some(tokio::spawn(async move {
            monitor.run(rx).await;
        }))
    }

    fn queue_wait(&self) -> Duration {
        if self.config.push_enabled {
            self.config.push_poll_interval
        } else {
            self.config.poll_interval
        }
    }

    async fn run(&self, mut rx: mpsc::UnboundedReceiver<MonitorMessage>) {
        info!(push_enabled = self.config.push_enabled, "order monitor started");
        loop {
            if !self.state.has_tracked_orders() {
                if !self.is_running() {
                    break;
                }
                // Drain anything queued while idle; otherwise nap.
                match tokio::time::timeout(self.config.idle_sleep, rx.recv()).await {
                    Ok(Some(MonitorMessage::Shutdown) | None) => break,
                    Ok(Some(MonitorMessage::Order(id))) => {
                        // Late requeue for an untracked order; drop it.
                        debug!(order_id = %id, "order no longer tracked");
                    }
                    Err(_) => {}
                }
                continue;
            }

            let first = match tokio::time::timeout(self.queue_wait(), rx.recv()).await {
                Ok(Some(msg)) => msg,
                Ok(None) => break,
                Err(_) => continue,
            };

            let mut strategy_batch = Vec::new();
            let mut conditional_batch = Vec::new();
            let mut stop = false;
            self.classify(first, &mut strategy_batch, &mut conditional_batch, &mut stop);
            while !stop && strategy_batch.len() < self.config.batch_size {
                match rx.try_recv() {
                    Ok(msg) => {
                        self.classify(msg, &mut strategy_batch, &mut conditional_batch, &mut stop);
                    }
                    Err(_) => break,
                }
            }

            if !strategy_batch.is_empty() {
                self.poll_strategy_orders(&strategy_batch).await;
            }
            for order_id in conditional_batch {
                self.check_conditional(&order_id).await;
            }
            if stop {
                break;
            }
        }
        self.running.store(false, Ordering::SeqCst);
        info!("order monitor stopped");
    }

    fn classify(
        &self,
        msg: MonitorMessage,
        strategy: &mut Vec<OrderId>,
        conditional: &mut Vec<OrderId>,
        stop: &mut bool,
    ) {
        match msg {
            MonitorMessage::Shutdown => *stop = true,
            MonitorMessage::Order(id) => {
                if self.state.is_strategy_order(&id) {
                    strategy.push(id);
                } else if self.state.conditional_kind(&id).is_some() {
                    conditional.push(id);
                } else {
                    debug!(order_id = %id, "order no longer tracked");
                }
            }
        }
    }

    /// One batched fills request for a set of strategy child orders. Orders
    /// absent from the response are not yet filled and go back on the queue.
    async fn poll_strategy_orders(&self, batch: &[OrderId]) {
        self.limiter.wait().await;
        let fills = match self.exchange.fills(batch).await {
            Ok(fills) => fills,
            Err(e) => {
                warn!(error = %e, orders = batch.len(), "fills request failed; requeueing batch");
                for order_id in batch {
                    self.enqueue(order_id.clone());
                }
                return;
            }
        };

        for order_id in batch {
            if let Some(summary) = fills.get(order_id) {
                let price = if summary.filled_size > Decimal::ZERO {
                    summary.filled_value / summary.filled_size
                } else {
                    Decimal::ZERO
                };
                let fill = FillInfo::new(summary.filled_size, price, summary.fees, summary.is_maker);
                self.record_strategy_fill(order_id, &fill).await;
            } else if !self.state.already_filled(order_id) {
                self.enqueue(order_id.clone());
            }
        }
    }

    /// Fold a fill into the parent execution (once) and checkpoint it.
    async fn record_strategy_fill(&self, order_id: &OrderId, fill: &FillInfo) {
        let Some(execution_id) = self.state.apply_fill(order_id, fill) else {
            return;
        };
        debug!(order_id = %order_id, execution_id = %execution_id, size = %fill.size, "fill recorded");
        if let Some(snapshot) = self.state.execution_snapshot(&execution_id) {
            if let Err(e) = self.repository.save(&snapshot).await {
                // Checkpoint failure loses durability, not correctness; the
                // in-memory aggregate already holds the fill.
                warn!(execution_id = %execution_id, error = %e, "execution checkpoint failed");
            }
        }
    }

    /// Check one conditional order against the exchange listing, mirroring a
    /// terminal status locally. Still-open orders go back on the queue.
    async fn check_conditional(&self, order_id: &OrderId) {
        self.limiter.wait().await;
        let listed = match self
            .exchange
            .list_orders(Some(std::slice::from_ref(order_id)))
            .await
        {
            Ok(listed) => listed,
            Err(e) => {
                warn!(order_id = %order_id, error = %e, "order lookup failed; requeueing");
                self.enqueue(order_id.clone());
                return;
            }
        };

        let Some(snapshot) = listed.into_iter().find(|s| &s.order_id == order_id) else {
            // Not in the listing; reconciliation owns the fail-safe cancel.
            self.enqueue(order_id.clone());
            return;
        };

        if !snapshot.status.is_terminal() {
            self.enqueue(order_id.clone());
            return;
        }

        let fill = (snapshot.filled_size > Decimal::ZERO).then(|| {
            FillInfo::new(
                snapshot.filled_size,
                snapshot.average_price.unwrap_or_default(),
                Decimal::ZERO,
                false,
            )
        });
        match self
            .conditionals
            .apply_exchange_status(order_id, snapshot.status, fill)
            .await
        {
            Ok(order) => {
                if !order.is_completed() {
                    // Attached bracket advanced to ENTRY_FILLED; keep watching.
                    self.enqueue(order_id.clone());
                }
            }
            Err(ConditionalServiceError::NotFound { .. }) => {
                self.state.untrack_conditional(order_id);
            }
            Err(e) => {
                warn!(order_id = %order_id, error = %e, "conditional status update failed");
                self.enqueue(order_id.clone());
            }
        }
    }

    /// Entry point for push-delivered fill events. Strategy orders share the
    /// polling path's dedup set; conditional orders route through the same
    /// status translation.
    pub async fn on_fill_event(&self, event: FillEvent) {
        if self.state.is_strategy_order(&event.order_id) {
            let fill = FillInfo::new(event.size, event.price, event.fee, event.is_maker);
            self.record_strategy_fill(&event.order_id, &fill).await;
        } else if self.state.conditional_kind(&event.order_id).is_some() {
            let fill = (event.size > Decimal::ZERO)
                .then(|| FillInfo::new(event.size, event.price, event.fee, event.is_maker));
            if let Err(e) = self
                .conditionals
                .apply_exchange_status(&event.order_id, event.status, fill)
                .await
            {
                warn!(order_id = %event.order_id, error = %e, "push status update failed");
            }
        } else {
            debug!(order_id = %event.order_id, "push event for untracked order");
        }
    }
}
