//! Hand-rolled port fakes shared by the service tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::application::ports::{
    BracketOrderRequest, CancelResult, EntryBracketOrderRequest, ExchangeError, ExchangePort,
    FillSummary, Granularity, LimitOrderRequest, OrderSnapshot, PriceSnapshot,
    StopLimitOrderRequest,
};
use crate::domain::shared::{OrderId, ProductId};
use crate::domain::strategy::Candle;

/// Scriptable in-memory exchange.
#[derive(Debug)]
pub(crate) struct FakeExchange {
    /// Per-call snapshot overrides, consumed front-to-back; falls back to
    /// `snapshot` when empty.
    pub snapshot_queue: Mutex<VecDeque<Option<PriceSnapshot>>>,
    pub snapshot: Mutex<Option<PriceSnapshot>>,
    pub balances: Mutex<HashMap<String, Decimal>>,
    pub default_balance: Decimal,
    pub fills: Mutex<HashMap<OrderId, FillSummary>>,
    pub listed: Mutex<Vec<OrderSnapshot>>,
    pub candles: Mutex<Vec<Candle>>,
    pub cancel_results: Mutex<Vec<CancelResult>>,
    pub reject_placements: AtomicBool,
    pub placed_limit: Mutex<Vec<LimitOrderRequest>>,
    pub placed_stop: Mutex<Vec<StopLimitOrderRequest>>,
    pub placed_bracket: Mutex<Vec<BracketOrderRequest>>,
    pub placed_entry: Mutex<Vec<EntryBracketOrderRequest>>,
    pub fills_calls: AtomicU32,
    order_seq: AtomicU32,
}

impl Default for FakeExchange {
    fn default() -> Self {
        Self {
            snapshot_queue: Mutex::new(VecDeque::new()),
            snapshot: Mutex::new(Some(PriceSnapshot {
                bid: dec!(49_990),
                ask: dec!(50_010),
                mid: dec!(50_000),
            })),
            balances: Mutex::new(HashMap::new()),
            default_balance: dec!(1_000_000_000),
            fills: Mutex::new(HashMap::new()),
            listed: Mutex::new(Vec::new()),
            candles: Mutex::new(Vec::new()),
            cancel_results: Mutex::new(Vec::new()),
            reject_placements: AtomicBool::new(false),
            placed_limit: Mutex::new(Vec::new()),
            placed_stop: Mutex::new(Vec::new()),
            placed_bracket: Mutex::new(Vec::new()),
            placed_entry: Mutex::new(Vec::new()),
            fills_calls: AtomicU32::new(0),
            order_seq: AtomicU32::new(0),
        }
    }
}

impl FakeExchange {
    pub(crate) fn next_order_id(&self) -> OrderId {
        let n = self.order_seq.fetch_add(1, Ordering::SeqCst);
        OrderId::new(format!("exch-{n}"))
    }

    fn place(&self) -> Result<OrderId, ExchangeError> {
        if self.reject_placements.load(Ordering::SeqCst) {
            return Err(ExchangeError::Rejected {
                reason: "scripted rejection".to_string(),
            });
        }
        Ok(self.next_order_id())
    }
}

#[async_trait]
impl ExchangePort for FakeExchange {
    async fn price_snapshot(
        &self,
        _product: &ProductId,
    ) -> Result<Option<PriceSnapshot>, ExchangeError> {
        if let Some(scripted) = self.snapshot_queue.lock().unwrap().pop_front() {
            return Ok(scripted);
        }
        Ok(*self.snapshot.lock().unwrap())
    }

    async fn balance(&self, currency: &str) -> Result<Decimal, ExchangeError> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(currency)
            .copied()
            .unwrap_or(self.default_balance))
    }

    async fn place_limit_order(&self, request: LimitOrderRequest) -> Result<OrderId, ExchangeError> {
        let id = self.place()?;
        self.placed_limit.lock().unwrap().push(request);
        Ok(id)
    }

    async fn place_stop_limit_order(
        &self,
        request: StopLimitOrderRequest,
    ) -> Result<OrderId, ExchangeError> {
        let id = self.place()?;
        self.placed_stop.lock().unwrap().push(request);
        Ok(id)
    }

    async fn place_bracket_order(
        &self,
        request: BracketOrderRequest,
    ) -> Result<OrderId, ExchangeError> {
        let id = self.place()?;
        self.placed_bracket.lock().unwrap().push(request);
        Ok(id)
    }

    async fn place_entry_with_bracket(
        &self,
        request: EntryBracketOrderRequest,
    ) -> Result<OrderId, ExchangeError> {
        let id = self.place()?;
        self.placed_entry.lock().unwrap().push(request);
        Ok(id)
    }

    async fn fills(
        &self,
        order_ids: &[OrderId],
    ) -> Result<HashMap<OrderId, FillSummary>, ExchangeError> {
        self.fills_calls.fetch_add(1, Ordering::SeqCst);
        let fills = self.fills.lock().unwrap();
        Ok(order_ids
            .iter()
            .filter_map(|id| fills.get(id).map(|f| (id.clone(), f.clone())))
            .collect())
    }

    async fn list_orders(
        &self,
        order_ids: Option<&[OrderId]>,
    ) -> Result<Vec<OrderSnapshot>, ExchangeError> {
        let listed = self.listed.lock().unwrap();
        Ok(match order_ids {
            Some(ids) => listed
                .iter()
                .filter(|s| ids.contains(&s.order_id))
                .cloned()
                .collect(),
            None => listed.clone(),
        })
    }

    async fn cancel_orders(
        &self,
        order_ids: &[OrderId],
    ) -> Result<Vec<CancelResult>, ExchangeError> {
        let scripted = self.cancel_results.lock().unwrap();
        if scripted.is_empty() {
            return Ok(order_ids
                .iter()
                .map(|id| CancelResult {
                    order_id: id.clone(),
                    success: true,
                    reason: None,
                })
                .collect());
        }
        Ok(scripted.clone())
    }

    async fn candles(
        &self,
        _product: &ProductId,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _granularity: Granularity,
    ) -> Result<Vec<Candle>, ExchangeError> {
        Ok(self.candles.lock().unwrap().clone())
    }
}
