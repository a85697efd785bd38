//! Exchange port (driven port).
//!
//! The abstract capability contract the engine needs from a trading venue.
//! The core depends only on this shape, never on a specific transport.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::conditional::StopDirection;
use crate::domain::shared::{ClientOrderId, OrderId, OrderSide, ProductId};
use crate::domain::strategy::Candle;

/// Live top-of-book snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    /// Best bid.
    pub bid: Decimal,
    /// Best ask.
    pub ask: Decimal,
    /// Mid price.
    pub mid: Decimal,
}

/// Request to place a plain limit order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitOrderRequest {
    /// Client order id.
    pub client_order_id: ClientOrderId,
    /// Product.
    pub product: ProductId,
    /// Side.
    pub side: OrderSide,
    /// Size in base currency.
    pub size: Decimal,
    /// Limit price.
    pub price: Decimal,
    /// Reject instead of crossing the spread.
    pub post_only: bool,
}

/// Request to place a stop-limit order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopLimitOrderRequest {
    /// Client order id.
    pub client_order_id: ClientOrderId,
    /// Product.
    pub product: ProductId,
    /// Side.
    pub side: OrderSide,
    /// Size in base currency.
    pub size: Decimal,
    /// Trigger price.
    pub stop_price: Decimal,
    /// Limit price once triggered.
    pub limit_price: Decimal,
    /// Trigger direction.
    pub direction: StopDirection,
}

/// Request to place a TP/SL pair protecting an existing position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BracketOrderRequest {
    /// Client order id.
    pub client_order_id: ClientOrderId,
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

/// Request to place an entry order with an attached TP/SL pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryBracketOrderRequest {
    /// Client order id.
    pub client_order_id: ClientOrderId,
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

/// Aggregated fill data for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillSummary {
    /// Filled size in base currency.
    pub filled_size: Decimal,
    /// Filled value in quote currency.
    pub filled_value: Decimal,
    /// Fees in quote currency.
    pub fees: Decimal,
    /// Whether the fill provided liquidity.
    pub is_maker: bool,
}

/// Exchange-visible order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExchangeOrderStatus {
    /// Working on the book.
    Open,
    /// Fully filled.
    Filled,
    /// Cancelled.
    Cancelled,
    /// Expired.
    Expired,
    /// Rejected or otherwise failed.
    Failed,
}

impl ExchangeOrderStatus {
    /// Whether the exchange will never mutate this order again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Open)
    }
}

/// One row of an exchange order listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    /// Exchange order id.
    pub order_id: OrderId,
    /// Product.
    pub product: ProductId,
    /// Current status.
    pub status: ExchangeOrderStatus,
    /// Filled size so far.
    pub filled_size: Decimal,
    /// Average fill price, if anything filled.
    pub average_price: Option<Decimal>,
}

/// Per-order cancellation outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelResult {
    /// Order the result refers to.
    pub order_id: OrderId,
    /// Whether the cancel was accepted.
    pub success: bool,
    /// Failure detail when not accepted.
    pub reason: Option<String>,
}

/// Candle granularity for historical bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Granularity {
    /// 1-minute bars.
    OneMinute,
    /// 5-minute bars.
    FiveMinute,
    /// 15-minute bars.
    FifteenMinute,
    /// 1-hour bars.
    OneHour,
    /// 6-hour bars.
    SixHour,
    /// 1-day bars.
    OneDay,
}

impl Granularity {
    /// Bar length in seconds.
    #[must_use]
    pub const fn seconds(self) -> i64 {
        match self {
            Self::OneMinute => 60,
            Self::FiveMinute => 300,
            Self::FifteenMinute => 900,
            Self::OneHour => 3_600,
            Self::SixHour => 21_600,
            Self::OneDay => 86_400,
        }
    }
}

/// Exchange port error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExchangeError {
    /// Transport-level failure.
    #[error("Exchange connection error: {message}")]
    Connection {
        /// Error details.
        message: String,
    },

    /// Order rejected by the exchange.
    #[error("Order rejected: {reason}")]
    Rejected {
        /// Rejection reason.
        reason: String,
    },

    /// Order not found.
    #[error("Order not found: {order_id}")]
    NotFound {
        /// The missing order id.
        order_id: String,
    },

    /// Insufficient funds.
    #[error("Insufficient funds")]
    InsufficientFunds,

    /// Throttled by the exchange.
    #[error("Rate limited by exchange")]
    RateLimited,

    /// Anything else.
    #[error("Exchange error: {message}")]
    Unknown {
        /// Error details.
        message: String,
    },
}

/// Port for exchange interactions.
#[async_trait]
pub trait ExchangePort: Send + Sync {
    /// Current top-of-book for a product; `None` when the venue has no data.
    async fn price_snapshot(
        &self,
        product: &ProductId,
    ) -> Result<Option<PriceSnapshot>, ExchangeError>;

    /// Available balance for a currency.
    async fn balance(&self, currency: &str) -> Result<Decimal, ExchangeError>;

    /// Place a limit order; returns the exchange order id.
    async fn place_limit_order(&self, request: LimitOrderRequest) -> Result<OrderId, ExchangeError>;

    /// Place a stop-limit order.
    async fn place_stop_limit_order(
        &self,
        request: StopLimitOrderRequest,
    ) -> Result<OrderId, ExchangeError>;

    /// Place a TP/SL bracket for an existing position.
    async fn place_bracket_order(
        &self,
        request: BracketOrderRequest,
    ) -> Result<OrderId, ExchangeError>;

    /// Place an entry order with an attached bracket.
    async fn place_entry_with_bracket(
        &self,
        request: EntryBracketOrderRequest,
    ) -> Result<OrderId, ExchangeError>;

    /// Batched fill lookup; orders with no fills are absent from the map.
    async fn fills(
        &self,
        order_ids: &[OrderId],
    ) -> Result<HashMap<OrderId, FillSummary>, ExchangeError>;

    /// List orders, optionally restricted to the given ids.
    async fn list_orders(
        &self,
        order_ids: Option<&[OrderId]>,
    ) -> Result<Vec<OrderSnapshot>, ExchangeError>;

    /// Cancel orders; one failure never fails the batch.
    async fn cancel_orders(&self, order_ids: &[OrderId]) -> Result<Vec<CancelResult>, ExchangeError>;

    /// Historical bars for a product.
    async fn candles(
        &self,
        product: &ProductId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<Vec<Candle>, ExchangeError>;
}
