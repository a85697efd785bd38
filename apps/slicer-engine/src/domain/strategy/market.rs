//! Live and historical market data handed to strategies.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One historical OHLCV bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time.
    pub start: DateTime<Utc>,
    /// Lowest traded price.
    pub low: Decimal,
    /// Highest traded price.
    pub high: Decimal,
    /// Opening price.
    pub open: Decimal,
    /// Closing price.
    pub close: Decimal,
    /// Traded volume in base currency.
    pub volume: Decimal,
}

impl Candle {
    /// Typical price `(high + low + close) / 3`, the per-bar input to
    /// benchmark VWAP.
    #[must_use]
    pub fn typical_price(&self) -> Decimal {
        (self.high + self.low + self.close) / Decimal::from(3)
    }
}

/// Snapshot of live market conditions at a slice decision point.
///
/// Fields are optional: a strategy must degrade safely when a fetch failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketContext {
    /// Best bid, if available.
    pub bid: Option<Decimal>,
    /// Best ask, if available.
    pub ask: Option<Decimal>,
    /// Mid price, if available.
    pub mid: Option<Decimal>,
    /// Trailing traded volume over the strategy's lookback window, if the
    /// strategy asked for one and the fetch succeeded.
    pub recent_volume: Option<Decimal>,
}

impl MarketContext {
    /// Context with bid/ask/mid populated from a live snapshot.
    #[must_use]
    pub const fn with_prices(bid: Decimal, ask: Decimal, mid: Decimal) -> Self {
        Self {
            bid: Some(bid),
            ask: Some(ask),
            mid: Some(mid),
            recent_volume: None,
        }
    }

    /// Attach trailing volume.
    #[must_use]
    pub const fn with_recent_volume(mut self, volume: Decimal) -> Self {
        self.recent_volume = Some(volume);
        self
    }

    /// Context with no market data at all.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self {
            bid: None,
            ask: None,
            mid: None,
            recent_volume: None,
        }
    }
}
