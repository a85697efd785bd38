//! Stop-limit order state machine.
//!
//! States: `PENDING → TRIGGERED → {FILLED, CANCELLED, EXPIRED}`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::conditional::{ConditionalError, ConditionalKind, ConditionalStatus};
use crate::domain::shared::{ClientOrderId, OrderId, OrderSide, ProductId};
use crate::domain::strategy::FillInfo;

/// Which way the market must move to fire the stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopDirection {
    /// Trigger when the price rises to the stop.
    StopUp,
    /// Trigger when the price falls to the stop.
    StopDown,
}

/// Display classification of a stop-limit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerKind {
    /// Exits a position at a loss to cap damage.
    StopLoss,
    /// Exits a position at a gain.
    TakeProfit,
}

/// A stop-limit conditional order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopLimitOrder {
    /// Exchange order id.
    pub order_id: OrderId,
    /// Locally generated client id.
    pub client_order_id: ClientOrderId,
    /// Product.
    pub product: ProductId,
    /// Side of the triggered limit order.
    pub side: OrderSide,
    /// Order size.
    pub size: Decimal,
    /// Trigger price.
    pub stop_price: Decimal,
    /// Limit price of the order placed once triggered.
    pub limit_price: Decimal,
    /// Derived trigger direction.
    pub direction: StopDirection,
    /// Derived display kind.
    pub trigger_kind: TriggerKind,
    /// Current state.
    pub status: ConditionalStatus,
    /// Confirmed filled size.
    pub filled_size: Decimal,
    /// Confirmed filled value.
    pub filled_value: Decimal,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl StopLimitOrder {
    /// Create a pending stop-limit order.
    ///
    /// Direction and kind are derived from the side and where the stop sits
    /// relative to the current mid price; the caller only supplies raw
    /// price levels.
    #[must_use]
    pub fn new(
        order_id: OrderId,
        client_order_id: ClientOrderId,
        product: ProductId,
        side: OrderSide,
        size: Decimal,
        stop_price: Decimal,
        limit_price: Decimal,
        current_mid: Decimal,
    ) -> Self {
        let (direction, trigger_kind) = Self::derive_trigger(side, stop_price, current_mid);
        let now = Utc::now();
        Self {
            order_id,
            client_order_id,
            product,
            side,
            size,
            stop_price,
            limit_price,
            direction,
            trigger_kind,
            status: ConditionalStatus::Pending,
            filled_size: Decimal::ZERO,
            filled_value: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Derive trigger direction and display kind from raw price levels.
    ///
    /// A stop above the mid fires on the way up, below on the way down. A
    /// SELL firing downward (or a BUY firing upward) is cutting a loss;
    /// the other combinations lock in a gain.
    #[must_use]
    pub fn derive_trigger(
        side: OrderSide,
        stop_price: Decimal,
        current_mid: Decimal,
    ) -> (StopDirection, TriggerKind) {
        let direction = if stop_price > current_mid {
            StopDirection::StopUp
        } else {
            StopDirection::StopDown
        };
        let trigger_kind = match (side, direction) {
            (OrderSide::Sell, StopDirection::StopDown) | (OrderSide::Buy, StopDirection::StopUp) => {
                TriggerKind::StopLoss
            }
            _ => TriggerKind::TakeProfit,
        };
        (direction, trigger_kind)
    }

    /// Whether the order can still trade.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(
            self.status,
            ConditionalStatus::Pending | ConditionalStatus::Triggered
        )
    }

    /// Whether the order reached a terminal state.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        !self.is_active()
    }

    /// Apply a status transition.
    pub fn apply_status(
        &mut self,
        status: ConditionalStatus,
        fill: Option<&FillInfo>,
    ) -> Result<(), ConditionalError> {
        if !matches!(
            status,
            ConditionalStatus::Pending
                | ConditionalStatus::Triggered
                | ConditionalStatus::Filled
                | ConditionalStatus::Cancelled
                | ConditionalStatus::Expired
        ) {
            return Err(ConditionalError::InvalidStatus {
                kind: ConditionalKind::StopLimit,
                status,
            });
        }
        if self.is_completed() {
            return Err(ConditionalError::AlreadyCompleted {
                order_id: self.order_id.as_str().to_string(),
                status: self.status,
            });
        }
        if let Some(fill) = fill {
            self.filled_size += fill.size;
            self.filled_value += fill.value;
        }
        self.status = status;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(side: OrderSide, stop: Decimal, mid: Decimal) -> StopLimitOrder {
        StopLimitOrder::new(
            OrderId::generate(),
            ClientOrderId::generate(),
            ProductId::new("BTC-USD").unwrap(),
            side,
            dec!(0.5),
            stop,
            stop,
            mid,
        )
    }

    #[test]
    fn sell_below_mid_is_a_stop_loss() {
        let o = order(OrderSide::Sell, dec!(48_000), dec!(50_000));
        assert_eq!(o.direction, StopDirection::StopDown);
        assert_eq!(o.trigger_kind, TriggerKind::StopLoss);
    }

    #[test]
    fn sell_above_mid_is_a_take_profit() {
        let o = order(OrderSide::Sell, dec!(52_000), dec!(50_000));
        assert_eq!(o.direction, StopDirection::StopUp);
        assert_eq!(o.trigger_kind, TriggerKind::TakeProfit);
    }

    #[test]
    fn buy_above_mid_is_a_stop_loss() {
        // Covering a short as the market runs away upward.
        let o = order(OrderSide::Buy, dec!(52_000), dec!(50_000));
        assert_eq!(o.direction, StopDirection::StopUp);
        assert_eq!(o.trigger_kind, TriggerKind::StopLoss);
    }

    #[test]
    fn buy_below_mid_is_a_take_profit() {
        let o = order(OrderSide::Buy, dec!(48_000), dec!(50_000));
        assert_eq!(o.direction, StopDirection::StopDown);
        assert_eq!(o.trigger_kind, TriggerKind::TakeProfit);
    }

    #[test]
    fn lifecycle_pending_triggered_filled() {
        let mut o = order(OrderSide::Sell, dec!(48_000), dec!(50_000));
        assert!(o.is_active());

        o.apply_status(ConditionalStatus::Triggered, None).unwrap();
        assert!(o.is_active());

        let fill = FillInfo::new(dec!(0.5), dec!(47_990), dec!(2), false);
        o.apply_status(ConditionalStatus::Filled, Some(&fill)).unwrap();
        assert!(o.is_completed());
        assert_eq!(o.filled_size, dec!(0.5));
        assert_eq!(o.filled_value, dec!(23_995));
    }

    #[test]
    fn rejects_foreign_statuses() {
        let mut o = order(OrderSide::Sell, dec!(48_000), dec!(50_000));
        let err = o
            .apply_status(ConditionalStatus::EntryFilled, None)
            .unwrap_err();
        assert!(matches!(err, ConditionalError::InvalidStatus { .. }));
    }

    #[test]
    fn rejects_mutation_after_completion() {
        let mut o = order(OrderSide::Sell, dec!(48_000), dec!(50_000));
        o.apply_status(ConditionalStatus::Cancelled, None).unwrap();
        let err = o.apply_status(ConditionalStatus::Filled, None).unwrap_err();
        assert!(matches!(err, ConditionalError::AlreadyCompleted { .. }));
    }

    #[test]
    fn active_xor_completed_for_every_state() {
        for status in [
            ConditionalStatus::Pending,
            ConditionalStatus::Triggered,
            ConditionalStatus::Filled,
            ConditionalStatus::Cancelled,
            ConditionalStatus::Expired,
        ] {
            let mut o = order(OrderSide::Sell, dec!(48_000), dec!(50_000));
            o.status = status;
            assert!(o.is_active() ^ o.is_completed(), "{status:?}");
        }
    }
}
