//! Bracket order state machine.
//!
//! A single order carrying both a take-profit limit and a stop-loss trigger
//! for an existing position. States: `{PENDING, ACTIVE} → {FILLED, CANCELLED}`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::conditional::{ConditionalError, ConditionalKind, ConditionalStatus};
use crate::domain::shared::{ClientOrderId, DomainError, OrderId, OrderSide, ProductId};
use crate::domain::strategy::FillInfo;

/// A TP/SL pair protecting an existing position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketOrder {
    /// Exchange order id.
    pub order_id: OrderId,
    /// Locally generated client id.
    pub client_order_id: ClientOrderId,
    /// Product.
    pub product: ProductId,
    /// Side of the exit orders (SELL protects a long position).
    pub side: OrderSide,
    /// Order size.
    pub size: Decimal,
    /// Take-profit limit price.
    pub take_profit_price: Decimal,
    /// Stop-loss trigger price.
    pub stop_loss_price: Decimal,
    /// Current state.
    pub status: ConditionalStatus,
    /// Size filled through the take-profit leg.
    pub tp_filled_size: Decimal,
    /// Size filled through the stop-loss leg.
    pub sl_filled_size: Decimal,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl BracketOrder {
    /// Validate price levels and create a pending bracket.
    ///
    /// A SELL bracket (long position) needs its take-profit above its
    /// stop-loss; a BUY bracket (short position) the reverse.
    pub fn new(
        order_id: OrderId,
        client_order_id: ClientOrderId,
        product: ProductId,
        side: OrderSide,
        size: Decimal,
        take_profit_price: Decimal,
        stop_loss_price: Decimal,
    ) -> Result<Self, DomainError> {
        Self::validate_prices(side, take_profit_price, stop_loss_price)?;
        if size <= Decimal::ZERO {
            return Err(DomainError::NonPositiveSize { size });
        }
        let now = Utc::now();
        Ok(Self {
            order_id,
            client_order_id,
            product,
            side,
            size,
            take_profit_price,
            stop_loss_price,
            status: ConditionalStatus::Pending,
            tp_filled_size: Decimal::ZERO,
            sl_filled_size: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        })
    }

    /// Check the TP/SL price relationship for a side.
    pub fn validate_prices(
        side: OrderSide,
        take_profit: Decimal,
        stop_loss: Decimal,
    ) -> Result<(), DomainError> {
        let ordered = match side {
            OrderSide::Sell => take_profit > stop_loss,
            OrderSide::Buy => take_profit < stop_loss,
        };
        if !ordered {
            return Err(DomainError::InvalidBracketPrices {
                side,
                take_profit,
                stop_loss,
            });
        }
        Ok(())
    }

    /// Whether the bracket can still trade.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(
            self.status,
            ConditionalStatus::Pending | ConditionalStatus::Active
        )
    }

    /// Whether the bracket reached a terminal state.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        !self.is_active()
    }

    /// Apply a status transition. A `TP_FILLED`/`SL_FILLED` report routes
    /// the fill into the matching leg accumulator and terminates the
    /// bracket as `FILLED`.
    pub fn apply_status(
        &mut self,
        status: ConditionalStatus,
        fill: Option<&FillInfo>,
    ) -> Result<(), ConditionalError> {
        if self.is_completed() {
            return Err(ConditionalError::AlreadyCompleted {
                order_id: self.order_id.as_str().to_string(),
                status: self.status,
            });
        }
        let next = match status {
            ConditionalStatus::Pending
            | ConditionalStatus::Active
            | ConditionalStatus::Filled
            | ConditionalStatus::Cancelled => status,
            ConditionalStatus::TpFilled => {
                if let Some(fill) = fill {
                    self.tp_filled_size += fill.size;
                }
                ConditionalStatus::Filled
            }
            ConditionalStatus::SlFilled => {
                if let Some(fill) = fill {
                    self.sl_filled_size += fill.size;
                }
                ConditionalStatus::Filled
            }
            _ => {
                return Err(ConditionalError::InvalidStatus {
                    kind: ConditionalKind::Bracket,
                    status,
                });
            }
        };
        if status == ConditionalStatus::Filled {
            // Unattributed fills land on the take-profit leg.
            if let Some(fill) = fill {
                self.tp_filled_size += fill.size;
            }
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bracket(side: OrderSide, tp: Decimal, sl: Decimal) -> Result<BracketOrder, DomainError> {
        BracketOrder::new(
            OrderId::generate(),
            ClientOrderId::generate(),
            ProductId::new("ETH-USD").unwrap(),
            side,
            dec!(2),
            tp,
            sl,
        )
    }

    #[test]
    fn sell_bracket_requires_tp_above_sl() {
        assert!(bracket(OrderSide::Sell, dec!(3_500), dec!(2_800)).is_ok());
        assert!(bracket(OrderSide::Sell, dec!(2_800), dec!(3_500)).is_err());
    }

    #[test]
    fn buy_bracket_requires_tp_below_sl() {
        assert!(bracket(OrderSide::Buy, dec!(2_800), dec!(3_500)).is_ok());
        assert!(bracket(OrderSide::Buy, dec!(3_500), dec!(2_800)).is_err());
    }

    #[test]
    fn tp_fill_routes_to_tp_leg_and_terminates() {
        let mut o = bracket(OrderSide::Sell, dec!(3_500), dec!(2_800)).unwrap();
        o.apply_status(ConditionalStatus::Active, None).unwrap();
        assert!(o.is_active());

        let fill = FillInfo::new(dec!(2), dec!(3_500), dec!(1), true);
        o.apply_status(ConditionalStatus::TpFilled, Some(&fill)).unwrap();
        assert_eq!(o.status, ConditionalStatus::Filled);
        assert_eq!(o.tp_filled_size, dec!(2));
        assert_eq!(o.sl_filled_size, dec!(0));
        assert!(o.is_completed());
    }

    #[test]
    fn sl_fill_routes_to_sl_leg() {
        let mut o = bracket(OrderSide::Sell, dec!(3_500), dec!(2_800)).unwrap();
        let fill = FillInfo::new(dec!(2), dec!(2_800), dec!(1), false);
        o.apply_status(ConditionalStatus::SlFilled, Some(&fill)).unwrap();
        assert_eq!(o.sl_filled_size, dec!(2));
        assert_eq!(o.tp_filled_size, dec!(0));
    }

    #[test]
    fn rejects_foreign_statuses() {
        let mut o = bracket(OrderSide::Sell, dec!(3_500), dec!(2_800)).unwrap();
        let err = o.apply_status(ConditionalStatus::Triggered, None).unwrap_err();
        assert!(matches!(err, ConditionalError::InvalidStatus { .. }));
    }

    #[test]
    fn active_xor_completed_for_every_state() {
        for status in [
            ConditionalStatus::Pending,
            ConditionalStatus::Active,
            ConditionalStatus::Filled,
            ConditionalStatus::Cancelled,
        ] {
            let mut o = bracket(OrderSide::Sell, dec!(3_500), dec!(2_800)).unwrap();
            o.status = status;
            assert!(o.is_active() ^ o.is_completed(), "{status:?}");
        }
    }
}
