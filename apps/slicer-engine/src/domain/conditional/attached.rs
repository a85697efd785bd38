//! Attached bracket order state machine.
//!
//! An entry order with a TP/SL pair that activates only after the entry
//! fills. States: `PENDING → ENTRY_FILLED → {TP_FILLED, SL_FILLED, CANCELLED}`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::conditional::{ConditionalError, ConditionalKind, ConditionalStatus};
use crate::domain::shared::{ClientOrderId, DomainError, OrderId, OrderSide, ProductId};
use crate::domain::strategy::FillInfo;

/// Entry order plus attached exit bracket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachedBracketOrder {
    /// Exchange order id of the entry order.
    pub order_id: OrderId,
    /// Locally generated client id.
    pub client_order_id: ClientOrderId,
    /// Product.
    pub product: ProductId,
    /// Side of the entry order; exits trade the opposite side.
    pub side: OrderSide,
    /// Entry size.
    pub size: Decimal,
    /// Entry limit price.
    pub entry_price: Decimal,
    /// Take-profit limit price for the exit.
    pub take_profit_price: Decimal,
    /// Stop-loss trigger price for the exit.
    pub stop_loss_price: Decimal,
    /// Current state.
    pub status: ConditionalStatus,
    /// Confirmed entry fill size.
    pub entry_filled_size: Decimal,
    /// Confirmed entry fill value.
    pub entry_filled_value: Decimal,
    /// Confirmed exit fill size (either leg).
    pub exit_filled_size: Decimal,
    /// Confirmed exit fill value (either leg).
    pub exit_filled_value: Decimal,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl AttachedBracketOrder {
    /// Validate price levels and create a pending entry + bracket.
    ///
    /// The exit trades opposite the entry, so the TP/SL relationship checks
    /// against the exit side: a BUY entry exits with a SELL bracket (TP
    /// above SL), and vice versa.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        order_id: OrderId,
        client_order_id: ClientOrderId,
        product: ProductId,
        side: OrderSide,
        size: Decimal,
        entry_price: Decimal,
        take_profit_price: Decimal,
        stop_loss_price: Decimal,
    ) -> Result<Self, DomainError> {
        if size <= Decimal::ZERO {
            return Err(DomainError::NonPositiveSize { size });
        }
        let exit_side = side.opposite();
        crate::domain::conditional::BracketOrder::validate_prices(
            exit_side,
            take_profit_price,
            stop_loss_price,
        )?;
        let now = Utc::now();
        Ok(Self {
            order_id,
            client_order_id,
            product,
            side,
            size,
            entry_price,
            take_profit_price,
            stop_loss_price,
            status: ConditionalStatus::Pending,
            entry_filled_size: Decimal::ZERO,
            entry_filled_value: Decimal::ZERO,
            exit_filled_size: Decimal::ZERO,
            exit_filled_value: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether the order can still trade.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(
            self.status,
            ConditionalStatus::Pending | ConditionalStatus::EntryFilled
        )
    }

    /// Whether the order reached a terminal state.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        !self.is_active()
    }

    /// Apply a status transition. Fill deltas merge into the entry
    /// accumulators before the entry fills, and into the exit accumulators
    /// after.
    pub fn apply_status(
        &mut self,
        status: ConditionalStatus,
        fill: Option<&FillInfo>,
    ) -> Result<(), ConditionalError> {
        if !matches!(
            status,
            ConditionalStatus::Pending
                | ConditionalStatus::EntryFilled
                | ConditionalStatus::TpFilled
                | ConditionalStatus::SlFilled
                | ConditionalStatus::Cancelled
        ) {
            return Err(ConditionalError::InvalidStatus {
                kind: ConditionalKind::AttachedBracket,
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
            if status == ConditionalStatus::EntryFilled {
                self.entry_filled_size += fill.size;
                self.entry_filled_value += fill.value;
            } else {
                self.exit_filled_size += fill.size;
                self.exit_filled_value += fill.value;
            }
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

    fn order() -> AttachedBracketOrder {
        AttachedBracketOrder::new(
            OrderId::generate(),
            ClientOrderId::generate(),
            ProductId::new("BTC-USD").unwrap(),
            OrderSide::Buy,
            dec!(1),
            dec!(50_000),
            dec!(55_000),
            dec!(47_000),
        )
        .unwrap()
    }

    #[test]
    fn exit_side_drives_price_validation() {
        // BUY entry exits via SELL: TP must sit above SL.
        assert!(
            AttachedBracketOrder::new(
                OrderId::generate(),
                ClientOrderId::generate(),
                ProductId::new("BTC-USD").unwrap(),
                OrderSide::Buy,
                dec!(1),
                dec!(50_000),
                dec!(47_000),
                dec!(55_000),
            )
            .is_err()
        );
        // SELL entry exits via BUY: TP below SL.
        assert!(
            AttachedBracketOrder::new(
                OrderId::generate(),
                ClientOrderId::generate(),
                ProductId::new("BTC-USD").unwrap(),
                OrderSide::Sell,
                dec!(1),
                dec!(50_000),
                dec!(47_000),
                dec!(55_000),
            )
            .is_ok()
        );
    }

    #[test]
    fn lifecycle_entry_then_take_profit() {
        let mut o = order();
        assert!(o.is_active());

        let entry = FillInfo::new(dec!(1), dec!(50_000), dec!(25), true);
        o.apply_status(ConditionalStatus::EntryFilled, Some(&entry)).unwrap();
        assert!(o.is_active());
        assert_eq!(o.entry_filled_size, dec!(1));
        assert_eq!(o.entry_filled_value, dec!(50_000));

        let exit = FillInfo::new(dec!(1), dec!(55_000), dec!(27.5), true);
        o.apply_status(ConditionalStatus::TpFilled, Some(&exit)).unwrap();
        assert!(o.is_completed());
        assert_eq!(o.exit_filled_size, dec!(1));
        assert_eq!(o.exit_filled_value, dec!(55_000));
        // Entry accumulators untouched by the exit fill.
        assert_eq!(o.entry_filled_size, dec!(1));
    }

    #[test]
    fn stop_leg_completes_the_order() {
        let mut o = order();
        o.apply_status(ConditionalStatus::EntryFilled, None).unwrap();
        o.apply_status(
            ConditionalStatus::SlFilled,
            Some(&FillInfo::new(dec!(1), dec!(47_000), dec!(23.5), false)),
        )
        .unwrap();
        assert_eq!(o.status, ConditionalStatus::SlFilled);
        assert!(o.is_completed());
    }

    #[test]
    fn rejects_foreign_statuses() {
        let mut o = order();
        let err = o.apply_status(ConditionalStatus::Triggered, None).unwrap_err();
        assert!(matches!(err, ConditionalError::InvalidStatus { .. }));
    }

    #[test]
    fn active_xor_completed_for_every_state() {
        for status in [
            ConditionalStatus::Pending,
            ConditionalStatus::EntryFilled,
            ConditionalStatus::TpFilled,
            ConditionalStatus::SlFilled,
            ConditionalStatus::Cancelled,
        ] {
            let mut o = order();
            o.status = status;
            assert!(o.is_active() ^ o.is_completed(), "{status:?}");
        }
    }
}
