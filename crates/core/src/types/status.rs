//! Order lifecycle enums and the cancellation rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Order status.
///
/// ```text
/// processing ──► confirmed ──► received
///     │              │
///     ├──► expired   └──► canceled (only while unpaid)
///     └──► canceled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Processing,
    Confirmed,
    Received,
    Expired,
    Canceled,
}

/// Why an order cannot be canceled.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelRejection {
    /// Payment has already been captured.
    #[error("order has already been paid")]
    AlreadyPaid,
    /// The order is past the point where cancellation is allowed.
    #[error("order in status {0} cannot be canceled")]
    InvalidStatus(OrderStatus),
}

impl OrderStatus {
    /// Check whether an order in this status may be canceled by its owner.
    ///
    /// Cancellation is only legal from `processing` or `confirmed`, and never
    /// after a payment timestamp has been recorded.
    ///
    /// # Errors
    ///
    /// Returns the reason the cancellation must be rejected.
    pub const fn check_cancellation(
        self,
        paid_at: Option<&DateTime<Utc>>,
    ) -> Result<(), CancelRejection> {
        if paid_at.is_some() {
            return Err(CancelRejection::AlreadyPaid);
        }
        match self {
            Self::Processing | Self::Confirmed => Ok(()),
            other => Err(CancelRejection::InvalidStatus(other)),
        }
    }

    /// Terminal states accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Received | Self::Expired | Self::Canceled)
    }

    /// Whether a payment confirmation may be recorded in this status.
    /// `confirmed` qualifies, so a replayed event lands on the same state.
    #[must_use]
    pub const fn accepts_payment(self) -> bool {
        !self.is_terminal()
    }

    /// Whether an unpaid checkout may expire the order in this status.
    #[must_use]
    pub const fn can_expire(self) -> bool {
        matches!(self, Self::Processing)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Received => write!(f, "received"),
            Self::Expired => write!(f, "expired"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

/// When the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    /// Online checkout session created with the order.
    PayNow,
    /// Cash or card on delivery/pickup.
    PayReceive,
}

/// How the order reaches the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "delivery_type"))]
pub enum DeliveryType {
    /// Shipped to an address.
    #[serde(rename = "delivery")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "delivery"))]
    Delivery,
    /// Picked up by the customer.
    #[serde(rename = "self")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "self"))]
    SelfPickup,
}

impl DeliveryType {
    /// Shipping needs an address, pickup does not.
    #[must_use]
    pub const fn requires_address(self) -> bool {
        matches!(self, Self::Delivery)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_unpaid_can_cancel() {
        assert_eq!(OrderStatus::Processing.check_cancellation(None), Ok(()));
        assert_eq!(OrderStatus::Confirmed.check_cancellation(None), Ok(()));
    }

    #[test]
    fn test_paid_order_cannot_cancel() {
        let paid_at = Utc::now();
        assert_eq!(
            OrderStatus::Confirmed.check_cancellation(Some(&paid_at)),
            Err(CancelRejection::AlreadyPaid)
        );
    }

    #[test]
    fn test_terminal_states_cannot_cancel() {
        for status in [
            OrderStatus::Received,
            OrderStatus::Expired,
            OrderStatus::Canceled,
        ] {
            assert!(status.is_terminal());
            assert_eq!(
                status.check_cancellation(None),
                Err(CancelRejection::InvalidStatus(status))
            );
        }
    }

    #[test]
    fn test_webhook_transitions_skip_closed_orders() {
        let all = [
            OrderStatus::Processing,
            OrderStatus::Confirmed,
            OrderStatus::Received,
            OrderStatus::Expired,
            OrderStatus::Canceled,
        ];
        let payable: Vec<_> = all.into_iter().filter(|s| s.accepts_payment()).collect();
        assert_eq!(payable, [OrderStatus::Processing, OrderStatus::Confirmed]);
        let expirable: Vec<_> = all.into_iter().filter(|s| s.can_expire()).collect();
        assert_eq!(expirable, [OrderStatus::Processing]);

        // A canceled order stays canceled when its checkout session later
        // completes or times out.
        assert!(!OrderStatus::Canceled.accepts_payment());
        assert!(!OrderStatus::Canceled.can_expire());
        assert!(!OrderStatus::Expired.accepts_payment());
        assert!(!OrderStatus::Confirmed.can_expire());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&DeliveryType::SelfPickup).unwrap(),
            "\"self\""
        );
        assert_eq!(
            serde_json::to_string(&PaymentType::PayNow).unwrap(),
            "\"pay_now\""
        );
        assert_eq!(
            serde_json::from_str::<OrderStatus>("\"canceled\"").unwrap(),
            OrderStatus::Canceled
        );
    }
}
