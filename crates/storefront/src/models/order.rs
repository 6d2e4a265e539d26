//! Order request and history types.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vitrina_core::{DeliveryType, OrderId, OrderStatus, PaymentType, Price, ProductId};

/// Most lines accepted in one order.
pub const MAX_ORDER_LINES: usize = 100;
/// Largest quantity of a single product in one order.
pub const MAX_LINE_QUANTITY: u32 = 999;

/// One product and how many of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: ProductId,
    pub count: u32,
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub delivery_type: DeliveryType,
    #[serde(default)]
    pub address: Option<String>,
    pub payment_type: PaymentType,
    pub products: Vec<OrderLine>,
}

impl NewOrder {
    /// # Errors
    ///
    /// Returns a message naming the first rule violated.
    pub fn validate(&self) -> Result<(), String> {
        if self.products.is_empty() || self.products.len() > MAX_ORDER_LINES {
            return Err(format!("an order holds 1-{MAX_ORDER_LINES} products"));
        }

        let mut seen = BTreeSet::new();
        for line in &self.products {
            if line.count == 0 || line.count > MAX_LINE_QUANTITY {
                return Err(format!(
                    "product {} count must be 1-{MAX_LINE_QUANTITY}",
                    line.id
                ));
            }
            if !seen.insert(line.id) {
                return Err(format!("product {} is listed twice", line.id));
            }
        }

        let has_address = self
            .address
            .as_deref()
            .is_some_and(|address| !address.trim().is_empty());
        if self.delivery_type.requires_address() && !has_address {
            return Err("address is required for delivery".to_owned());
        }

        Ok(())
    }

    /// Address to store: dropped for pickup orders.
    #[must_use]
    pub fn shipping_address(&self) -> Option<&str> {
        if self.delivery_type.requires_address() {
            self.address.as_deref().map(str::trim)
        } else {
            None
        }
    }
}

/// An order in the owner's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub status: OrderStatus,
    pub delivery_type: DeliveryType,
    pub address: Option<String>,
    pub payment_type: PaymentType,
    pub created_at: DateTime<Utc>,
    pub payment_time: Option<DateTime<Utc>>,
    /// Checkout link while an online payment is still pending.
    pub checkout_url: Option<String>,
    pub total: Price,
    pub items: i64,
}

/// Response of `POST /orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    pub id: OrderId,
    /// Where to send the customer to pay; absent for pay-on-receive.
    pub checkout_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(delivery_type: DeliveryType, address: Option<&str>, lines: &[(i32, u32)]) -> NewOrder {
        NewOrder {
            delivery_type,
            address: address.map(str::to_owned),
            payment_type: PaymentType::PayReceive,
            products: lines
                .iter()
                .map(|&(id, count)| OrderLine {
                    id: ProductId::new(id),
                    count,
                })
                .collect(),
        }
    }

    #[test]
    fn test_delivery_requires_address() {
        assert!(order(DeliveryType::Delivery, None, &[(1, 1)]).validate().is_err());
        assert!(order(DeliveryType::Delivery, Some("  "), &[(1, 1)]).validate().is_err());
        assert!(order(DeliveryType::Delivery, Some("Kyiv, Khreshchatyk 1"), &[(1, 1)]).validate().is_ok());
        assert!(order(DeliveryType::SelfPickup, None, &[(1, 1)]).validate().is_ok());
    }

    #[test]
    fn test_pickup_drops_address() {
        let pickup = order(DeliveryType::SelfPickup, Some("somewhere"), &[(1, 1)]);
        assert_eq!(pickup.shipping_address(), None);
        let delivery = order(DeliveryType::Delivery, Some(" Lviv "), &[(1, 1)]);
        assert_eq!(delivery.shipping_address(), Some("Lviv"));
    }

    #[test]
    fn test_line_rules() {
        assert!(order(DeliveryType::SelfPickup, None, &[]).validate().is_err());
        assert!(order(DeliveryType::SelfPickup, None, &[(1, 0)]).validate().is_err());
        assert!(order(DeliveryType::SelfPickup, None, &[(1, 2), (1, 3)]).validate().is_err());

        let lines: Vec<_> = (1..=101).map(|id| (id, 1)).collect();
        assert!(order(DeliveryType::SelfPickup, None, &lines).validate().is_err());
        assert!(order(DeliveryType::SelfPickup, None, &lines[..100]).validate().is_ok());
    }

    #[test]
    fn test_deserialize_body() {
        let body: NewOrder = serde_json::from_str(
            r#"{"deliveryType":"self","paymentType":"pay_now","products":[{"id":3,"count":2}]}"#,
        )
        .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(body.delivery_type, DeliveryType::SelfPickup);
        assert_eq!(body.payment_type, PaymentType::PayNow);
        assert_eq!(body.products, vec![OrderLine { id: ProductId::new(3), count: 2 }]);
    }
}
