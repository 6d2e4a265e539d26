//! Payment processor integration.
//!
//! Checkout sessions are created through the [`PaymentGateway`] trait;
//! [`StripeGateway`] is the production implementation. Webhook deliveries
//! are authenticated with [`verify_webhook_signature`] before
//! [`WebhookEvent::parse`] turns them into order transitions.

mod error;
mod stripe;
mod webhook;

pub use error::PaymentError;
pub use stripe::StripeGateway;
pub use webhook::{WebhookAction, WebhookEvent, verify_webhook_signature};

use async_trait::async_trait;

use vitrina_core::{OrderId, Price};

use crate::db::orders::PaymentSession;

/// One line on the hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutItem {
    pub name: String,
    pub image_url: Option<String>,
    pub unit_amount: Price,
    pub quantity: u32,
}

/// Everything needed to open a checkout session for an order.
#[derive(Debug, Clone)]
pub struct SessionRequest<'a> {
    pub order: OrderId,
    pub customer_email: &'a str,
    pub items: &'a [CheckoutItem],
}

/// Creates hosted checkout sessions.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a session and return its id, URL and expiry.
    async fn create_session(
        &self,
        request: &SessionRequest<'_>,
    ) -> Result<PaymentSession, PaymentError>;
}
