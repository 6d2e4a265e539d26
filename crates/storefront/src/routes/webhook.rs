//! Payment processor webhook.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;

use crate::db::orders::{OrderRepository, Transition};
use crate::error::Result;
use crate::services::payments::{
    PaymentError, WebhookAction, WebhookEvent, verify_webhook_signature,
};
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "stripe-signature";

/// Apply a checkout event to its order.
///
/// The signature is checked over the raw body before anything is parsed.
/// Events for unknown or closed orders are acknowledged so the processor
/// stops retrying.
pub async fn payments(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| PaymentError::InvalidSignature("missing signature header".to_string()))?;
    verify_webhook_signature(
        signature,
        &body,
        &state.config().payments.webhook_secret,
        Utc::now(),
    )?;

    let event = WebhookEvent::parse(&body)?;
    let orders = OrderRepository::new(state.pool(), state.config().catalog.orders_per_page);

    match event.action()? {
        WebhookAction::Confirm { order, paid_at } => match orders.confirm(order, paid_at).await? {
            Transition::Applied => tracing::info!(order_id = %order, "Order paid"),
            Transition::Skipped(status) => {
                tracing::warn!(order_id = %order, %status, "Payment for a closed order");
            }
            Transition::NotFound => tracing::warn!(order_id = %order, "Payment for unknown order"),
        },
        WebhookAction::Expire { order } => match orders.expire(order).await? {
            Transition::Applied => tracing::info!(order_id = %order, "Checkout session expired"),
            Transition::Skipped(status) => {
                tracing::debug!(order_id = %order, %status, "Expiry ignored");
            }
            Transition::NotFound => tracing::warn!(order_id = %order, "Expiry for unknown order"),
        },
        WebhookAction::Ignore => {
            tracing::debug!(kind = %event.kind, "Ignoring webhook event");
        }
    }

    Ok(StatusCode::OK)
}
