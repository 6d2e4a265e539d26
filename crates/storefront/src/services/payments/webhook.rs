//! Payment webhook authentication and decoding.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, warn};

use vitrina_core::OrderId;

use super::PaymentError;

/// Deliveries older (or newer) than this are rejected.
const TOLERANCE_SECS: i64 = 300;

/// Verify a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`) against
/// the raw request body.
///
/// # Errors
///
/// Returns `PaymentError::InvalidSignature` for a malformed header, a stale
/// timestamp or a signature mismatch.
pub fn verify_webhook_signature(
    header: &str,
    payload: &[u8],
    secret: &SecretString,
    now: DateTime<Utc>,
) -> Result<(), PaymentError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| PaymentError::InvalidSignature("Missing timestamp".to_string()))?;
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| PaymentError::InvalidSignature("Invalid timestamp".to_string()))?;

    if (now.timestamp() - ts).abs() > TOLERANCE_SECS {
        return Err(PaymentError::InvalidSignature(
            "Request timestamp too old".to_string(),
        ));
    }

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|e| PaymentError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    if !signatures
        .iter()
        .any(|signature| constant_time_compare(&expected, signature))
    {
        return Err(PaymentError::InvalidSignature(
            "Signature mismatch".to_string(),
        ));
    }

    debug!("Webhook signature verified");
    Ok(())
}

/// A webhook event, reduced to the fields order handling needs.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    /// Unix seconds.
    pub created: i64,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: EventObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventObject {
    pub id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// What an event means for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookAction {
    Confirm {
        order: OrderId,
        paid_at: DateTime<Utc>,
    },
    Expire {
        order: OrderId,
    },
    Ignore,
}

impl WebhookEvent {
    /// Decode an event body.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidPayload` if the body is not an event.
    pub fn parse(payload: &[u8]) -> Result<Self, PaymentError> {
        serde_json::from_slice(payload).map_err(|e| PaymentError::InvalidPayload(e.to_string()))
    }

    /// Map the event to an order transition.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidPayload` when a checkout event carries no
    /// usable `orderId` metadata.
    pub fn action(&self) -> Result<WebhookAction, PaymentError> {
        match self.kind.as_str() {
            "checkout.session.completed" => Ok(WebhookAction::Confirm {
                order: self.order_id()?,
                paid_at: self.paid_at(),
            }),
            "checkout.session.expired" => Ok(WebhookAction::Expire {
                order: self.order_id()?,
            }),
            _ => Ok(WebhookAction::Ignore),
        }
    }

    /// Event creation time, or now when the timestamp is out of range.
    fn paid_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.created, 0).unwrap_or_else(|| {
            warn!(
                created = self.created,
                object = %self.data.object.id,
                "Unusable event time, using now"
            );
            Utc::now()
        })
    }

    fn order_id(&self) -> Result<OrderId, PaymentError> {
        self.data
            .object
            .metadata
            .get("orderId")
            .and_then(|id| id.parse::<i32>().ok())
            .map(OrderId::new)
            .ok_or_else(|| {
                PaymentError::InvalidPayload(format!(
                    "session {} has no orderId metadata",
                    self.data.object.id
                ))
            })
    }
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    const SECRET: &str = "whsec_test_secret";

    fn sign(timestamp: i64, body: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{body}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn secret() -> SecretString {
        SecretString::from(SECRET)
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hell"));
    }

    #[test]
    fn test_valid_signature() {
        let now = Utc::now();
        let body = r#"{"type":"checkout.session.completed"}"#;
        let header = format!("t={},v1={}", now.timestamp(), sign(now.timestamp(), body));
        assert!(verify_webhook_signature(&header, body.as_bytes(), &secret(), now).is_ok());
    }

    #[test]
    fn test_any_v1_signature_may_match() {
        let now = Utc::now();
        let body = "{}";
        let header = format!(
            "t={},v1={},v0=legacy,v1={}",
            now.timestamp(),
            "0".repeat(64),
            sign(now.timestamp(), body)
        );
        assert!(verify_webhook_signature(&header, body.as_bytes(), &secret(), now).is_ok());
    }

    #[test]
    fn test_tampered_body() {
        let now = Utc::now();
        let header = format!("t={},v1={}", now.timestamp(), sign(now.timestamp(), "{}"));
        let result = verify_webhook_signature(&header, b"{\"x\":1}", &secret(), now);
        assert!(matches!(result, Err(PaymentError::InvalidSignature(_))));
    }

    #[test]
    fn test_stale_timestamp() {
        let now = Utc::now();
        let then = (now - Duration::minutes(6)).timestamp();
        let header = format!("t={then},v1={}", sign(then, "{}"));
        let result = verify_webhook_signature(&header, b"{}", &secret(), now);
        assert!(matches!(result, Err(PaymentError::InvalidSignature(_))));
    }

    #[test]
    fn test_malformed_header() {
        let now = Utc::now();
        assert!(verify_webhook_signature("v1=abc", b"{}", &secret(), now).is_err());
        assert!(verify_webhook_signature("t=soon,v1=abc", b"{}", &secret(), now).is_err());
    }

    #[test]
    fn test_completed_event_confirms_order() {
        let event = WebhookEvent::parse(
            br#"{"id":"evt_1","type":"checkout.session.completed","created":1767225600,
                "data":{"object":{"id":"cs_1","metadata":{"orderId":"42"}}}}"#,
        )
        .unwrap();
        assert_eq!(
            event.action().unwrap(),
            WebhookAction::Confirm {
                order: OrderId::new(42),
                paid_at: DateTime::from_timestamp(1_767_225_600, 0).unwrap(),
            }
        );
    }

    #[test]
    fn test_out_of_range_event_time_falls_back_to_now() {
        let body = format!(
            r#"{{"type":"checkout.session.completed","created":{},
                "data":{{"object":{{"id":"cs_3","metadata":{{"orderId":"7"}}}}}}}}"#,
            i64::MAX
        );
        let event = WebhookEvent::parse(body.as_bytes()).unwrap();
        let before = Utc::now();
        let WebhookAction::Confirm { order, paid_at } = event.action().unwrap() else {
            panic!("expected a confirmation");
        };
        assert_eq!(order, OrderId::new(7));
        assert!(paid_at >= before && paid_at <= Utc::now());
    }

    #[test]
    fn test_expired_event_without_metadata() {
        let event = WebhookEvent::parse(
            br#"{"type":"checkout.session.expired","created":0,"data":{"object":{"id":"cs_2"}}}"#,
        )
        .unwrap();
        assert!(matches!(event.action(), Err(PaymentError::InvalidPayload(_))));
    }

    #[test]
    fn test_other_events_are_ignored() {
        let event = WebhookEvent::parse(
            br#"{"type":"payment_intent.created","created":0,"data":{"object":{"id":"pi_1"}}}"#,
        )
        .unwrap();
        assert_eq!(event.action().unwrap(), WebhookAction::Ignore);
    }
}
