//! Stripe Checkout client.

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, error, instrument};

use vitrina_core::CurrencyCode;

use super::{PaymentError, PaymentGateway, SessionRequest};
use crate::config::PaymentsConfig;
use crate::db::orders::PaymentSession;

/// Stripe API client for checkout sessions.
#[derive(Clone)]
pub struct StripeGateway {
    client: Client,
    api_base: String,
    secret_key: SecretString,
    currency: CurrencyCode,
    /// Client origin for the success and cancel redirects.
    client_url: String,
}

impl std::fmt::Debug for StripeGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeGateway")
            .field("api_base", &self.api_base)
            .field("secret_key", &"[REDACTED]")
            .field("currency", &self.currency)
            .field("client_url", &self.client_url)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
    expires_at: i64,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl StripeGateway {
    /// Create a new Stripe client.
    #[must_use]
    pub fn new(config: &PaymentsConfig, client_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            secret_key: config.secret_key.clone(),
            currency: config.currency,
            client_url: client_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Form fields for `POST /v1/checkout/sessions`.
    fn session_form(&self, request: &SessionRequest<'_>) -> Vec<(String, String)> {
        let mut form = vec![
            ("mode".to_owned(), "payment".to_owned()),
            ("customer_email".to_owned(), request.customer_email.to_owned()),
            ("metadata[orderId]".to_owned(), request.order.to_string()),
            ("success_url".to_owned(), format!("{}/orders?success", self.client_url)),
            ("cancel_url".to_owned(), format!("{}/orders?canceled", self.client_url)),
        ];

        for (i, item) in request.items.iter().enumerate() {
            let prefix = format!("line_items[{i}]");
            form.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
            form.push((
                format!("{prefix}[price_data][currency]"),
                self.currency.as_str().to_owned(),
            ));
            form.push((
                format!("{prefix}[price_data][unit_amount]"),
                item.unit_amount.minor_units().to_string(),
            ));
            form.push((
                format!("{prefix}[price_data][tax_behavior]"),
                "exclusive".to_owned(),
            ));
            form.push((
                format!("{prefix}[price_data][product_data][name]"),
                item.name.clone(),
            ));
            if let Some(image) = &item.image_url {
                form.push((
                    format!("{prefix}[price_data][product_data][images][0]"),
                    image.clone(),
                ));
            }
        }

        form
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, request), fields(order_id = %request.order))]
    async fn create_session(
        &self,
        request: &SessionRequest<'_>,
    ) -> Result<PaymentSession, PaymentError> {
        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(self.secret_key.expose_secret())
            .form(&self.session_form(request))
            .send()
            .await
            .map_err(|e| PaymentError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| status.to_string());
            error!(status = %status, error = %message, "Stripe API error creating session");
            return Err(PaymentError::Api(message));
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Response(e.to_string()))?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::Response("session has no checkout URL".to_owned()))?;
        let expires_at = DateTime::from_timestamp(session.expires_at, 0)
            .ok_or_else(|| PaymentError::Response("session expiry out of range".to_owned()))?;

        debug!(session_id = %session.id, "Checkout session created");

        Ok(PaymentSession {
            id: session.id,
            url,
            expires_at,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::payments::CheckoutItem;
    use vitrina_core::{OrderId, Price};

    fn gateway() -> StripeGateway {
        StripeGateway::new(
            &PaymentsConfig {
                api_base: "https://api.stripe.com/".to_owned(),
                secret_key: SecretString::from("sk_test_123"),
                webhook_secret: SecretString::from("whsec_123"),
                currency: CurrencyCode::Uah,
            },
            "https://shop.example.com/",
        )
    }

    fn field<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_session_form() {
        let items = [
            CheckoutItem {
                name: "Linen shirt".to_owned(),
                image_url: Some("https://cdn.example.com/shirt.jpg".to_owned()),
                unit_amount: Price::from_minor(129_900).unwrap(),
                quantity: 2,
            },
            CheckoutItem {
                name: "Socks".to_owned(),
                image_url: None,
                unit_amount: Price::from_minor(19_900).unwrap(),
                quantity: 1,
            },
        ];
        let request = SessionRequest {
            order: OrderId::new(17),
            customer_email: "olena@example.com",
            items: &items,
        };
        let form = gateway().session_form(&request);

        assert_eq!(field(&form, "metadata[orderId]"), Some("17"));
        assert_eq!(
            field(&form, "success_url"),
            Some("https://shop.example.com/orders?success")
        );
        assert_eq!(field(&form, "line_items[0][quantity]"), Some("2"));
        assert_eq!(
            field(&form, "line_items[0][price_data][unit_amount]"),
            Some("129900")
        );
        assert_eq!(field(&form, "line_items[1][price_data][currency]"), Some("uah"));
        assert!(field(&form, "line_items[1][price_data][product_data][images][0]").is_none());
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", gateway());
        assert!(!debug.contains("sk_test_123"));
        assert!(debug.contains("[REDACTED]"));
    }
}
