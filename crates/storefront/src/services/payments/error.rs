//! Payment-related errors.

use thiserror::Error;

/// Errors that can occur when talking to the payment processor.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("payment request failed: {0}")]
    Request(String),

    /// Failed to parse response.
    #[error("payment response error: {0}")]
    Response(String),

    /// The processor rejected the request.
    #[error("payment API error: {0}")]
    Api(String),

    /// Invalid webhook signature.
    #[error("invalid webhook signature: {0}")]
    InvalidSignature(String),

    /// Webhook body is not an event we understand.
    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),
}
