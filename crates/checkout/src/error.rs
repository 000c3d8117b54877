//! Checkout error types.

use std::time::Duration;

use common::OrderId;
use domain::PricingError;
use order_store::StoreError;
use thiserror::Error;

use crate::webhook::WebhookEventError;

/// Errors that can occur while creating intents or reconciling callbacks.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart could not be priced. Nothing was persisted.
    #[error("Invalid cart: {0}")]
    Validation(#[from] PricingError),

    /// The webhook signature did not verify. Nothing was changed.
    #[error("Webhook rejected: {0}")]
    Signature(#[from] SignatureError),

    /// No pending order with this ID.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// A resume referenced an order that has no open reservation.
    #[error("No resumable order for {0}")]
    OrphanResume(OrderId),

    /// The order store failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// The processor rejected or failed the request.
    #[error("Payment processor error: {0}")]
    Processor(#[from] ProcessorError),

    /// The processor did not answer in time.
    #[error("Payment processor timed out after {0:?}")]
    ProcessorTimeout(Duration),

    /// A verified event lacks the fields needed to act on it.
    #[error("Malformed webhook event: {0}")]
    MalformedEvent(#[from] WebhookEventError),
}

/// Webhook signature verification failures.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("missing signature header")]
    MissingHeader,

    #[error("malformed signature header")]
    MalformedHeader,

    #[error("signing secret is not a valid HMAC key")]
    InvalidKey,

    #[error("no signature matches the payload")]
    Mismatch,

    #[error("signature timestamp is {age_secs}s away from now")]
    OutsideTolerance { age_secs: i64 },
}

/// Payment processor client failures.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// The processor answered with an error.
    #[error("rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The request never got a usable answer.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The processor answered without the fields we need.
    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    /// The processor is unreachable (used by test doubles).
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Notification dispatch failures.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("dispatcher answered {status}")]
    Rejected { status: u16 },

    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
