//! Processor callback events.

use std::collections::HashMap;

use common::{OrderId, ParseOrderIdError};
use domain::{Money, PaymentSignal};
use serde::Deserialize;
use thiserror::Error;

/// Metadata key under which checkout stores the order ID on an intent.
pub const ORDER_ID_METADATA_KEY: &str = "orderID";

/// Event types the reconciler distinguishes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WebhookEventType {
    PaymentIntentSucceeded,
    ChargeSucceeded,
    PaymentIntentPaymentFailed,
    ChargeFailed,
    Other(String),
}

impl WebhookEventType {
    pub fn parse(s: &str) -> Self {
        match s {
            "payment_intent.succeeded" => Self::PaymentIntentSucceeded,
            "charge.succeeded" => Self::ChargeSucceeded,
            "payment_intent.payment_failed" => Self::PaymentIntentPaymentFailed,
            "charge.failed" => Self::ChargeFailed,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::PaymentIntentSucceeded => "payment_intent.succeeded",
            Self::ChargeSucceeded => "charge.succeeded",
            Self::PaymentIntentPaymentFailed => "payment_intent.payment_failed",
            Self::ChargeFailed => "charge.failed",
            Self::Other(other) => other,
        }
    }
}

impl std::fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verified event is missing what the reconciler needs.
#[derive(Debug, Error)]
pub enum WebhookEventError {
    #[error("event {0} carries no orderID metadata")]
    MissingOrderId(WebhookEventType),

    #[error(transparent)]
    InvalidOrderId(#[from] ParseOrderIdError),

    #[error("charge.succeeded event carries no charge ID")]
    MissingChargeId,

    /// The signature verified but the body is not an event.
    #[error("invalid event payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// A processor callback, reduced to the fields checkout acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub id: Option<String>,
    pub event_type: WebhookEventType,
    /// Raw `data.object.metadata.orderID`.
    pub order_id: Option<String>,
    /// `data.object.id`; the charge ID on charge events.
    pub object_id: Option<String>,
    /// `data.object.amount` in minor units.
    pub amount: Option<Money>,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: RawData,
}

#[derive(Deserialize, Default)]
struct RawData {
    #[serde(default)]
    object: RawObject,
}

#[derive(Deserialize, Default)]
struct RawObject {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    amount: Option<i64>,
    #[serde(default)]
    metadata: HashMap<String, serde_json::Value>,
}

impl WebhookEvent {
    /// Parses the processor's event JSON. Only `type` is required.
    pub fn parse(payload: &[u8]) -> Result<Self, WebhookEventError> {
        let raw: RawEvent = serde_json::from_slice(payload)?;
        let object = raw.data.object;

        Ok(Self {
            id: raw.id,
            event_type: WebhookEventType::parse(&raw.event_type),
            order_id: object
                .metadata
                .get(ORDER_ID_METADATA_KEY)
                .and_then(|v| v.as_str())
                .map(String::from),
            object_id: object.id,
            amount: object.amount.map(Money::from_minor),
        })
    }

    /// The payment signal this event carries, or `None` for event types
    /// that do not affect orders.
    pub fn payment_signal(&self) -> Result<Option<PaymentSignal>, WebhookEventError> {
        let signal = match self.event_type {
            WebhookEventType::PaymentIntentSucceeded => PaymentSignal::Authorized,
            WebhookEventType::ChargeSucceeded => PaymentSignal::Charged {
                charge_id: self
                    .object_id
                    .clone()
                    .ok_or(WebhookEventError::MissingChargeId)?,
            },
            WebhookEventType::PaymentIntentPaymentFailed | WebhookEventType::ChargeFailed => {
                PaymentSignal::Failed
            }
            WebhookEventType::Other(_) => return Ok(None),
        };
        Ok(Some(signal))
    }

    /// The order this event refers to.
    pub fn order_id(&self) -> Result<OrderId, WebhookEventError> {
        let raw = self
            .order_id
            .as_deref()
            .ok_or_else(|| WebhookEventError::MissingOrderId(self.event_type.clone()))?;
        Ok(raw.parse()?)
    }
}
