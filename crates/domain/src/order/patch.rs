//! Mutations that may be applied to a stored order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Money, OrderStatus};
use crate::cart::CustomerDetails;
use crate::pricing::PricedLine;

/// A definitive payment outcome reported by the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentSignal {
    /// Payment authorized, not yet captured.
    Authorized,

    /// Charge captured.
    Charged { charge_id: String },

    /// Payment or charge failed.
    Failed,
}

impl PaymentSignal {
    /// The status this signal moves an order towards.
    pub fn target_status(&self) -> OrderStatus {
        match self {
            PaymentSignal::Authorized => OrderStatus::Pending,
            PaymentSignal::Charged { .. } => OrderStatus::Payed,
            PaymentSignal::Failed => OrderStatus::Failed,
        }
    }

    /// The processor charge ID, if this signal carries one.
    pub fn charge_id(&self) -> Option<&str> {
        match self {
            PaymentSignal::Charged { charge_id } => Some(charge_id),
            _ => None,
        }
    }
}

/// Replacement of the mutable checkout fields when a customer retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepricePatch {
    pub items: Vec<PricedLine>,
    pub purchase_cost_minor: Money,
    /// Kept as-is when `None`.
    pub customer: Option<CustomerDetails>,
    pub expire_at: DateTime<Utc>,
}

/// A single-document update keyed by order ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderPatch {
    /// Re-price an unconfirmed placeholder. Only applies while the order is
    /// still resumable.
    Reprice(RepricePatch),

    /// Apply a processor signal under status precedence.
    Signal(PaymentSignal),
}

/// Result of applying a patch to an order in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The patch was accepted; `changed` is false when it was a no-op.
    Applied { changed: bool },

    /// The order is not in a state the patch may touch.
    Rejected,
}
