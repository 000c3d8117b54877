//! Order payment status and its precedence.

use serde::{Deserialize, Serialize};

/// The payment status of an order.
///
/// Precedence, highest first:
/// ```text
/// Payed (3) > Failed (2) > Pending (1)
/// ```
/// A signal may only move an order to a status of equal or higher rank, so
/// a late `Pending` never downgrades a settled order regardless of the
/// order in which the processor delivers its callbacks.
///
/// Older records may lack the field entirely; those read as `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Awaiting payment, or authorized but not yet captured.
    #[default]
    Pending,

    /// Charge captured (terminal).
    Payed,

    /// Payment failed (terminal).
    Failed,
}

impl OrderStatus {
    /// Precedence rank used when reconciling out-of-order signals.
    pub fn rank(&self) -> u8 {
        match self {
            OrderStatus::Pending => 1,
            OrderStatus::Failed => 2,
            OrderStatus::Payed => 3,
        }
    }

    /// Returns true if moving to `target` does not lower the rank.
    pub fn accepts(&self, target: OrderStatus) -> bool {
        target.rank() >= self.rank()
    }

    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Payed => "payed",
            OrderStatus::Failed => "failed",
        }
    }

    /// Parses a stored status name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "payed" => Some(OrderStatus::Payed),
            "failed" => Some(OrderStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
