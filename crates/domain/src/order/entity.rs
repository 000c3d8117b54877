//! The order entity.

use chrono::{DateTime, Duration, Utc};
use common::OrderId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Money, OrderPatch, OrderStatus, PatchOutcome, PaymentSignal, RepricePatch};
use crate::cart::CustomerDetails;
use crate::pricing::{PricedLine, PurchaseQuote, to_major_units};

/// How an order record came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderOrigin {
    /// Created by checkout when the payment intent was issued.
    #[default]
    Checkout,

    /// Recreated from a processor callback because the checkout record was
    /// missing. Worth investigating.
    WebhookFallback,
}

impl OrderOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderOrigin::Checkout => "checkout",
            OrderOrigin::WebhookFallback => "webhook_fallback",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "checkout" => Some(OrderOrigin::Checkout),
            "webhook_fallback" => Some(OrderOrigin::WebhookFallback),
            _ => None,
        }
    }
}

/// An order as persisted by the order store.
///
/// Items and purchase cost are fixed once the order is confirmed by the
/// processor; after that only `status`, `charge_id` and `expire_at` move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "orderID")]
    pub order_id: OrderId,

    #[serde(default)]
    pub status: OrderStatus,

    pub items: Vec<PricedLine>,

    /// Total in major units of the settlement currency, as displayed and
    /// stored. Always `purchase_cost_minor` converted.
    pub purchase_cost: Decimal,

    /// Total in minor units; what the processor charges.
    pub purchase_cost_minor: Money,

    #[serde(default)]
    pub customer: Option<CustomerDetails>,

    #[serde(default, rename = "chargeID")]
    pub charge_id: Option<String>,

    /// TTL watermark. Present only while the order is an unconfirmed
    /// placeholder; an order without it is never reaped.
    #[serde(default)]
    pub expire_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub origin: OrderOrigin,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates the placeholder order written when a payment intent is issued.
    pub fn placeholder(
        order_id: OrderId,
        quote: PurchaseQuote,
        customer: Option<CustomerDetails>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            order_id,
            status: OrderStatus::Pending,
            purchase_cost: quote.total_major(),
            purchase_cost_minor: quote.total,
            items: quote.items,
            customer,
            charge_id: None,
            expire_at: Some(now + ttl),
            origin: OrderOrigin::Checkout,
            created_at: now,
            updated_at: now,
        }
    }

    /// Recreates an order from a processor signal when the checkout record
    /// cannot be found. Line items are unknown; `amount` is whatever the
    /// processor reported.
    pub fn recovered(
        order_id: OrderId,
        signal: &PaymentSignal,
        amount: Option<Money>,
        now: DateTime<Utc>,
    ) -> Self {
        let amount = amount.unwrap_or_default();
        Self {
            order_id,
            status: signal.target_status(),
            items: Vec::new(),
            purchase_cost: to_major_units(amount),
            purchase_cost_minor: amount,
            customer: None,
            charge_id: signal.charge_id().map(String::from),
            expire_at: None,
            origin: OrderOrigin::WebhookFallback,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true while a customer may retry payment with a fresh intent:
    /// still pending and still carrying its expiry watermark.
    pub fn is_resumable(&self) -> bool {
        self.status == OrderStatus::Pending && self.expire_at.is_some()
    }

    /// Returns true if the TTL watermark has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expire_at.is_some_and(|at| at <= now)
    }

    /// Applies a patch in place.
    pub fn apply_patch(&mut self, patch: &OrderPatch, now: DateTime<Utc>) -> PatchOutcome {
        match patch {
            OrderPatch::Reprice(reprice) => self.reprice(reprice, now),
            OrderPatch::Signal(signal) => self.apply_signal(signal, now),
        }
    }

    fn reprice(&mut self, patch: &RepricePatch, now: DateTime<Utc>) -> PatchOutcome {
        if !self.is_resumable() {
            return PatchOutcome::Rejected;
        }

        self.items = patch.items.clone();
        self.purchase_cost = to_major_units(patch.purchase_cost_minor);
        self.purchase_cost_minor = patch.purchase_cost_minor;
        if let Some(customer) = &patch.customer {
            self.customer = Some(customer.clone());
        }
        self.expire_at = Some(patch.expire_at);
        self.updated_at = now;
        PatchOutcome::Applied { changed: true }
    }

    /// Any definitive signal clears the watermark. Status only moves up in
    /// rank; among `payed` signals the last charge ID wins.
    fn apply_signal(&mut self, signal: &PaymentSignal, now: DateTime<Utc>) -> PatchOutcome {
        let mut changed = self.expire_at.take().is_some();

        let target = signal.target_status();
        if self.status.accepts(target) {
            if self.status != target {
                self.status = target;
                changed = true;
            }
            if let Some(charge_id) = signal.charge_id()
                && self.charge_id.as_deref() != Some(charge_id)
            {
                self.charge_id = Some(charge_id.to_string());
                changed = true;
            }
        }

        if changed {
            self.updated_at = now;
        }
        PatchOutcome::Applied { changed }
    }
}
