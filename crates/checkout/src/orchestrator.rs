//! Payment intent orchestration: cart in, client secret out.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use common::OrderId;
use domain::{
    CartLine, CatalogItem, CustomerDetails, Money, Order, OrderPatch, PurchaseQuote, RepricePatch,
    price_cart,
};
use order_store::{CatalogStore, OrderStore};
use serde::{Deserialize, Serialize};

use crate::error::{CheckoutError, Result};
use crate::services::processor::{IntentMetadata, PaymentIntent, PaymentProcessor};

/// Tunables injected at construction.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// The single settlement currency, as the processor spells it.
    pub currency: String,
    /// How long an unconfirmed placeholder survives.
    pub order_ttl: chrono::Duration,
    /// Upper bound on each processor call.
    pub processor_timeout: Duration,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            currency: "eur".to_string(),
            order_ttl: chrono::Duration::hours(72),
            processor_timeout: Duration::from_secs(10),
        }
    }
}

/// A request to start or retry payment for a cart.
///
/// Contact details may arrive nested under `customer` or as top-level
/// fields of the cart body; the nested form wins when both are present.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawCheckoutRequest")]
pub struct CheckoutRequest {
    pub cart: Vec<CartLine>,

    /// Present when the customer retries an earlier checkout.
    pub order_id: Option<OrderId>,

    pub customer: Option<CustomerDetails>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCheckoutRequest {
    #[serde(alias = "items")]
    cart: Vec<CartLine>,

    #[serde(default, rename = "orderID")]
    order_id: Option<OrderId>,

    #[serde(default)]
    customer: Option<CustomerDetails>,

    #[serde(flatten)]
    contact: CustomerDetails,
}

impl From<RawCheckoutRequest> for CheckoutRequest {
    fn from(raw: RawCheckoutRequest) -> Self {
        let contact = (!raw.contact.is_empty()).then_some(raw.contact);
        Self {
            cart: raw.cart,
            order_id: raw.order_id,
            customer: raw.customer.or(contact),
        }
    }
}

/// What the browser needs to confirm the payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentCreated {
    pub client_secret: String,
    #[serde(rename = "orderID")]
    pub order_id: OrderId,
}

/// Turns carts into processor payment intents backed by placeholder orders.
pub struct PaymentIntentOrchestrator<S, C, P>
where
    S: OrderStore,
    C: CatalogStore,
    P: PaymentProcessor,
{
    orders: S,
    catalog: C,
    processor: P,
    settings: CheckoutSettings,
}

impl<S, C, P> PaymentIntentOrchestrator<S, C, P>
where
    S: OrderStore,
    C: CatalogStore,
    P: PaymentProcessor,
{
    pub fn new(orders: S, catalog: C, processor: P, settings: CheckoutSettings) -> Self {
        Self {
            orders,
            catalog,
            processor,
            settings,
        }
    }

    /// Creates a payment intent for a new cart, or a fresh one for a retry.
    ///
    /// The cart is always re-priced from the current catalog. No order is
    /// written until the processor has returned an intent.
    #[tracing::instrument(
        skip(self, request),
        fields(order_id, resume = request.order_id.is_some(), lines = request.cart.len())
    )]
    pub async fn create_or_resume_intent(&self, request: CheckoutRequest) -> Result<IntentCreated> {
        let quote = self.price(&request.cart).await.inspect_err(|e| {
            tracing::info!(error = %e, "cart rejected");
            metrics::counter!("payment_intent_failures_total", "reason" => "validation")
                .increment(1);
        })?;

        let order_id = match request.order_id {
            Some(order_id) => {
                self.ensure_resumable(order_id).await?;
                order_id
            }
            None => OrderId::new(),
        };
        tracing::Span::current().record("order_id", tracing::field::display(order_id));

        let intent = self.request_intent(order_id, quote.total).await?;

        let now = Utc::now();
        let expire_at = now + self.settings.order_ttl;
        if request.order_id.is_some() {
            let patch = OrderPatch::Reprice(RepricePatch {
                items: quote.items,
                purchase_cost_minor: quote.total,
                customer: request.customer,
                expire_at,
            });
            // The order may have been confirmed since the check above.
            if self.orders.upsert(order_id, &patch, now).await?.is_none() {
                metrics::counter!("payment_intent_failures_total", "reason" => "orphan_resume")
                    .increment(1);
                return Err(CheckoutError::OrphanResume(order_id));
            }
        } else {
            let order = Order::placeholder(
                order_id,
                quote,
                request.customer,
                now,
                self.settings.order_ttl,
            );
            self.orders.create(order).await.inspect_err(|e| {
                tracing::error!(error = %e, "failed to persist placeholder order");
                metrics::counter!("payment_intent_failures_total", "reason" => "persistence")
                    .increment(1);
            })?;
        }

        metrics::counter!("payment_intents_created_total").increment(1);
        tracing::info!(intent_id = %intent.id, "payment intent issued");

        Ok(IntentCreated {
            client_secret: intent.client_secret,
            order_id,
        })
    }

    /// Returns an order the customer may still pay for.
    ///
    /// Missing and settled orders are both `NotFound`.
    #[tracing::instrument(skip(self))]
    pub async fn resume_order(&self, order_id: OrderId) -> Result<Order> {
        self.orders
            .find_pending_by_order_id(order_id)
            .await?
            .ok_or(CheckoutError::NotFound(order_id))
    }

    /// Prices a cart against the items it references.
    async fn price(&self, cart: &[CartLine]) -> Result<PurchaseQuote> {
        let mut seen = HashSet::new();
        let mut snapshot: Vec<CatalogItem> = Vec::new();
        for line in cart {
            if seen.insert(&line.item_id)
                && let Some(item) = self.catalog.find_item_by_id(&line.item_id).await?
            {
                snapshot.push(item);
            }
        }

        Ok(price_cart(cart, &snapshot)?)
    }

    /// Fails before any processor call when a retry has nothing to resume.
    async fn ensure_resumable(&self, order_id: OrderId) -> Result<()> {
        let resumable = self
            .orders
            .find_by_order_id(order_id)
            .await?
            .is_some_and(|order| order.is_resumable());

        if !resumable {
            tracing::warn!("resume references an order with no open reservation");
            metrics::counter!("payment_intent_failures_total", "reason" => "orphan_resume")
                .increment(1);
            return Err(CheckoutError::OrphanResume(order_id));
        }
        Ok(())
    }

    async fn request_intent(&self, order_id: OrderId, amount: Money) -> Result<PaymentIntent> {
        let metadata = IntentMetadata { order_id };
        let timeout = self.settings.processor_timeout;

        match tokio::time::timeout(
            timeout,
            self.processor
                .create_payment_intent(amount, &self.settings.currency, &metadata),
        )
        .await
        {
            Ok(Ok(intent)) => Ok(intent),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "processor rejected payment intent");
                metrics::counter!("payment_intent_failures_total", "reason" => "processor")
                    .increment(1);
                Err(e.into())
            }
            Err(_) => {
                tracing::warn!(?timeout, "processor timed out creating payment intent");
                metrics::counter!("payment_intent_failures_total", "reason" => "timeout")
                    .increment(1);
                Err(CheckoutError::ProcessorTimeout(timeout))
            }
        }
    }
}
