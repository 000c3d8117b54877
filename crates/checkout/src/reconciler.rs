//! Webhook reconciliation: processor callbacks in, order status out.
//!
//! | Event type                                     | Signal       | Resulting status |
//! |------------------------------------------------|--------------|------------------|
//! | `payment_intent.succeeded`                     | `Authorized` | pending          |
//! | `charge.succeeded`                             | `Charged`    | payed            |
//! | `payment_intent.payment_failed`, `charge.failed` | `Failed`   | failed           |
//! | anything else                                  | none         | unchanged        |
//!
//! Signals are applied under status precedence (payed > failed > pending)
//! so redeliveries and out-of-order arrivals converge. A missing order is
//! recreated from the event.

use std::time::Instant;

use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{Money, Order, OrderPatch, PaymentSignal};
use order_store::{OrderStore, StoreError};
use tokio::task::JoinHandle;

use crate::error::{CheckoutError, Result};
use crate::services::notifier::{NoticeKind, NotificationTrigger};
use crate::services::processor::PaymentProcessor;

/// Result of reconciling one callback.
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// The event carried a payment signal and the order reflects it.
    Applied {
        order: Order,
        /// The notice dispatched, if the record changed.
        notice: Option<NoticeKind>,
        /// True when the order had to be recreated from the event.
        recovered: bool,
        /// The dispatched notification task.
        notification: Option<JoinHandle<()>>,
    },

    /// The event type does not concern orders.
    Ignored { event_type: String },
}

struct Transition {
    order: Order,
    changed: bool,
    recovered: bool,
}

/// Applies verified processor callbacks to orders.
pub struct WebhookReconciler<S, P>
where
    S: OrderStore,
    P: PaymentProcessor,
{
    orders: S,
    processor: P,
    notifications: NotificationTrigger,
}

impl<S, P> WebhookReconciler<S, P>
where
    S: OrderStore,
    P: PaymentProcessor,
{
    pub fn new(orders: S, processor: P, notifications: NotificationTrigger) -> Self {
        Self {
            orders,
            processor,
            notifications,
        }
    }

    /// Verifies and applies one callback.
    ///
    /// Returns `Ok` only once the transition is durable; any error must
    /// be surfaced as a non-2xx response so the processor redelivers.
    #[tracing::instrument(skip_all, fields(event_type, order_id))]
    pub async fn reconcile(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<ReconcileOutcome> {
        let start = Instant::now();

        let event = self
            .processor
            .verify_and_parse_webhook(payload, signature_header)
            .inspect_err(|e| match e {
                CheckoutError::Signature(e) => {
                    tracing::warn!(security = true, error = %e, "webhook signature rejected");
                    metrics::counter!("webhook_signature_failures_total").increment(1);
                }
                e => tracing::warn!(error = %e, "signed webhook body is not an event"),
            })?;

        let span = tracing::Span::current();
        span.record("event_type", event.event_type.as_str());
        metrics::counter!("webhook_events_total", "event_type" => event.event_type.as_str().to_string())
            .increment(1);

        let Some(signal) = event.payment_signal()? else {
            tracing::debug!("ignoring event type");
            return Ok(ReconcileOutcome::Ignored {
                event_type: event.event_type.as_str().to_string(),
            });
        };
        let order_id = event.order_id().inspect_err(|e| {
            tracing::warn!(error = %e, event_id = ?event.id, "verified event has no usable order ID");
        })?;
        span.record("order_id", tracing::field::display(order_id));

        let transition = self.apply(order_id, &signal, event.amount).await?;

        let notice = (transition.changed || transition.recovered)
            .then(|| NoticeKind::for_status(transition.order.status));
        let notification =
            notice.map(|kind| self.notifications.dispatch(transition.order.clone(), kind));

        tracing::info!(
            status = %transition.order.status,
            changed = transition.changed,
            recovered = transition.recovered,
            "webhook reconciled"
        );
        metrics::histogram!("webhook_reconcile_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        Ok(ReconcileOutcome::Applied {
            order: transition.order,
            notice,
            recovered: transition.recovered,
            notification,
        })
    }

    async fn apply(
        &self,
        order_id: OrderId,
        signal: &PaymentSignal,
        amount: Option<Money>,
    ) -> Result<Transition> {
        let patch = OrderPatch::Signal(signal.clone());
        let now = Utc::now();

        match self.orders.upsert(order_id, &patch, now).await {
            Ok(Some(outcome)) => {
                return Ok(Transition {
                    order: outcome.order,
                    changed: outcome.changed,
                    recovered: false,
                });
            }
            Ok(None) => {
                tracing::warn!(alert = true, "no order for webhook, recreating it from the event");
            }
            Err(e) => {
                tracing::warn!(alert = true, error = %e, "order update failed, attempting fallback create");
            }
        }

        self.fallback_create(order_id, signal, &patch, amount, now)
            .await
    }

    async fn fallback_create(
        &self,
        order_id: OrderId,
        signal: &PaymentSignal,
        patch: &OrderPatch,
        amount: Option<Money>,
        now: DateTime<Utc>,
    ) -> Result<Transition> {
        let order = Order::recovered(order_id, signal, amount, now);

        match self.orders.create(order.clone()).await {
            Ok(()) => {
                metrics::counter!("webhook_fallback_creates_total").increment(1);
                Ok(Transition {
                    order,
                    changed: true,
                    recovered: true,
                })
            }
            Err(StoreError::DuplicateOrder(_)) => {
                // A concurrent delivery recreated it first.
                let outcome = self
                    .orders
                    .upsert(order_id, patch, now)
                    .await?
                    .ok_or_else(|| {
                        CheckoutError::Persistence(StoreError::Unavailable(format!(
                            "order {order_id} vanished during reconciliation"
                        )))
                    })?;
                Ok(Transition {
                    order: outcome.order,
                    changed: outcome.changed,
                    recovered: false,
                })
            }
            Err(e) => {
                tracing::error!(error = %e, "fallback create failed, processor will redeliver");
                Err(e.into())
            }
        }
    }
}
