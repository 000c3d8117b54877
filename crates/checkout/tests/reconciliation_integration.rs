//! End-to-end checkout tests: intent creation, resume, and webhook
//! reconciliation against in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use checkout::signature::sign_payload;
use checkout::{
    CheckoutError, CheckoutRequest, CheckoutSettings, InMemoryNotifier, InMemoryPaymentProcessor,
    NoticeKind, NotificationTrigger, PaymentIntentOrchestrator, ReconcileOutcome,
    WebhookReconciler,
};
use common::OrderId;
use domain::{CartLine, CatalogItem, CustomerDetails, Money, Order, OrderOrigin, OrderStatus};
use order_store::{CatalogStore, InMemoryCatalogStore, InMemoryOrderStore, OrderStore};
use serde_json::json;

const SECRET: &str = "whsec_test";

struct TestHarness {
    orchestrator:
        PaymentIntentOrchestrator<InMemoryOrderStore, InMemoryCatalogStore, InMemoryPaymentProcessor>,
    reconciler: WebhookReconciler<InMemoryOrderStore, InMemoryPaymentProcessor>,
    orders: InMemoryOrderStore,
    catalog: InMemoryCatalogStore,
    processor: InMemoryPaymentProcessor,
    notifier: InMemoryNotifier,
}

impl TestHarness {
    fn new() -> Self {
        let orders = InMemoryOrderStore::new();
        let catalog = InMemoryCatalogStore::with_items([
            CatalogItem::new("A", "Tee").with_size("M", Money::from_minor(1000)),
            CatalogItem::new("B", "Hoodie").with_size("L", Money::from_minor(4550)),
        ])
        .unwrap();
        let processor = InMemoryPaymentProcessor::new(SECRET);
        let notifier = InMemoryNotifier::new();

        let orchestrator = PaymentIntentOrchestrator::new(
            orders.clone(),
            catalog.clone(),
            processor.clone(),
            CheckoutSettings::default(),
        );
        let reconciler = WebhookReconciler::new(
            orders.clone(),
            processor.clone(),
            NotificationTrigger::new(Arc::new(notifier.clone()), Duration::from_secs(1)),
        );

        Self {
            orchestrator,
            reconciler,
            orders,
            catalog,
            processor,
            notifier,
        }
    }

    async fn checkout(&self, cart: Vec<CartLine>) -> OrderId {
        self.orchestrator
            .create_or_resume_intent(CheckoutRequest {
                cart,
                order_id: None,
                customer: None,
            })
            .await
            .unwrap()
            .order_id
    }

    async fn deliver(&self, body: serde_json::Value) -> Result<ReconcileOutcome, CheckoutError> {
        let payload = body.to_string().into_bytes();
        let header = sign_payload(&payload, SECRET, Utc::now()).unwrap();
        let outcome = self.reconciler.reconcile(&payload, &header).await?;

        // Let the notification land before the test looks at it.
        if let ReconcileOutcome::Applied {
            notification: Some(handle),
            ..
        } = &outcome
        {
            while !handle.is_finished() {
                tokio::task::yield_now().await;
            }
        }
        Ok(outcome)
    }

    async fn order(&self, order_id: OrderId) -> Order {
        self.orders.find_by_order_id(order_id).await.unwrap().unwrap()
    }
}

fn event(event_type: &str, order_id: OrderId) -> serde_json::Value {
    json!({
        "id": "evt_1",
        "type": event_type,
        "data": { "object": {
            "id": "pi_1",
            "amount": 2000,
            "metadata": { "orderID": order_id.to_string() }
        }}
    })
}

fn charge_succeeded(order_id: OrderId, charge_id: &str) -> serde_json::Value {
    json!({
        "id": "evt_2",
        "type": "charge.succeeded",
        "data": { "object": {
            "id": charge_id,
            "amount": 2000,
            "metadata": { "orderID": order_id.to_string() }
        }}
    })
}

fn applied(outcome: ReconcileOutcome) -> (Order, Option<NoticeKind>, bool) {
    match outcome {
        ReconcileOutcome::Applied {
            order,
            notice,
            recovered,
            ..
        } => (order, notice, recovered),
        ReconcileOutcome::Ignored { event_type } => panic!("event {event_type} was ignored"),
    }
}

#[tokio::test]
async fn test_happy_path_authorize_then_charge() {
    let h = TestHarness::new();
    let order_id = h.checkout(vec![CartLine::new("A", "M", 2)]).await;

    let placeholder = h.order(order_id).await;
    assert_eq!(placeholder.purchase_cost_minor, Money::from_minor(2000));
    assert!(placeholder.expire_at.is_some());

    let (order, notice, _) = applied(
        h.deliver(event("payment_intent.succeeded", order_id))
            .await
            .unwrap(),
    );
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.expire_at.is_none());
    assert_eq!(notice, Some(NoticeKind::Authorized));

    let (order, notice, _) = applied(h.deliver(charge_succeeded(order_id, "ch_1")).await.unwrap());
    assert_eq!(order.status, OrderStatus::Payed);
    assert_eq!(order.charge_id.as_deref(), Some("ch_1"));
    assert_eq!(notice, Some(NoticeKind::Paid));

    assert_eq!(
        h.notifier.sent().await,
        vec![
            (order_id, NoticeKind::Authorized),
            (order_id, NoticeKind::Paid)
        ]
    );
}

#[tokio::test]
async fn test_charge_before_authorization_stays_payed() {
    let h = TestHarness::new();
    let order_id = h.checkout(vec![CartLine::new("A", "M", 1)]).await;

    h.deliver(charge_succeeded(order_id, "ch_1")).await.unwrap();
    let (order, notice, _) = applied(
        h.deliver(event("payment_intent.succeeded", order_id))
            .await
            .unwrap(),
    );

    assert_eq!(order.status, OrderStatus::Payed);
    assert_eq!(order.charge_id.as_deref(), Some("ch_1"));
    assert_eq!(notice, None);
    assert_eq!(h.notifier.sent().await.len(), 1);
}

#[tokio::test]
async fn test_duplicate_charge_is_idempotent() {
    let h = TestHarness::new();
    let order_id = h.checkout(vec![CartLine::new("A", "M", 1)]).await;

    let (first, _, _) = applied(h.deliver(charge_succeeded(order_id, "ch_1")).await.unwrap());
    let (second, notice, _) =
        applied(h.deliver(charge_succeeded(order_id, "ch_1")).await.unwrap());

    assert_eq!(first, second);
    assert_eq!(h.order(order_id).await, first);
    assert_eq!(notice, None);
    assert_eq!(h.notifier.sent().await, vec![(order_id, NoticeKind::Paid)]);
}

#[tokio::test]
async fn test_failure_after_payment_does_not_downgrade() {
    let h = TestHarness::new();
    let order_id = h.checkout(vec![CartLine::new("A", "M", 1)]).await;

    h.deliver(charge_succeeded(order_id, "ch_1")).await.unwrap();
    h.deliver(event("charge.failed", order_id)).await.unwrap();

    assert_eq!(h.order(order_id).await.status, OrderStatus::Payed);
}

#[tokio::test]
async fn test_webhook_for_missing_order_recreates_it() {
    let h = TestHarness::new();
    let order_id = OrderId::new();

    let (order, notice, recovered) =
        applied(h.deliver(charge_succeeded(order_id, "ch_9")).await.unwrap());

    assert!(recovered);
    assert_eq!(notice, Some(NoticeKind::Paid));
    assert_eq!(order.status, OrderStatus::Payed);
    assert_eq!(order.origin, OrderOrigin::WebhookFallback);
    assert_eq!(order.purchase_cost_minor, Money::from_minor(2000));
    assert_eq!(h.order(order_id).await, order);
}

#[tokio::test]
async fn test_failed_event_for_missing_order_recreates_failed() {
    let h = TestHarness::new();
    let order_id = OrderId::new();

    let (order, notice, _) = applied(
        h.deliver(event("payment_intent.payment_failed", order_id))
            .await
            .unwrap(),
    );

    assert_eq!(order.status, OrderStatus::Failed);
    assert_eq!(notice, Some(NoticeKind::Failed));
}

#[tokio::test]
async fn test_concurrent_deliveries_for_missing_order_converge() {
    let h = Arc::new(TestHarness::new());
    let order_id = OrderId::new();

    let a = {
        let h = Arc::clone(&h);
        tokio::spawn(async move { h.deliver(charge_succeeded(order_id, "ch_1")).await })
    };
    let b = {
        let h = Arc::clone(&h);
        tokio::spawn(async move { h.deliver(event("payment_intent.succeeded", order_id)).await })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    assert_eq!(h.orders.order_count().await, 1);
    let order = h.order(order_id).await;
    assert_eq!(order.status, OrderStatus::Payed);
    assert_eq!(order.charge_id.as_deref(), Some("ch_1"));
}

#[tokio::test]
async fn test_invalid_signature_never_mutates() {
    let h = TestHarness::new();
    let order_id = h.checkout(vec![CartLine::new("A", "M", 1)]).await;
    let before = h.order(order_id).await;

    let payload = charge_succeeded(order_id, "ch_1").to_string().into_bytes();
    let forged = sign_payload(&payload, "whsec_attacker", Utc::now()).unwrap();
    let result = h.reconciler.reconcile(&payload, &forged).await;

    assert!(matches!(result, Err(CheckoutError::Signature(_))));
    assert_eq!(h.order(order_id).await, before);
    assert!(h.notifier.sent().await.is_empty());

    // Nor does it fabricate orders.
    let unknown = OrderId::new();
    let payload = charge_succeeded(unknown, "ch_1").to_string().into_bytes();
    let result = h.reconciler.reconcile(&payload, "t=1,v1=00").await;
    assert!(result.is_err());
    assert!(h.orders.find_by_order_id(unknown).await.unwrap().is_none());
}

#[tokio::test]
async fn test_ignored_event_changes_nothing() {
    let h = TestHarness::new();
    let order_id = h.checkout(vec![CartLine::new("A", "M", 1)]).await;
    let before = h.order(order_id).await;

    let outcome = h.deliver(event("payment_intent.created", order_id)).await.unwrap();

    assert!(matches!(outcome, ReconcileOutcome::Ignored { .. }));
    assert_eq!(h.order(order_id).await, before);
}

#[tokio::test]
async fn test_notification_failure_does_not_fail_webhook() {
    let h = TestHarness::new();
    h.notifier.set_fail(true);
    let order_id = h.checkout(vec![CartLine::new("A", "M", 1)]).await;

    let outcome = h.deliver(charge_succeeded(order_id, "ch_1")).await;

    assert!(outcome.is_ok());
    assert_eq!(h.order(order_id).await.status, OrderStatus::Payed);
}

#[tokio::test]
async fn test_update_failure_falls_back_to_create_for_missing_order() {
    let h = TestHarness::new();
    h.orders.set_fail_upserts(true);
    let order_id = OrderId::new();

    let (order, _, recovered) =
        applied(h.deliver(charge_succeeded(order_id, "ch_1")).await.unwrap());

    assert!(recovered);
    assert_eq!(order.status, OrderStatus::Payed);
}

#[tokio::test]
async fn test_persistence_failure_is_reported_for_redelivery() {
    let h = TestHarness::new();
    let order_id = h.checkout(vec![CartLine::new("A", "M", 1)]).await;
    h.orders.set_fail_upserts(true);

    let result = h.deliver(charge_succeeded(order_id, "ch_1")).await;
    assert!(matches!(result, Err(CheckoutError::Persistence(_))));

    h.orders.set_fail_creates(true);
    let result = h.deliver(charge_succeeded(OrderId::new(), "ch_2")).await;
    assert!(matches!(result, Err(CheckoutError::Persistence(_))));

    // Redelivery succeeds once the store is back.
    h.orders.set_fail_upserts(false);
    h.orders.set_fail_creates(false);
    h.deliver(charge_succeeded(order_id, "ch_1")).await.unwrap();
    assert_eq!(h.order(order_id).await.status, OrderStatus::Payed);
}

#[tokio::test]
async fn test_resume_reprices_against_current_catalog() {
    let h = TestHarness::new();
    let customer = CustomerDetails {
        email: Some("jo@example.com".to_string()),
        ..Default::default()
    };
    let created = h
        .orchestrator
        .create_or_resume_intent(CheckoutRequest {
            cart: vec![CartLine::new("A", "M", 2)],
            order_id: None,
            customer: Some(customer.clone()),
        })
        .await
        .unwrap();

    h.catalog
        .put_item(CatalogItem::new("A", "Tee").with_size("M", Money::from_minor(1200)))
        .await
        .unwrap();

    let resumed = h
        .orchestrator
        .create_or_resume_intent(CheckoutRequest {
            cart: vec![CartLine::new("A", "M", 2)],
            order_id: Some(created.order_id),
            customer: None,
        })
        .await
        .unwrap();

    assert_eq!(resumed.order_id, created.order_id);
    assert_ne!(resumed.client_secret, created.client_secret);

    let order = h.order(created.order_id).await;
    assert_eq!(order.purchase_cost_minor, Money::from_minor(2400));
    assert_eq!(order.customer, Some(customer));
    assert_eq!(h.orders.order_count().await, 1);

    let intents = h.processor.intents().await;
    assert_eq!(intents.len(), 2);
    assert_eq!(intents[1].amount, Money::from_minor(2400));
    assert_eq!(intents[1].metadata.order_id, created.order_id);
}

#[tokio::test]
async fn test_resume_after_authorization_is_orphan() {
    let h = TestHarness::new();
    let order_id = h.checkout(vec![CartLine::new("A", "M", 1)]).await;
    h.deliver(event("payment_intent.succeeded", order_id))
        .await
        .unwrap();

    let result = h
        .orchestrator
        .create_or_resume_intent(CheckoutRequest {
            cart: vec![CartLine::new("A", "M", 1)],
            order_id: Some(order_id),
            customer: None,
        })
        .await;

    assert!(matches!(result, Err(CheckoutError::OrphanResume(id)) if id == order_id));
    assert_eq!(h.processor.intent_count().await, 1);
}

#[tokio::test]
async fn test_resume_order_only_returns_pending() {
    let h = TestHarness::new();
    let pending = h.checkout(vec![CartLine::new("A", "M", 1)]).await;
    let payed = h.checkout(vec![CartLine::new("A", "M", 1)]).await;
    let failed = h.checkout(vec![CartLine::new("B", "L", 1)]).await;
    h.deliver(charge_succeeded(payed, "ch_1")).await.unwrap();
    h.deliver(event("charge.failed", failed)).await.unwrap();

    assert_eq!(
        h.orchestrator.resume_order(pending).await.unwrap().order_id,
        pending
    );
    assert!(matches!(
        h.orchestrator.resume_order(payed).await,
        Err(CheckoutError::NotFound(_))
    ));
    assert!(matches!(
        h.orchestrator.resume_order(failed).await,
        Err(CheckoutError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_client_cost_fields_never_priced() {
    let h = TestHarness::new();
    let request: CheckoutRequest = serde_json::from_value(json!({
        "cart": [
            { "itemId": "A", "size": "M", "quantity": 3, "cost": 1, "lineCost": 1 },
            { "itemId": "B", "size": "L", "quantity": 1, "unitCost": 0 }
        ]
    }))
    .unwrap();

    let created = h.orchestrator.create_or_resume_intent(request).await.unwrap();

    assert_eq!(
        h.order(created.order_id).await.purchase_cost_minor,
        Money::from_minor(3 * 1000 + 4550)
    );
}
