//! Storefront checkout endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode};
use checkout::{
    CheckoutRequest, CheckoutSettings, IntentCreated, NotificationTrigger, Notifier,
    PaymentIntentOrchestrator, PaymentProcessor, ReconcileOutcome, WebhookReconciler,
};
use common::OrderId;
use domain::{CatalogItem, Order};
use order_store::{CatalogStore, OrderStore};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Header carrying the processor's webhook signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

pub type SharedOrderStore = Arc<dyn OrderStore>;
pub type SharedCatalogStore = Arc<dyn CatalogStore>;
pub type SharedProcessor = Arc<dyn PaymentProcessor>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub catalog: SharedCatalogStore,
    pub orchestrator:
        PaymentIntentOrchestrator<SharedOrderStore, SharedCatalogStore, SharedProcessor>,
    pub reconciler: WebhookReconciler<SharedOrderStore, SharedProcessor>,
}

impl AppState {
    pub fn new(
        orders: SharedOrderStore,
        catalog: SharedCatalogStore,
        processor: SharedProcessor,
        notifier: Arc<dyn Notifier>,
        settings: CheckoutSettings,
        notify_timeout: Duration,
    ) -> Self {
        let orchestrator = PaymentIntentOrchestrator::new(
            orders.clone(),
            catalog.clone(),
            processor.clone(),
            settings,
        );
        let reconciler = WebhookReconciler::new(
            orders,
            processor,
            NotificationTrigger::new(notifier, notify_timeout),
        );

        Self {
            catalog,
            orchestrator,
            reconciler,
        }
    }
}

// -- Request types --

#[derive(Deserialize)]
pub struct ResumeOrderRequest {
    #[serde(rename = "orderID")]
    pub order_id: OrderId,
}

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

// -- Handlers --

/// GET /store/items: the published catalog.
#[tracing::instrument(skip(state))]
pub async fn list_items(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CatalogItem>>, ApiError> {
    Ok(Json(state.catalog.list_published_items().await?))
}

/// POST /store/resume-order: a pending order, or 404.
#[tracing::instrument(skip(state, payload))]
pub async fn resume_order(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ResumeOrderRequest>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let Json(req) = payload?;
    Ok(Json(state.orchestrator.resume_order(req.order_id).await?))
}

/// POST /store/paymentintent: price the cart and issue a client secret.
#[tracing::instrument(skip(state, payload))]
pub async fn create_payment_intent(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<IntentCreated>, ApiError> {
    let Json(req) = payload?;
    Ok(Json(state.orchestrator.create_or_resume_intent(req).await?))
}

/// POST /store/confirm-order: processor webhook.
///
/// Takes the raw body so the signature is checked over the exact bytes.
/// A missing header fails verification like any other bad signature.
#[tracing::instrument(skip_all)]
pub async fn confirm_order(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookAck>), ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    match state.reconciler.reconcile(&body, signature).await? {
        ReconcileOutcome::Applied { order, .. } => Ok((
            StatusCode::OK,
            Json(WebhookAck {
                received: true,
                status: Some(order.status.to_string()),
            }),
        )),
        ReconcileOutcome::Ignored { .. } => Ok((
            StatusCode::ACCEPTED,
            Json(WebhookAck {
                received: true,
                status: None,
            }),
        )),
    }
}
