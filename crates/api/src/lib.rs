//! HTTP surface of the storefront checkout.
//!
//! Thin axum handlers over the checkout services, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::CatalogItem;
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::{CatalogStore, StoreError};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::store::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/store/items", get(routes::store::list_items))
        .route("/store/resume-order", post(routes::store::resume_order))
        .route("/store/paymentintent", post(routes::store::create_payment_intent))
        .route("/store/confirm-order", post(routes::store::confirm_order))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Failure to load the catalog seed file.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("cannot read catalog seed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid catalog seed: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Loads a JSON array of catalog items into the catalog store.
pub async fn seed_catalog(catalog: &dyn CatalogStore, path: &Path) -> Result<usize, SeedError> {
    let raw = tokio::fs::read(path).await?;
    let items: Vec<CatalogItem> = serde_json::from_slice(&raw)?;
    let count = items.len();

    for item in items {
        catalog.put_item(item).await?;
    }

    tracing::info!(count, path = %path.display(), "catalog seeded");
    Ok(count)
}
