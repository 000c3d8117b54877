use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{CatalogItem, ItemId, Order, OrderPatch};

use crate::{OrderId, Result};

/// The record after a successful upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// The order as stored after the patch.
    pub order: Order,

    /// False when the patch was a no-op (e.g. a redelivered callback).
    pub changed: bool,
}

/// Persistence boundary for orders.
///
/// All operations address a single document by its business key. All
/// implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Finds an order by business key, whatever its status.
    async fn find_by_order_id(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Finds an order only if it is still pending.
    ///
    /// Customer-facing resume uses this so a settled order is never handed
    /// back as if it could be paid again.
    async fn find_pending_by_order_id(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Inserts a new order.
    ///
    /// Fails with `DuplicateOrder` if the business key is already taken.
    async fn create(&self, order: Order) -> Result<()>;

    /// Applies a patch as one atomic conditional update.
    ///
    /// Returns `None` when no order matches: either the key is unknown, or
    /// the patch's precondition does not hold (a reprice of an order that
    /// is no longer resumable).
    async fn upsert(
        &self,
        order_id: OrderId,
        patch: &OrderPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<UpsertOutcome>>;

    /// Deletes orders whose TTL watermark has passed.
    ///
    /// This is the store's own expiry mechanism, driven by
    /// [`crate::spawn_ttl_reaper`]. Checkout code never calls it.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Read access to the catalog, plus the write used to seed it.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Lists items visible in the storefront, ordered by ID.
    async fn list_published_items(&self) -> Result<Vec<CatalogItem>>;

    /// Finds any item by ID, published or not.
    async fn find_item_by_id(&self, item_id: &ItemId) -> Result<Option<CatalogItem>>;

    /// Inserts or replaces an item after validating it.
    async fn put_item(&self, item: CatalogItem) -> Result<()>;
}

#[async_trait]
impl<T: OrderStore + ?Sized> OrderStore for Arc<T> {
    async fn find_by_order_id(&self, order_id: OrderId) -> Result<Option<Order>> {
        (**self).find_by_order_id(order_id).await
    }

    async fn find_pending_by_order_id(&self, order_id: OrderId) -> Result<Option<Order>> {
        (**self).find_pending_by_order_id(order_id).await
    }

    async fn create(&self, order: Order) -> Result<()> {
        (**self).create(order).await
    }

    async fn upsert(
        &self,
        order_id: OrderId,
        patch: &OrderPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<UpsertOutcome>> {
        (**self).upsert(order_id, patch, now).await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        (**self).purge_expired(now).await
    }
}

#[async_trait]
impl<T: CatalogStore + ?Sized> CatalogStore for Arc<T> {
    async fn list_published_items(&self) -> Result<Vec<CatalogItem>> {
        (**self).list_published_items().await
    }

    async fn find_item_by_id(&self, item_id: &ItemId) -> Result<Option<CatalogItem>> {
        (**self).find_item_by_id(item_id).await
    }

    async fn put_item(&self, item: CatalogItem) -> Result<()> {
        (**self).put_item(item).await
    }
}
