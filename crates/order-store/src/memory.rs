use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{CatalogItem, ItemId, Order, OrderPatch, OrderStatus, PatchOutcome};
use tokio::sync::RwLock;

use crate::{
    OrderId, Result, StoreError,
    store::{CatalogStore, OrderStore, UpsertOutcome},
};

#[derive(Debug, Default)]
struct FailureSwitches {
    creates: AtomicBool,
    upserts: AtomicBool,
}

/// In-memory order store.
///
/// Provides the same interface as the PostgreSQL implementation. Each
/// upsert runs entirely under the write lock, which gives the same
/// atomicity as a single conditional update.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    failures: Arc<FailureSwitches>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Makes subsequent `create` calls fail with `Unavailable`.
    pub fn set_fail_creates(&self, fail: bool) {
        self.failures.creates.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent `upsert` calls fail with `Unavailable`.
    pub fn set_fail_upserts(&self, fail: bool) {
        self.failures.upserts.store(fail, Ordering::SeqCst);
    }

    /// Removes an order directly, simulating a record lost outside checkout.
    pub async fn remove(&self, order_id: OrderId) -> Option<Order> {
        self.orders.write().await.remove(&order_id)
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn find_by_order_id(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&order_id).cloned())
    }

    async fn find_pending_by_order_id(&self, order_id: OrderId) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .get(&order_id)
            .filter(|o| o.status == OrderStatus::Pending)
            .cloned())
    }

    async fn create(&self, order: Order) -> Result<()> {
        if self.failures.creates.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("create disabled".to_string()));
        }

        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.order_id) {
            return Err(StoreError::DuplicateOrder(order.order_id));
        }
        orders.insert(order.order_id, order);
        Ok(())
    }

    async fn upsert(
        &self,
        order_id: OrderId,
        patch: &OrderPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<UpsertOutcome>> {
        if self.failures.upserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("upsert disabled".to_string()));
        }

        let mut orders = self.orders.write().await;
        let Some(order) = orders.get_mut(&order_id) else {
            return Ok(None);
        };

        match order.apply_patch(patch, now) {
            PatchOutcome::Applied { changed } => Ok(Some(UpsertOutcome {
                order: order.clone(),
                changed,
            })),
            PatchOutcome::Rejected => Ok(None),
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut orders = self.orders.write().await;
        let before = orders.len();
        orders.retain(|_, order| !order.is_expired(now));
        Ok((before - orders.len()) as u64)
    }
}

/// In-memory catalog, ordered by item ID.
#[derive(Clone, Default)]
pub struct InMemoryCatalogStore {
    items: Arc<RwLock<BTreeMap<ItemId, CatalogItem>>>,
}

impl InMemoryCatalogStore {
    /// Creates a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from a list of items, validating each.
    pub fn with_items(items: impl IntoIterator<Item = CatalogItem>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for item in items {
            item.validate()?;
            map.insert(item.id.clone(), item);
        }
        Ok(Self {
            items: Arc::new(RwLock::new(map)),
        })
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn list_published_items(&self) -> Result<Vec<CatalogItem>> {
        let items = self.items.read().await;
        Ok(items.values().filter(|i| i.published).cloned().collect())
    }

    async fn find_item_by_id(&self, item_id: &ItemId) -> Result<Option<CatalogItem>> {
        Ok(self.items.read().await.get(item_id).cloned())
    }

    async fn put_item(&self, item: CatalogItem) -> Result<()> {
        item.validate()?;
        self.items.write().await.insert(item.id.clone(), item);
        Ok(())
    }
}
