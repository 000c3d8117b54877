//! Background expiry of abandoned placeholder orders.

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::store::OrderStore;

/// Spawns a task that periodically deletes orders past their TTL watermark.
///
/// Orders without a watermark are never touched. The task runs until the
/// returned handle is aborted.
pub fn spawn_ttl_reaper<S>(store: S, interval: Duration) -> JoinHandle<()>
where
    S: OrderStore + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match store.purge_expired(Utc::now()).await {
                Ok(0) => {}
                Ok(purged) => {
                    metrics::counter!("expired_orders_purged_total").increment(purged);
                    tracing::info!(purged, "purged expired placeholder orders");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "TTL reaper pass failed");
                }
            }
        }
    })
}
