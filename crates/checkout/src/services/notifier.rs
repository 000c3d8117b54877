//! Order notices sent to the email dispatcher.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::OrderId;
use domain::{Order, OrderStatus};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::NotifyError;

/// Which notice to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    /// Payment authorized, capture pending.
    Authorized,
    Paid,
    Failed,
}

impl NoticeKind {
    /// The notice matching an order's resulting status.
    pub fn for_status(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Pending => NoticeKind::Authorized,
            OrderStatus::Payed => NoticeKind::Paid,
            OrderStatus::Failed => NoticeKind::Failed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeKind::Authorized => "authorized",
            NoticeKind::Paid => "paid",
            NoticeKind::Failed => "failed",
        }
    }
}

/// The notification dispatcher.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_order_notice(&self, order: &Order, kind: NoticeKind) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct NoticePayload<'a> {
    kind: NoticeKind,
    order: &'a Order,
}

/// Posts notices as JSON to an HTTP email dispatcher.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpNotifier {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send_order_notice(&self, order: &Order, kind: NoticeKind) -> Result<(), NotifyError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .json(&NoticePayload { kind, order })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(NotifyError::Rejected {
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }
}

/// Writes notices to the log instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_order_notice(&self, order: &Order, kind: NoticeKind) -> Result<(), NotifyError> {
        tracing::info!(
            order_id = %order.order_id,
            kind = kind.as_str(),
            email = order.customer.as_ref().and_then(|c| c.email.as_deref()),
            "order notice"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    sent: Mutex<Vec<(OrderId, NoticeKind)>>,
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

/// Records notices for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    state: Arc<InMemoryNotifierState>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send fail.
    pub fn set_fail(&self, fail: bool) {
        self.state.fail.store(fail, Ordering::SeqCst);
    }

    /// Delays every send.
    pub async fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock().await = Some(delay);
    }

    /// Notices sent so far, in order.
    pub async fn sent(&self) -> Vec<(OrderId, NoticeKind)> {
        self.state.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn send_order_notice(&self, order: &Order, kind: NoticeKind) -> Result<(), NotifyError> {
        let delay = *self.state.delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.state.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Unavailable("dispatcher down".to_string()));
        }
        self.state.sent.lock().await.push((order.order_id, kind));
        Ok(())
    }
}

/// Fire-and-forget dispatch of order notices.
///
/// Each notice runs on its own task bounded by `timeout`. Failures are
/// logged and counted, never returned to the caller.
#[derive(Clone)]
pub struct NotificationTrigger {
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
}

impl NotificationTrigger {
    pub fn new(notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        Self { notifier, timeout }
    }

    /// Spawns the send. The handle is only useful to tests; dropping it
    /// does not cancel the task.
    pub fn dispatch(&self, order: Order, kind: NoticeKind) -> JoinHandle<()> {
        let notifier = Arc::clone(&self.notifier);
        let timeout = self.timeout;

        tokio::spawn(async move {
            let outcome =
                match tokio::time::timeout(timeout, notifier.send_order_notice(&order, kind)).await {
                    Ok(Ok(())) => "sent",
                    Ok(Err(e)) => {
                        tracing::warn!(order_id = %order.order_id, kind = kind.as_str(), error = %e, "order notice failed");
                        "failed"
                    }
                    Err(_) => {
                        tracing::warn!(order_id = %order.order_id, kind = kind.as_str(), ?timeout, "order notice timed out");
                        "timeout"
                    }
                };
            metrics::counter!("order_notifications_total", "outcome" => outcome).increment(1);
        })
    }
}
