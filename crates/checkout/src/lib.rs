//! Checkout services: payment intent orchestration and webhook
//! reconciliation.
//!
//! The [`PaymentIntentOrchestrator`] prices a cart against the catalog,
//! asks the processor for a payment intent and writes (or re-prices) the
//! placeholder order. The [`WebhookReconciler`] consumes the processor's
//! signed callbacks and moves orders through their payment status, falling
//! back to recreating an order when the expected record is missing.

pub mod error;
pub mod orchestrator;
pub mod reconciler;
pub mod services;
pub mod signature;
pub mod webhook;

pub use error::{CheckoutError, NotifyError, ProcessorError, Result, SignatureError};
pub use orchestrator::{CheckoutRequest, CheckoutSettings, IntentCreated, PaymentIntentOrchestrator};
pub use reconciler::{ReconcileOutcome, WebhookReconciler};
pub use services::{
    HttpNotifier, InMemoryNotifier, InMemoryPaymentProcessor, IntentMetadata, LogNotifier,
    NoticeKind, NotificationTrigger, Notifier, PaymentIntent, PaymentProcessor, StripeClient,
};
pub use webhook::{WebhookEvent, WebhookEventError, WebhookEventType};
