//! Payment processor trait and in-memory implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::OrderId;
use domain::Money;
use tokio::sync::Mutex;

use crate::error::{CheckoutError, ProcessorError};
use crate::signature::verify_signature;
use crate::webhook::WebhookEvent;

/// A processor-side payment intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub id: String,
    /// Handed to the browser to confirm the payment.
    pub client_secret: String,
}

/// Metadata attached to an intent and echoed back on every callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentMetadata {
    pub order_id: OrderId,
}

/// Operations checkout needs from the payment processor.
///
/// Implementations hold their own API key and webhook signing secret.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Creates a payment intent for `amount` in `currency`.
    async fn create_payment_intent(
        &self,
        amount: Money,
        currency: &str,
        metadata: &IntentMetadata,
    ) -> Result<PaymentIntent, ProcessorError>;

    /// Verifies the callback signature and parses the event.
    ///
    /// Fails with `Signature` before the body is looked at, and with
    /// `MalformedEvent` when a correctly signed body is not an event.
    fn verify_and_parse_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, CheckoutError>;
}

#[async_trait]
impl<T: PaymentProcessor + ?Sized> PaymentProcessor for Arc<T> {
    async fn create_payment_intent(
        &self,
        amount: Money,
        currency: &str,
        metadata: &IntentMetadata,
    ) -> Result<PaymentIntent, ProcessorError> {
        (**self).create_payment_intent(amount, currency, metadata).await
    }

    fn verify_and_parse_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, CheckoutError> {
        (**self).verify_and_parse_webhook(payload, signature_header)
    }
}

/// An intent recorded by [`InMemoryPaymentProcessor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedIntent {
    pub intent: PaymentIntent,
    pub amount: Money,
    pub currency: String,
    pub metadata: IntentMetadata,
}

#[derive(Debug, Default)]
struct InMemoryProcessorState {
    intents: Mutex<Vec<RecordedIntent>>,
    next_id: AtomicU32,
    fail_on_create: AtomicBool,
    delay_ms: AtomicU64,
}

/// In-memory payment processor for local runs and tests.
///
/// Webhooks are verified with the same signature scheme as the real
/// processor, so tests sign payloads with [`crate::signature::sign_payload`].
#[derive(Debug, Clone)]
pub struct InMemoryPaymentProcessor {
    webhook_secret: String,
    state: Arc<InMemoryProcessorState>,
}

impl InMemoryPaymentProcessor {
    /// Creates a processor that verifies webhooks against `webhook_secret`.
    pub fn new(webhook_secret: impl Into<String>) -> Self {
        Self {
            webhook_secret: webhook_secret.into(),
            state: Arc::default(),
        }
    }

    /// Configures the processor to reject intent creation.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.fail_on_create.store(fail, Ordering::SeqCst);
    }

    /// Delays every intent creation, for timeout tests.
    pub fn set_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.state.delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Returns every intent created so far.
    pub async fn intents(&self) -> Vec<RecordedIntent> {
        self.state.intents.lock().await.clone()
    }

    /// Returns the number of intents created so far.
    pub async fn intent_count(&self) -> usize {
        self.state.intents.lock().await.len()
    }
}

#[async_trait]
impl PaymentProcessor for InMemoryPaymentProcessor {
    async fn create_payment_intent(
        &self,
        amount: Money,
        currency: &str,
        metadata: &IntentMetadata,
    ) -> Result<PaymentIntent, ProcessorError> {
        let delay = self.state.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.state.fail_on_create.load(Ordering::SeqCst) {
            return Err(ProcessorError::Rejected {
                status: 402,
                message: "card_declined".to_string(),
            });
        }
        if !amount.is_positive() {
            return Err(ProcessorError::Rejected {
                status: 400,
                message: "amount must be positive".to_string(),
            });
        }

        let n = self.state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let intent = PaymentIntent {
            id: format!("pi_{n:06}"),
            client_secret: format!("pi_{n:06}_secret_{}", metadata.order_id.as_uuid().simple()),
        };

        self.state.intents.lock().await.push(RecordedIntent {
            intent: intent.clone(),
            amount,
            currency: currency.to_string(),
            metadata: *metadata,
        });

        Ok(intent)
    }

    fn verify_and_parse_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, CheckoutError> {
        verify_signature(payload, signature_header, &self.webhook_secret, Utc::now())?;
        Ok(WebhookEvent::parse(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SignatureError;
    use crate::signature::sign_payload;
    use crate::webhook::WebhookEventError;

    #[tokio::test]
    async fn test_create_records_intent() {
        let processor = InMemoryPaymentProcessor::new("whsec_test");
        let metadata = IntentMetadata {
            order_id: OrderId::new(),
        };

        let intent = processor
            .create_payment_intent(Money::from_minor(2000), "eur", &metadata)
            .await
            .unwrap();

        assert!(intent.client_secret.starts_with(&intent.id));
        let recorded = processor.intents().await;
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].amount, Money::from_minor(2000));
        assert_eq!(recorded[0].metadata, metadata);
    }

    #[tokio::test]
    async fn test_fail_on_create() {
        let processor = InMemoryPaymentProcessor::new("whsec_test");
        processor.set_fail_on_create(true);

        let result = processor
            .create_payment_intent(
                Money::from_minor(2000),
                "eur",
                &IntentMetadata {
                    order_id: OrderId::new(),
                },
            )
            .await;

        assert!(matches!(result, Err(ProcessorError::Rejected { .. })));
        assert_eq!(processor.intent_count().await, 0);
    }

    #[test]
    fn test_webhook_requires_valid_signature() {
        let processor = InMemoryPaymentProcessor::new("whsec_test");
        let body = br#"{"type":"payment_intent.succeeded"}"#;

        let header = sign_payload(body, "whsec_test", Utc::now()).unwrap();
        assert!(processor.verify_and_parse_webhook(body, &header).is_ok());

        let forged = sign_payload(body, "whsec_other", Utc::now()).unwrap();
        assert!(matches!(
            processor.verify_and_parse_webhook(body, &forged),
            Err(CheckoutError::Signature(SignatureError::Mismatch))
        ));
    }

    #[test]
    fn test_signed_garbage_is_malformed_event() {
        let processor = InMemoryPaymentProcessor::new("whsec_test");
        let body = b"not json";
        let header = sign_payload(body, "whsec_test", Utc::now()).unwrap();

        assert!(matches!(
            processor.verify_and_parse_webhook(body, &header),
            Err(CheckoutError::MalformedEvent(WebhookEventError::InvalidPayload(_)))
        ));
    }
}
