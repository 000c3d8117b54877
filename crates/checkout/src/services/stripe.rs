//! Stripe client over the REST API (form-encoded, basic auth).

use async_trait::async_trait;
use chrono::Utc;
use domain::Money;
use serde::Deserialize;

use super::processor::{IntentMetadata, PaymentIntent, PaymentProcessor};
use crate::error::{CheckoutError, ProcessorError};
use crate::signature::verify_signature;
use crate::webhook::{ORDER_ID_METADATA_KEY, WebhookEvent};

/// Default Stripe API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

#[derive(Deserialize)]
struct IntentResponse {
    id: String,
    client_secret: String,
}

/// Stripe payment processor client.
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
    webhook_secret: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            secret_key: secret_key.into(),
            webhook_secret: webhook_secret.into(),
        }
    }

    /// Points the client at another base URL (a mock server, or a proxy).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn intent_form(amount: Money, currency: &str, metadata: &IntentMetadata) -> Vec<(String, String)> {
        vec![
            ("amount".to_string(), amount.minor_units().to_string()),
            ("currency".to_string(), currency.to_string()),
            (
                format!("metadata[{ORDER_ID_METADATA_KEY}]"),
                metadata.order_id.to_string(),
            ),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ]
    }
}

/// Extracts Stripe's `error.message`, falling back to the whole body.
fn api_error_message(body: &serde_json::Value) -> String {
    body["error"]["message"]
        .as_str()
        .map(String::from)
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    #[tracing::instrument(skip(self, metadata), fields(order_id = %metadata.order_id))]
    async fn create_payment_intent(
        &self,
        amount: Money,
        currency: &str,
        metadata: &IntentMetadata,
    ) -> Result<PaymentIntent, ProcessorError> {
        let resp = self
            .http
            .post(format!("{}/v1/payment_intents", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&Self::intent_form(amount, currency, metadata))
            .send()
            .await?;

        let status = resp.status();
        let body: serde_json::Value = resp.json().await?;

        if !status.is_success() {
            return Err(ProcessorError::Rejected {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        let intent: IntentResponse = serde_json::from_value(body)
            .map_err(|e| ProcessorError::InvalidResponse(e.to_string()))?;
        tracing::debug!(intent_id = %intent.id, "payment intent created");

        Ok(PaymentIntent {
            id: intent.id,
            client_secret: intent.client_secret,
        })
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
