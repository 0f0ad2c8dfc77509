use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use thiserror::Error;
use tracing::error;

use super::webhook_signature::verify_signature;

const CHECKOUT_SESSIONS_URL: &str = "https://api.stripe.com/v1/checkout/sessions";

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub webhook_tolerance_secs: u64,
    pub http_timeout_secs: u64,
}

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
    webhook_tolerance_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

/// Inputs of a hosted subscription checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub price_id: String,
    pub user_id: String,
    pub user_email: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutSessionRequest {
    fn form_body(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("mode", "subscription"),
            ("payment_method_types[0]", "card"),
            ("line_items[0][price]", self.price_id.as_str()),
            ("line_items[0][quantity]", "1"),
            ("success_url", self.success_url.as_str()),
            ("cancel_url", self.cancel_url.as_str()),
            ("customer_email", self.user_email.as_str()),
            ("client_reference_id", self.user_id.as_str()),
            ("metadata[user_id]", self.user_id.as_str()),
        ]
    }
}

/// A request Stripe answered with an error status.
#[derive(Debug, Clone, Error)]
#[error("Stripe API request failed: {context} (status {status}, request_id={request_id:?})")]
pub struct StripeApiError {
    pub context: &'static str,
    pub status: u16,
    pub request_id: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
    decline_code: Option<String>,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .context("failed to build Stripe http client")?;

        Ok(Self {
            http,
            secret_key: config.secret_key,
            webhook_secret: config.webhook_secret,
            webhook_tolerance_secs: config.webhook_tolerance_secs,
        })
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &'static str,
    ) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.as_deref()),
            stripe_error_message = ?details.as_ref().and_then(|d| d.message.as_deref()),
            stripe_decline_code = ?details.as_ref().and_then(|d| d.decline_code.as_deref()),
            context = %context,
            "stripe api request failed"
        );

        Err(StripeApiError {
            context,
            status: status.as_u16(),
            request_id,
            message: details.and_then(|d| d.message),
        }
        .into())
    }

    /// Creates a subscription Checkout Session and returns its hosted URL.
    pub async fn create_checkout_session(&self, request: &CheckoutSessionRequest) -> Result<String> {
        // Stripe Checkout docs:
        // https://stripe.com/docs/api/checkout/sessions/create
        let resp = self
            .http
            .post(CHECKOUT_SESSIONS_URL)
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&request.form_body())
            .send()
            .await
            .context("failed to reach Stripe")?;
        let resp = Self::ensure_success(resp, "create checkout session").await?;

        #[derive(Deserialize)]
        struct CheckoutResp {
            url: Option<String>,
        }

        let parsed: CheckoutResp = resp.json().await?;
        parsed
            .url
            .ok_or_else(|| anyhow::anyhow!("Stripe Checkout session URL is missing"))
    }

    /// Verifies the webhook signature and parses the event.
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent> {
        verify_signature(
            &self.webhook_secret,
            payload,
            signature_header,
            self.webhook_tolerance_secs,
            Utc::now().timestamp(),
        )?;

        let event: StripeEvent =
            serde_json::from_slice(payload).context("invalid stripe event payload")?;
        Ok(event)
    }
}
