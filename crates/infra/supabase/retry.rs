use std::{error::Error as StdError, future::Future, time::Duration};

use anyhow::Result;
use reqwest::StatusCode;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 200,
            backoff_max_ms: 2_000,
        }
    }
}

#[derive(Debug)]
pub struct SupabaseRequestError {
    retryable: bool,
    status: Option<u16>,
    message: String,
    source: Option<anyhow::Error>,
}

impl SupabaseRequestError {
    pub fn retryable(message: impl Into<String>, status: Option<u16>) -> anyhow::Error {
        anyhow::Error::new(Self {
            retryable: true,
            status,
            message: message.into(),
            source: None,
        })
    }

    pub fn non_retryable(message: impl Into<String>, status: Option<u16>) -> anyhow::Error {
        anyhow::Error::new(Self {
            retryable: false,
            status,
            message: message.into(),
            source: None,
        })
    }

    pub fn from_transport(err: reqwest::Error, context: &str) -> anyhow::Error {
        let retryable = err.is_timeout() || err.is_connect() || err.is_request();
        anyhow::Error::new(Self {
            retryable,
            status: err.status().map(|status| status.as_u16()),
            message: format!("supabase {context}: transport error"),
            source: Some(err.into()),
        })
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }
}

impl std::fmt::Display for SupabaseRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for SupabaseRequestError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|err| err.as_ref())
    }
}

pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429) || status.is_server_error()
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or the
/// policy runs out of attempts. Only meant for idempotent store calls.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, context: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_retries.saturating_add(1).max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retryable = err
                    .downcast_ref::<SupabaseRequestError>()
                    .is_some_and(SupabaseRequestError::is_retryable);

                if !retryable || attempt >= max_attempts {
                    return Err(err);
                }

                let backoff = calculate_backoff(attempt, policy);
                warn!(
                    context,
                    attempt,
                    max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "supabase: request failed; retrying"
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

fn calculate_backoff(attempt: usize, policy: &RetryPolicy) -> Duration {
    let exponent = attempt.saturating_sub(1) as u32;
    let multiplier = 2u64.saturating_pow(exponent);
    let base = policy.backoff_base_ms.saturating_mul(multiplier);
    let capped = base.min(policy.backoff_max_ms);
    Duration::from_millis(capped)
}
