pub mod auth;
pub mod retry;
pub mod user_data;

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Response};
use serde::Deserialize;

use retry::{RetryPolicy, SupabaseRequestError, is_retryable_status};

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub project_url: String,
    pub service_key: String,
    pub http_timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl SupabaseConfig {
    pub fn base_url(&self) -> &str {
        self.project_url.trim_end_matches('/')
    }
}

pub(crate) fn build_http_client(config: &SupabaseConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()
        .context("failed to build Supabase http client")
}

#[derive(Debug, Deserialize)]
struct SupabaseErrorBody {
    message: Option<String>,
    code: Option<String>,
    hint: Option<String>,
}

/// Turns a non-success response into a [`SupabaseRequestError`], keeping a short
/// preview of the body for the logs.
pub(crate) async fn ensure_success(resp: Response, context: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = match resp.text().await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => "<empty response body>".to_string(),
        Err(err) => format!("<failed to read response body: {err}>"),
    };

    let mut detail = format!("supabase {} failed (status {})", context, status.as_u16());

    match serde_json::from_str::<SupabaseErrorBody>(&body) {
        Ok(parsed) => {
            if let Some(code) = parsed.code {
                detail.push_str(&format!(", code {}", code));
            }
            if let Some(message) = parsed.message {
                detail.push_str(&format!(": {}", message));
            }
            if let Some(hint) = parsed.hint {
                detail.push_str(&format!(" (hint: {})", hint));
            }
        }
        Err(_) => {
            let preview = body.chars().take(512).collect::<String>();
            detail.push_str(&format!("; body={}", preview));
        }
    }

    if is_retryable_status(status) {
        Err(SupabaseRequestError::retryable(detail, Some(status.as_u16())))
    } else {
        Err(SupabaseRequestError::non_retryable(
            detail,
            Some(status.as_u16()),
        ))
    }
}
