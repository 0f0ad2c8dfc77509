use std::str::FromStr;

use anyhow::{Context, Result};

use super::{
    config_model::{ApiServer, DotEnvyConfig, Stripe, Supabase},
    stage::Stage,
};

const DEFAULT_SUCCESS_URL: &str = "https://mystoryrealm.com?success=true";
const DEFAULT_CANCEL_URL: &str = "https://mystoryrealm.com?canceled=true";

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    load_from(|key| std::env::var(key).ok())
}

pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<DotEnvyConfig> {
    let stage = lookup("STAGE")
        .map(|raw| Stage::try_from(&raw).unwrap_or_default())
        .unwrap_or_default();

    let api_server = ApiServer {
        port: parsed_or(&lookup, "SERVER_PORT", "8080")?,
        body_limit: parsed_or(&lookup, "SERVER_BODY_LIMIT", "1")?,
        timeout: parsed_or(&lookup, "SERVER_TIMEOUT", "30")?,
    };

    let supabase = Supabase {
        project_url: required(&lookup, "SUPABASE_URL")?,
        service_key: required(&lookup, "SUPABASE_SERVICE_KEY")?,
        http_timeout_secs: parsed_or(&lookup, "SUPABASE_HTTP_TIMEOUT_SECS", "10")?,
        max_retries: parsed_or(&lookup, "SUPABASE_MAX_RETRIES", "3")?,
        backoff_base_ms: parsed_or(&lookup, "SUPABASE_BACKOFF_BASE_MS", "200")?,
        backoff_max_ms: parsed_or(&lookup, "SUPABASE_BACKOFF_MAX_MS", "2000")?,
    };

    let stripe = Stripe {
        secret_key: required(&lookup, "STRIPE_SECRET_KEY")?,
        webhook_secret: required(&lookup, "STRIPE_WEBHOOK_SECRET")?,
        webhook_tolerance_secs: parsed_or(&lookup, "STRIPE_WEBHOOK_TOLERANCE_SECS", "300")?,
        http_timeout_secs: parsed_or(&lookup, "STRIPE_HTTP_TIMEOUT_SECS", "10")?,
        success_url: lookup("STRIPE_SUCCESS_URL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_SUCCESS_URL.to_string()),
        cancel_url: lookup("STRIPE_CANCEL_URL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_CANCEL_URL.to_string()),
    };

    Ok(DotEnvyConfig {
        stage,
        api_server,
        supabase,
        stripe,
    })
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .with_context(|| format!("{key} is invalid"))
}

fn parsed_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .unwrap_or_else(|| default.to_string())
        .trim()
        .parse()
        .with_context(|| format!("{key} is invalid"))
}
