use super::stage::Stage;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub stage: Stage,
    pub api_server: ApiServer,
    pub supabase: Supabase,
    pub stripe: Stripe,
}

#[derive(Debug, Clone)]
pub struct ApiServer {
    pub port: u16,
    /// MiB
    pub body_limit: u64,
    /// seconds
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Supabase {
    pub project_url: String,
    pub service_key: String,
    pub http_timeout_secs: u64,
    pub max_retries: usize,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub webhook_secret: String,
    pub webhook_tolerance_secs: u64,
    pub http_timeout_secs: u64,
    pub success_url: String,
    pub cancel_url: String,
}
