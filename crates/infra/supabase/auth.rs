use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::domain::{
    entities::authenticated_users::AuthenticatedUser,
    repositories::identity::IdentityRepository,
};

use super::{
    SupabaseConfig, build_http_client, ensure_success,
    retry::{RetryPolicy, SupabaseRequestError, is_retryable_status, with_retry},
};

const CONTEXT: &str = "verify access token";

/// Resolves access tokens through Supabase Auth (`GET /auth/v1/user`).
pub struct SupabaseAuthClient {
    http: Client,
    user_url: String,
    service_key: String,
    retry: RetryPolicy,
}

impl SupabaseAuthClient {
    pub fn new(config: &SupabaseConfig) -> Result<Self> {
        Ok(Self {
            http: build_http_client(config)?,
            user_url: format!("{}/auth/v1/user", config.base_url()),
            service_key: config.service_key.clone(),
            retry: config.retry.clone(),
        })
    }
}

#[async_trait]
impl IdentityRepository for SupabaseAuthClient {
    async fn find_user_by_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<AuthenticatedUser>> {
        with_retry(&self.retry, CONTEXT, || async {
            let resp = self
                .http
                .get(&self.user_url)
                .header("apikey", &self.service_key)
                .bearer_auth(access_token)
                .send()
                .await
                .map_err(|err| SupabaseRequestError::from_transport(err, CONTEXT))?;

            let status = resp.status();
            if !status.is_success() && !is_retryable_status(status) {
                debug!(status = status.as_u16(), "supabase: access token rejected");
                return Ok(None);
            }

            let resp = ensure_success(resp, CONTEXT).await?;
            let user = resp
                .json::<AuthenticatedUser>()
                .await
                .context("supabase verify access token: failed to decode user")?;
            Ok(Some(user))
        })
        .await
    }
}
