use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::domain::{
    entities::user_data::UserDataEntity, repositories::user_data::UserDataRepository,
    value_objects::user_data_patch::UserDataPatch,
};

use super::{
    SupabaseConfig, build_http_client, ensure_success,
    retry::{RetryPolicy, SupabaseRequestError, with_retry},
};

const TABLE_PATH: &str = "rest/v1/user_data";

/// `user_data` table accessed through the Supabase PostgREST API with the service key.
pub struct UserDataSupabase {
    http: Client,
    table_url: String,
    service_key: String,
    retry: RetryPolicy,
}

impl UserDataSupabase {
    pub fn new(config: &SupabaseConfig) -> Result<Self> {
        Ok(Self {
            http: build_http_client(config)?,
            table_url: format!("{}/{}", config.base_url(), TABLE_PATH),
            service_key: config.service_key.clone(),
            retry: config.retry.clone(),
        })
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn select_one(
        &self,
        column: &'static str,
        value: &str,
        context: &'static str,
    ) -> Result<Option<UserDataEntity>> {
        let filter = format!("eq.{}", value);

        let rows: Vec<UserDataEntity> = with_retry(&self.retry, context, || async {
            let resp = self
                .authorized(self.http.get(&self.table_url))
                .query(&[(column, filter.as_str()), ("select", "*"), ("limit", "1")])
                .send()
                .await
                .map_err(|err| SupabaseRequestError::from_transport(err, context))?;
            let resp = ensure_success(resp, context).await?;

            resp.json::<Vec<UserDataEntity>>()
                .await
                .with_context(|| format!("supabase {context}: failed to decode user_data rows"))
        })
        .await?;

        debug!(column, rows = rows.len(), "supabase: user_data lookup finished");
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl UserDataRepository for UserDataSupabase {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<UserDataEntity>> {
        self.select_one("user_id", user_id, "find user_data by user_id")
            .await
    }

    async fn find_by_stripe_customer_id(
        &self,
        stripe_customer_id: &str,
    ) -> Result<Option<UserDataEntity>> {
        self.select_one(
            "stripe_customer_id",
            stripe_customer_id,
            "find user_data by stripe_customer_id",
        )
        .await
    }

    async fn insert(&self, record: &UserDataEntity) -> Result<()> {
        const CONTEXT: &str = "insert user_data";

        // ignore-duplicates turns a concurrent first insert into a no-op, so retrying is safe.
        with_retry(&self.retry, CONTEXT, || async {
            let resp = self
                .authorized(self.http.post(&self.table_url))
                .query(&[("on_conflict", "user_id")])
                .header("Prefer", "return=minimal,resolution=ignore-duplicates")
                .json(record)
                .send()
                .await
                .map_err(|err| SupabaseRequestError::from_transport(err, CONTEXT))?;
            ensure_success(resp, CONTEXT).await?;
            Ok(())
        })
        .await
    }

    async fn patch_by_user_id(&self, user_id: &str, patch: &UserDataPatch) -> Result<()> {
        const CONTEXT: &str = "patch user_data";
        let filter = format!("eq.{}", user_id);

        with_retry(&self.retry, CONTEXT, || async {
            let resp = self
                .authorized(self.http.patch(&self.table_url))
                .query(&[("user_id", filter.as_str())])
                .header("Prefer", "return=minimal")
                .json(patch)
                .send()
                .await
                .map_err(|err| SupabaseRequestError::from_transport(err, CONTEXT))?;
            ensure_success(resp, CONTEXT).await?;
            Ok(())
        })
        .await
    }
}
