use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::{
    entities::user_data::UserDataEntity, value_objects::user_data_patch::UserDataPatch,
};

#[automock]
#[async_trait]
pub trait UserDataRepository {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<UserDataEntity>>;

    async fn find_by_stripe_customer_id(
        &self,
        stripe_customer_id: &str,
    ) -> Result<Option<UserDataEntity>>;

    /// Inserting a row that already exists is a no-op.
    async fn insert(&self, record: &UserDataEntity) -> Result<()>;

    async fn patch_by_user_id(&self, user_id: &str, patch: &UserDataPatch) -> Result<()>;
}
