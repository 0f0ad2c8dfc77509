use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::authenticated_users::AuthenticatedUser;

#[automock]
#[async_trait]
pub trait IdentityRepository {
    /// `Ok(None)` when the token is rejected by the identity provider.
    async fn find_user_by_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<AuthenticatedUser>>;
}
