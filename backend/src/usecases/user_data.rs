use std::sync::Arc;

use chrono::NaiveDate;
use crates::domain::{
    entities::{authenticated_users::AuthenticatedUser, user_data::UserDataEntity},
    repositories::{identity::IdentityRepository, user_data::UserDataRepository},
    value_objects::{
        daily_state::DailyStateSync,
        saved_stories::{SavedStoriesError, delete_story, insert_story},
        user_actions::{UserAction, UserActionError},
        user_data_patch::UserDataPatch,
    },
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum UserDataError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Invalid token")]
    InvalidToken,
    #[error(transparent)]
    InvalidAction(#[from] UserActionError),
    #[error(transparent)]
    InvalidStoryIndex(#[from] SavedStoriesError),
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl UserDataError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            UserDataError::Unauthorized | UserDataError::InvalidToken => StatusCode::UNAUTHORIZED,
            UserDataError::InvalidAction(_) | UserDataError::InvalidStoryIndex(_) => {
                StatusCode::BAD_REQUEST
            }
            UserDataError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, UserDataError>;

pub struct UserDataUseCase<U, I>
where
    U: UserDataRepository + Send + Sync + 'static,
    I: IdentityRepository + Send + Sync + 'static,
{
    user_data_repo: Arc<U>,
    identity_repo: Arc<I>,
}

impl<U, I> UserDataUseCase<U, I>
where
    U: UserDataRepository + Send + Sync + 'static,
    I: IdentityRepository + Send + Sync + 'static,
{
    pub fn new(user_data_repo: Arc<U>, identity_repo: Arc<I>) -> Self {
        Self {
            user_data_repo,
            identity_repo,
        }
    }

    pub async fn authenticate(&self, access_token: &str) -> UseCaseResult<AuthenticatedUser> {
        if access_token.trim().is_empty() {
            return Err(UserDataError::Unauthorized);
        }

        let user = self
            .identity_repo
            .find_user_by_access_token(access_token)
            .await
            .map_err(|err| {
                error!(auth_error = ?err, "user_data: failed to verify access token");
                UserDataError::Internal(err)
            })?;

        match user {
            Some(user) => {
                debug!(user_id = %user.id, "user_data: access token verified");
                Ok(user)
            }
            None => {
                warn!("user_data: access token rejected");
                Err(UserDataError::InvalidToken)
            }
        }
    }

    /// Returns the caller's record for `today`, creating it on first access and
    /// persisting the daily reset when the stored day is stale.
    pub async fn load_user_data(
        &self,
        user_id: &str,
        today: NaiveDate,
    ) -> UseCaseResult<UserDataEntity> {
        let existing = self
            .user_data_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "user_data: failed to load record");
                UserDataError::Internal(err)
            })?;

        let record = match existing {
            Some(record) => record,
            None => {
                let record = UserDataEntity::new(user_id, today);
                self.user_data_repo.insert(&record).await.map_err(|err| {
                    error!(%user_id, db_error = ?err, "user_data: failed to create record");
                    UserDataError::Internal(err)
                })?;
                info!(%user_id, "user_data: created record on first access");
                record
            }
        };

        let sync = DailyStateSync::fetched(record).reconcile(today);

        if let Some(patch) = sync.pending_patch() {
            self.user_data_repo
                .patch_by_user_id(user_id, patch)
                .await
                .map_err(|err| {
                    error!(%user_id, db_error = ?err, "user_data: failed to persist daily reset");
                    UserDataError::Internal(err)
                })?;
            info!(%user_id, %today, "user_data: daily state reset");
        }

        let sync = sync.mark_persisted();
        debug!(%user_id, stage = sync.stage(), "user_data: daily state ready");
        Ok(sync.into_record())
    }

    /// Applies `action` on top of the reconciled record and returns the record as stored.
    pub async fn apply_action(
        &self,
        user_id: &str,
        action: UserAction,
        today: NaiveDate,
    ) -> UseCaseResult<UserDataEntity> {
        let action_name = action.name();
        let mut record = self.load_user_data(user_id, today).await?;

        let patch = match action {
            UserAction::StartStory { realm } => UserDataPatch {
                chosen_realm: Some(Some(realm)),
                stories_today: Some(record.stories_today.saturating_add(1)),
                ..UserDataPatch::default()
            },
            UserAction::CompleteStory => UserDataPatch {
                completed_today: Some(true),
                ..UserDataPatch::default()
            },
            UserAction::SaveStory { story } => UserDataPatch {
                saved_stories: Some(insert_story(record.saved_stories.clone(), story)),
                ..UserDataPatch::default()
            },
            UserAction::DeleteStory { index } => {
                let stories = delete_story(record.saved_stories.clone(), index).map_err(|err| {
                    warn!(%user_id, index, "user_data: story index out of range");
                    UserDataError::InvalidStoryIndex(err)
                })?;
                UserDataPatch {
                    saved_stories: Some(stories),
                    ..UserDataPatch::default()
                }
            }
        };

        self.user_data_repo
            .patch_by_user_id(user_id, &patch)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    action = action_name,
                    db_error = ?err,
                    "user_data: failed to apply action"
                );
                UserDataError::Internal(err)
            })?;

        patch.apply_to(&mut record);
        info!(%user_id, action = action_name, "user_data: action applied");
        Ok(record)
    }
}
