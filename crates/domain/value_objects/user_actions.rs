use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::value_objects::saved_stories::SavedStory;

/// Raw body of `POST /api/user`: `{ "action": "...", "data": { ... } }`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserActionRequest {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Serialize)]
pub struct UserActionReceipt {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    StartStory { realm: String },
    CompleteStory,
    SaveStory { story: SavedStory },
    DeleteStory { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UserActionError {
    #[error("Invalid action")]
    InvalidAction,
    #[error("Missing or invalid field: {0}")]
    InvalidField(&'static str),
}

impl UserAction {
    pub fn name(&self) -> &'static str {
        match self {
            UserAction::StartStory { .. } => "start_story",
            UserAction::CompleteStory => "complete_story",
            UserAction::SaveStory { .. } => "save_story",
            UserAction::DeleteStory { .. } => "delete_story",
        }
    }
}

impl TryFrom<UserActionRequest> for UserAction {
    type Error = UserActionError;

    fn try_from(request: UserActionRequest) -> Result<Self, Self::Error> {
        let action = request.action.ok_or(UserActionError::InvalidAction)?;
        let data = request.data;

        match action.as_str() {
            "start_story" => {
                let realm = data
                    .get("realm")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|realm| !realm.is_empty())
                    .ok_or(UserActionError::InvalidField("realm"))?;
                Ok(UserAction::StartStory {
                    realm: realm.to_string(),
                })
            }
            "complete_story" => Ok(UserAction::CompleteStory),
            "save_story" => {
                let story = data
                    .get("story")
                    .filter(|story| !story.is_null())
                    .cloned()
                    .ok_or(UserActionError::InvalidField("story"))?;
                Ok(UserAction::SaveStory { story })
            }
            "delete_story" => {
                let index = data
                    .get("index")
                    .and_then(Value::as_u64)
                    .and_then(|index| usize::try_from(index).ok())
                    .ok_or(UserActionError::InvalidField("index"))?;
                Ok(UserAction::DeleteStory { index })
            }
            _ => Err(UserActionError::InvalidAction),
        }
    }
}
