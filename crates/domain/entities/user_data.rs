use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::value_objects::saved_stories::SavedStory;

/// A `user_data` row as stored in Supabase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserDataEntity {
    pub user_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_premium: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stories_today: u32,
    #[serde(default)]
    pub last_play_date: Option<NaiveDate>,
    #[serde(default)]
    pub chosen_realm: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed_today: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub saved_stories: Vec<SavedStory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_subscription_id: Option<String>,
}

impl UserDataEntity {
    /// Record inserted on the first read for a user.
    pub fn new(user_id: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            user_id: user_id.into(),
            is_premium: false,
            stories_today: 0,
            last_play_date: Some(today),
            chosen_realm: None,
            completed_today: false,
            saved_stories: Vec::new(),
            stripe_customer_id: None,
            stripe_subscription_id: None,
        }
    }
}

// PostgREST returns explicit nulls for unset columns.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
