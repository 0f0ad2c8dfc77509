use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{entities::user_data::UserDataEntity, value_objects::saved_stories::SavedStory};

/// Partial update of a `user_data` row. Only the fields that are set are serialized;
/// `chosen_realm: Some(None)` serializes as an explicit `null`.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct UserDataPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_premium: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stories_today: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chosen_realm: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_today: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_play_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_stories: Option<Vec<SavedStory>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_subscription_id: Option<String>,
}

impl UserDataPatch {
    pub fn daily_reset(today: NaiveDate) -> Self {
        Self {
            stories_today: Some(0),
            chosen_realm: Some(None),
            completed_today: Some(false),
            last_play_date: Some(today),
            ..Self::default()
        }
    }

    pub fn premium(is_premium: bool) -> Self {
        Self {
            is_premium: Some(is_premium),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, record: &mut UserDataEntity) {
        if let Some(is_premium) = self.is_premium {
            record.is_premium = is_premium;
        }
        if let Some(stories_today) = self.stories_today {
            record.stories_today = stories_today;
        }
        if let Some(chosen_realm) = &self.chosen_realm {
            record.chosen_realm = chosen_realm.clone();
        }
        if let Some(completed_today) = self.completed_today {
            record.completed_today = completed_today;
        }
        if let Some(last_play_date) = self.last_play_date {
            record.last_play_date = Some(last_play_date);
        }
        if let Some(saved_stories) = &self.saved_stories {
            record.saved_stories = saved_stories.clone();
        }
        if let Some(customer_id) = &self.stripe_customer_id {
            record.stripe_customer_id = Some(customer_id.clone());
        }
        if let Some(subscription_id) = &self.stripe_subscription_id {
            record.stripe_subscription_id = Some(subscription_id.clone());
        }
    }
}
