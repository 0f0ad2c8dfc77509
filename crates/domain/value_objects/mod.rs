pub mod daily_state;
pub mod enums;
pub mod saved_stories;
pub mod subscription_mirror;
pub mod subscriptions;
pub mod user_actions;
pub mod user_data_patch;
