pub mod identity;
pub mod user_data;
