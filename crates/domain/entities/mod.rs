pub mod authenticated_users;
pub mod user_data;
