pub mod api_key;
pub mod auth;
pub mod request_log;
