pub mod auth;
pub mod health;
pub mod sessions;
pub mod users;
