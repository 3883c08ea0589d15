pub mod admin;
pub mod analytics;
pub mod auth;
pub mod blogs;
pub mod comments;
pub mod notifications;
pub mod users;
