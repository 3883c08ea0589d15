pub mod analytics;
pub mod auth;
pub mod blog;
pub mod comment;
pub mod notification;
pub mod user;

pub use analytics::*;
pub use auth::*;
pub use blog::*;
pub use comment::*;
pub use notification::*;
pub use user::*;
