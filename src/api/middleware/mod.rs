pub mod auth;
pub mod rate_limit;

pub use auth::{bearer_user_id, UserIdentity, DEFAULT_USER};
pub use rate_limit::RateLimit;
