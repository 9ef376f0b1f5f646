pub mod connection;
pub mod service;

pub use connection::{get_connection, DbPool};
pub use service::{DbService, Preferences};
