pub mod connection;
pub mod models;
pub mod service;

pub use connection::{get_connection, open, DbPool};
pub use models::*;
