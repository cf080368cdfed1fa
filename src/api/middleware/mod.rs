pub mod auth;
pub mod cors;

pub use auth::{AuthUser, UserAuth};
pub use cors::cors;
