pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod stream;
pub mod websocket;

use actix_web::web;

/// Registers every HTTP, SSE and WebSocket route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(routes::configure)
        .configure(stream::configure)
        .configure(websocket::configure);
}
