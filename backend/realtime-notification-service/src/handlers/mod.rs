/// HTTP and WebSocket handlers
pub mod connections;
pub mod notifications;
pub mod socket;

use actix_web::web;

/// Register all routes of the service
pub fn register_routes(cfg: &mut web::ServiceConfig) {
    socket::register_routes(cfg);
    notifications::register_routes(cfg);
    connections::register_routes(cfg);
}
