use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::state::AppState;

/// Endpoint: GET /api/v1/connections/{user_id}
pub async fn connection_status(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> HttpResponse {
    let user_id = path.into_inner();
    let connected = state.registry.is_connected(&user_id).await;

    HttpResponse::Ok().json(json!({
        "userId": user_id,
        "connected": connected
    }))
}

/// Endpoint: GET /api/v1/connections
pub async fn list_connected_users(state: web::Data<AppState>) -> HttpResponse {
    let users = state.registry.connected_user_ids().await;

    HttpResponse::Ok().json(json!({
        "count": users.len(),
        "users": users
    }))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/v1/connections", web::get().to(list_connected_users))
        .route(
            "/api/v1/connections/{user_id}",
            web::get().to(connection_status),
        );
}
