use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use notification_events::ServerEvent;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::{
    auth,
    error::AppError,
    state::AppState,
    websocket::{ConnectionHandle, ConnectionId, WsSession},
};

/// Handshake parameters. `userId` is the registry key.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    pub token: Option<String>,
}

/// Endpoint: GET /api/socket
pub async fn socket_status() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain")
        .body("Socket server is running")
}

/// Endpoint: GET /api/socket/ws?userId=...
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    query: web::Query<WsParams>,
) -> Result<HttpResponse, Error> {
    let params = query.into_inner();

    let user_id = params
        .user_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("userId is required".to_string()))?;

    let token = auth::extract_token(params.token.as_deref(), &req);
    auth::verify_handshake(
        state.config.socket_jwt_secret.as_deref(),
        &user_id,
        token.as_deref(),
    )?;

    let (tx, rx) = mpsc::unbounded_channel();
    let connection_id = ConnectionId::new();

    let session = WsSession::new(
        user_id.clone(),
        connection_id,
        state.registry.clone(),
        rx,
        state.config.heartbeat_interval(),
        state.config.client_timeout(),
    );
    let resp = ws::start(session, &req, stream)?;

    // queued ahead of anything the registry routes here
    let _ = tx.send(ServerEvent::Connected {
        connection_id: connection_id.as_uuid(),
    });
    state
        .registry
        .register(user_id, ConnectionHandle::new(connection_id, tx))
        .await;

    Ok(resp)
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/socket", web::get().to(socket_status))
        .route("/api/socket/ws", web::get().to(ws_handler));
}
