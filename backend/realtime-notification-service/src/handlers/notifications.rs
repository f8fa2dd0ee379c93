use actix_web::{web, HttpResponse};
use notification_events::{
    ApplicationStatus, ApplicationStatusUpdate, Notification, NotificationType,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct SendNotificationRequest {
    #[serde(rename = "type", default = "default_notification_type")]
    pub notification_type: NotificationType,
    pub message: String,
}

fn default_notification_type() -> NotificationType {
    NotificationType::Info
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatusRequest {
    pub user_id: String,
    pub status: ApplicationStatus,
    pub message: String,
}

/// Push a notification to one user
///
/// Endpoint: POST /api/v1/notifications/{user_id}
pub async fn send_user_notification(
    path: web::Path<String>,
    state: web::Data<AppState>,
    body: web::Json<SendNotificationRequest>,
) -> AppResult<HttpResponse> {
    let user_id = path.into_inner();
    let body = body.into_inner();

    if body.message.trim().is_empty() {
        return Err(AppError::BadRequest("message must not be empty".to_string()));
    }

    let notification = Notification::new(body.notification_type, body.message);
    let notification_id = notification.id.clone();
    let delivered = state
        .dispatcher
        .send_notification_to_user(&user_id, notification)
        .await;

    Ok(HttpResponse::Ok().json(json!({
        "delivered": delivered,
        "notificationId": notification_id
    })))
}

/// Tell an applicant their moderator application was decided
///
/// Endpoint: POST /api/v1/applications/{application_id}/status
pub async fn send_application_status(
    path: web::Path<String>,
    state: web::Data<AppState>,
    body: web::Json<ApplicationStatusRequest>,
) -> AppResult<HttpResponse> {
    let application_id = path.into_inner();
    let body = body.into_inner();

    if body.user_id.trim().is_empty() {
        return Err(AppError::BadRequest("userId is required".to_string()));
    }

    let update = ApplicationStatusUpdate {
        application_id,
        status: body.status,
        message: body.message,
    };
    let delivered = state
        .dispatcher
        .send_application_status_update(&body.user_id, update)
        .await;

    Ok(HttpResponse::Ok().json(json!({ "delivered": delivered })))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/api/v1/notifications/{user_id}",
        web::post().to(send_user_notification),
    )
    .route(
        "/api/v1/applications/{application_id}/status",
        web::post().to(send_application_status),
    );
}
