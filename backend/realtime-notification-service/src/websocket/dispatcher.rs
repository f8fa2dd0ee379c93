use notification_events::{ApplicationStatusUpdate, Notification, ServerEvent};

use super::ConnectionRegistry;
use crate::metrics;

/// Typed entry points for server-side code that wants to notify a user
///
/// Delivery is fire-and-forget: a `false` return means the user was not
/// connected and the notification is gone.
#[derive(Clone)]
pub struct NotificationDispatcher {
    registry: ConnectionRegistry,
}

impl NotificationDispatcher {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Emit a `notification` event to `user_id`
    pub async fn send_notification_to_user(&self, user_id: &str, notification: Notification) -> bool {
        let notification_id = notification.id.clone();
        let delivered = self
            .dispatch(user_id, ServerEvent::Notification(notification))
            .await;

        tracing::debug!(user_id, %notification_id, delivered, "notification dispatched");
        delivered
    }

    /// Emit an `application_status_update` event to `user_id`
    pub async fn send_application_status_update(
        &self,
        user_id: &str,
        update: ApplicationStatusUpdate,
    ) -> bool {
        let application_id = update.application_id.clone();
        let status = update.status;
        let delivered = self
            .dispatch(user_id, ServerEvent::ApplicationStatusUpdate(update))
            .await;

        tracing::info!(
            user_id,
            %application_id,
            ?status,
            delivered,
            "application status update dispatched"
        );
        delivered
    }

    async fn dispatch(&self, user_id: &str, event: ServerEvent) -> bool {
        let event_name = event.name();
        let delivered = self.registry.dispatch(user_id, event).await;
        metrics::record_dispatch(event_name, delivered);
        delivered
    }
}
