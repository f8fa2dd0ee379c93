/// Wire schema for real-time notification delivery
///
/// Shared by the realtime-notification-service (producer) and the
/// notification-subscriber client (consumer). Every frame on the socket is a
/// `ServerEvent`, serialized as `{"event": <name>, "data": <payload>}`.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event name for generic notifications
pub const EVENT_NOTIFICATION: &str = "notification";
/// Event name for moderator application decisions
pub const EVENT_APPLICATION_STATUS_UPDATE: &str = "application_status_update";
/// Event name sent once after the server registers a connection
pub const EVENT_CONNECTED: &str = "connected";

/// Severity shown to the user
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Success,
    Error,
    Info,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Success => "success",
            NotificationType::Error => "error",
            NotificationType::Info => "info",
        }
    }
}

/// A single notification as held in a client inbox
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub message: String,
    #[serde(with = "iso8601")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl Notification {
    /// Create an unread notification with a fresh id, stamped now
    pub fn new(notification_type: NotificationType, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            notification_type,
            message: message.into(),
            timestamp: Utc::now(),
            read: false,
        }
    }

    /// Build the inbox entry for an application decision received at `received_at`
    ///
    /// Approved decisions render as `success`, rejected ones as `error`.
    /// The id is `app_{applicationId}_{unix_millis}`.
    pub fn from_application_status(
        update: &ApplicationStatusUpdate,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!(
                "app_{}_{}",
                update.application_id,
                received_at.timestamp_millis()
            ),
            notification_type: update.status.notification_type(),
            message: update.message.clone(),
            timestamp: received_at,
            read: false,
        }
    }
}

/// Outcome of a moderator application review
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn notification_type(&self) -> NotificationType {
        match self {
            ApplicationStatus::Approved => NotificationType::Success,
            ApplicationStatus::Rejected => NotificationType::Error,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatusUpdate {
    pub application_id: String,
    pub status: ApplicationStatus,
    pub message: String,
}

/// Server to client events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Registration confirmation carrying the opaque handle id
    #[serde(rename_all = "camelCase")]
    Connected { connection_id: Uuid },

    Notification(Notification),

    ApplicationStatusUpdate(ApplicationStatusUpdate),
}

impl ServerEvent {
    /// Event name as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => EVENT_CONNECTED,
            ServerEvent::Notification(_) => EVENT_NOTIFICATION,
            ServerEvent::ApplicationStatusUpdate(_) => EVENT_APPLICATION_STATUS_UPDATE,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// ISO-8601 with millisecond precision and a `Z` suffix
pub mod iso8601 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
