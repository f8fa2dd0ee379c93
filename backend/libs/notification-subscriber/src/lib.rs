/// Client side of real-time notifications
///
/// Holds one session's inbox (newest first), persists it through an
/// `InboxStore`, and keeps a socket to the realtime-notification-service
/// open with reconnect backoff.
pub mod backoff;
pub mod config;
pub mod error;
pub mod inbox;
pub mod store;
pub mod subscriber;

pub use config::SubscriberConfig;
pub use error::{Result, SubscriberError};
pub use inbox::{InboxSnapshot, NotificationInbox};
pub use store::{storage_key, InboxStore, JsonFileStore, MemoryStore};
pub use subscriber::{ConnectionState, Subscriber, SubscriberTask};
