use notification_events::Notification;
use serde::{Deserialize, Serialize};

/// Point-in-time view of an inbox, published to observers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboxSnapshot {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}

/// Notifications of one session, newest first
///
/// All operations are local list mutations; nothing is confirmed with the
/// server.
#[derive(Debug, Clone, Default)]
pub struct NotificationInbox {
    notifications: Vec<Notification>,
}

impl NotificationInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted list (already newest first)
    pub fn from_stored(notifications: Vec<Notification>) -> Self {
        Self { notifications }
    }

    pub fn push(&mut self, notification: Notification) {
        self.notifications.insert(0, notification);
    }

    /// Returns `false` if no notification has this id
    pub fn mark_as_read(&mut self, id: &str) -> bool {
        match self.notifications.iter_mut().find(|n| n.id == id) {
            Some(notification) => {
                notification.read = true;
                true
            }
            None => false,
        }
    }

    /// Returns how many notifications changed
    pub fn mark_all_as_read(&mut self) -> usize {
        let mut changed = 0;
        for notification in self.notifications.iter_mut().filter(|n| !n.read) {
            notification.read = true;
            changed += 1;
        }
        changed
    }

    pub fn clear(&mut self) {
        self.notifications.clear();
    }

    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    pub fn snapshot(&self) -> InboxSnapshot {
        InboxSnapshot {
            notifications: self.notifications.clone(),
            unread_count: self.unread_count(),
        }
    }
}
