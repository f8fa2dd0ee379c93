use notification_events::ServerEvent;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc::UnboundedSender, RwLock};
use uuid::Uuid;

use crate::metrics;

/// Opaque id of one live socket session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Outbound side of a socket session
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    sender: UnboundedSender<ServerEvent>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, sender: UnboundedSender<ServerEvent>) -> Self {
        Self { id, sender }
    }
}

#[derive(Default)]
struct RegistryInner {
    by_user: HashMap<String, ConnectionHandle>,
    // reverse index, always mirrors `by_user`
    by_connection: HashMap<ConnectionId, String>,
}

impl RegistryInner {
    fn remove_user_if_current(&mut self, user_id: &str, id: ConnectionId) -> bool {
        match self.by_user.get(user_id) {
            Some(handle) if handle.id == id => {
                self.by_user.remove(user_id);
                self.by_connection.remove(&id);
                true
            }
            _ => false,
        }
    }
}

/// Which user currently owns which socket
///
/// One handle per user id; a later `register` for the same user replaces the
/// earlier handle (last write wins). Process-local and lost on restart.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or overwrite the handle for `user_id`
    ///
    /// Returns the id of the handle that was displaced, if any. The displaced
    /// session stays open but no longer receives anything.
    pub async fn register(
        &self,
        user_id: impl Into<String>,
        handle: ConnectionHandle,
    ) -> Option<ConnectionId> {
        let user_id = user_id.into();
        let mut guard = self.inner.write().await;

        let new_id = handle.id;
        let displaced = guard.by_user.insert(user_id.clone(), handle).map(|old| old.id);
        if let Some(old_id) = displaced {
            guard.by_connection.remove(&old_id);
        }
        guard.by_connection.insert(new_id, user_id.clone());
        metrics::set_connected_users(guard.by_user.len());

        match displaced {
            Some(old_id) => tracing::info!(
                user_id = %user_id,
                connection_id = %new_id,
                displaced = %old_id,
                "user reconnected, previous connection replaced"
            ),
            None => tracing::info!(
                user_id = %user_id,
                connection_id = %new_id,
                "user connected"
            ),
        }

        displaced
    }

    /// Remove the mapping held by `connection_id`
    ///
    /// Returns the user it belonged to. Unknown or already displaced handles
    /// are ignored.
    pub async fn unregister(&self, connection_id: ConnectionId) -> Option<String> {
        let mut guard = self.inner.write().await;

        let user_id = guard.by_connection.get(&connection_id).cloned()?;
        if !guard.remove_user_if_current(&user_id, connection_id) {
            return None;
        }
        metrics::set_connected_users(guard.by_user.len());

        tracing::info!(
            user_id = %user_id,
            connection_id = %connection_id,
            "user disconnected"
        );
        Some(user_id)
    }

    /// Best-effort delivery to the user's current connection
    ///
    /// Returns `false` when the user has no connection or its session is
    /// already gone; nothing is queued. A closed session found here is pruned.
    pub async fn dispatch(&self, user_id: &str, event: ServerEvent) -> bool {
        let stale = {
            let guard = self.inner.read().await;
            let Some(handle) = guard.by_user.get(user_id) else {
                tracing::debug!(user_id, event = event.name(), "user not connected, dropping");
                return false;
            };
            match handle.sender.send(event) {
                Ok(()) => return true,
                Err(_) => handle.id,
            }
        };

        let mut guard = self.inner.write().await;
        if guard.remove_user_if_current(user_id, stale) {
            metrics::set_connected_users(guard.by_user.len());
            tracing::debug!(
                user_id,
                connection_id = %stale,
                "pruned closed connection"
            );
        }
        false
    }

    pub async fn is_connected(&self, user_id: &str) -> bool {
        self.inner.read().await.by_user.contains_key(user_id)
    }

    pub async fn connection_id(&self, user_id: &str) -> Option<ConnectionId> {
        self.inner.read().await.by_user.get(user_id).map(|h| h.id)
    }

    pub async fn connected_users_count(&self) -> usize {
        self.inner.read().await.by_user.len()
    }

    pub async fn connected_user_ids(&self) -> Vec<String> {
        self.inner.read().await.by_user.keys().cloned().collect()
    }

    /// Drop every mapping (graceful shutdown, tests)
    pub async fn clear_all(&self) {
        let mut guard = self.inner.write().await;
        guard.by_user.clear();
        guard.by_connection.clear();
        metrics::set_connected_users(0);
    }
}
