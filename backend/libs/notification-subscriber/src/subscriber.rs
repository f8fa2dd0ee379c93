use chrono::Utc;
use futures_util::StreamExt;
use notification_events::{Notification, ServerEvent};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use crate::backoff::Backoff;
use crate::config::SubscriberConfig;
use crate::error::{Result, SubscriberError};
use crate::inbox::{InboxSnapshot, NotificationInbox};
use crate::store::{storage_key, InboxStore, JsonFileStore, MemoryStore};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

struct Shared {
    config: SubscriberConfig,
    store_key: String,
    store: Arc<dyn InboxStore>,
    inbox: Mutex<NotificationInbox>,
    // stored list merged into `inbox`; nothing is saved until this is set
    restored: AtomicBool,
    inbox_tx: watch::Sender<InboxSnapshot>,
    state_tx: watch::Sender<ConnectionState>,
}

/// One user's session: socket, inbox and its persisted copy
///
/// Cheap to clone; clones share the same inbox and connection state.
#[derive(Clone)]
pub struct Subscriber {
    shared: Arc<Shared>,
}

impl Subscriber {
    pub fn new(config: SubscriberConfig, store: Arc<dyn InboxStore>) -> Self {
        let (inbox_tx, _) = watch::channel(InboxSnapshot::default());
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            shared: Arc::new(Shared {
                store_key: storage_key(&config.user_id),
                config,
                store,
                inbox: Mutex::new(NotificationInbox::new()),
                restored: AtomicBool::new(false),
                inbox_tx,
                state_tx,
            }),
        }
    }

    /// Uses a `JsonFileStore` when `store_dir` is set, memory otherwise
    pub fn from_config(config: SubscriberConfig) -> Self {
        let store: Arc<dyn InboxStore> = match &config.store_dir {
            Some(dir) => Arc::new(JsonFileStore::new(dir.clone())),
            None => Arc::new(MemoryStore::new()),
        };
        Self::new(config, store)
    }

    pub fn user_id(&self) -> &str {
        &self.shared.config.user_id
    }

    /// Replace the inbox with the persisted copy; returns how many were loaded
    pub async fn load(&self) -> Result<usize> {
        let stored = self.shared.store.load(&self.shared.store_key).await?;
        let count = stored.len();

        let mut inbox = self.shared.inbox.lock().await;
        *inbox = NotificationInbox::from_stored(stored);
        self.shared.restored.store(true, Ordering::Release);
        self.shared.inbox_tx.send_replace(inbox.snapshot());

        tracing::debug!(user_id = %self.user_id(), count, "loaded stored notifications");
        Ok(count)
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state_tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn watch_inbox(&self) -> watch::Receiver<InboxSnapshot> {
        self.shared.inbox_tx.subscribe()
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.shared.inbox.lock().await.notifications().to_vec()
    }

    pub async fn unread_count(&self) -> usize {
        self.shared.inbox.lock().await.unread_count()
    }

    pub async fn mark_as_read(&self, id: &str) -> bool {
        self.mutate(|inbox| inbox.mark_as_read(id)).await
    }

    pub async fn mark_all_as_read(&self) -> usize {
        self.mutate(|inbox| inbox.mark_all_as_read()).await
    }

    pub async fn clear_notifications(&self) {
        self.mutate(|inbox| inbox.clear()).await
    }

    /// Apply one server event to the inbox
    pub async fn handle_event(&self, event: ServerEvent) {
        match event {
            ServerEvent::Connected { connection_id } => {
                tracing::debug!(
                    user_id = %self.user_id(),
                    %connection_id,
                    "server registered connection"
                );
            }
            ServerEvent::Notification(notification) => {
                tracing::info!(
                    user_id = %self.user_id(),
                    notification_id = %notification.id,
                    kind = notification.notification_type.as_str(),
                    "received notification"
                );
                self.mutate(|inbox| inbox.push(notification)).await;
            }
            ServerEvent::ApplicationStatusUpdate(update) => {
                let notification = Notification::from_application_status(&update, Utc::now());
                tracing::info!(
                    user_id = %self.user_id(),
                    application_id = %update.application_id,
                    status = ?update.status,
                    "received application status update"
                );
                self.mutate(|inbox| inbox.push(notification)).await;
            }
        }
    }

    /// Decode a text frame and apply it
    pub async fn handle_frame(&self, text: &str) -> Result<()> {
        let event = ServerEvent::from_json(text)?;
        self.handle_event(event).await;
        Ok(())
    }

    /// Keep a connection open until reconnect attempts run out
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Keep a connection open until `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        self.restore().await;
        let mut backoff = Backoff::new(self.shared.config.reconnect_policy());

        loop {
            let outcome = tokio::select! {
                _ = &mut shutdown => {
                    self.set_state(ConnectionState::Disconnected);
                    return Ok(());
                }
                outcome = self.session(&mut backoff) => outcome,
            };
            self.set_state(ConnectionState::Disconnected);

            if let Err(e) = outcome {
                tracing::warn!(user_id = %self.user_id(), error = %e, "socket session ended");
            }

            let Some(delay) = backoff.next_delay() else {
                return Err(SubscriberError::ReconnectExhausted(backoff.attempt()));
            };
            tracing::info!(
                user_id = %self.user_id(),
                attempt = backoff.attempt(),
                ?delay,
                "reconnecting"
            );

            tokio::select! {
                _ = &mut shutdown => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Run on the current runtime; dropping the returned task also stops it
    pub fn spawn(&self) -> SubscriberTask {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let subscriber = self.clone();
        let handle = tokio::spawn(async move {
            subscriber
                .run_until(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        SubscriberTask {
            shutdown: Some(shutdown_tx),
            handle,
        }
    }

    async fn session(&self, backoff: &mut Backoff) -> Result<()> {
        self.set_state(ConnectionState::Connecting);

        let url = self.shared.config.socket_url();
        let (mut socket, _) = connect_async(url.as_str())
            .await
            .map_err(|e| SubscriberError::Connect(e.to_string()))?;

        self.set_state(ConnectionState::Connected);
        backoff.reset();

        self.read_loop(&mut socket).await
    }

    async fn read_loop(&self, socket: &mut Socket) -> Result<()> {
        while let Some(msg) = socket.next().await {
            match msg? {
                Message::Text(text) => {
                    if let Err(e) = self.handle_frame(text.as_str()).await {
                        tracing::warn!(user_id = %self.user_id(), error = %e, "ignoring malformed frame");
                    }
                }
                Message::Close(frame) => {
                    tracing::info!(user_id = %self.user_id(), ?frame, "server closed socket");
                    break;
                }
                Message::Binary(_) => {
                    tracing::warn!("Binary WebSocket messages not supported");
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Merge the stored list into the inbox once
    async fn restore(&self) {
        let mut inbox = self.shared.inbox.lock().await;
        if self.restore_locked(&mut inbox).await {
            self.shared.inbox_tx.send_replace(inbox.snapshot());
        }
    }

    /// Entries already in memory are newer than anything stored. Returns
    /// whether the inbox now holds the stored list.
    async fn restore_locked(&self, inbox: &mut NotificationInbox) -> bool {
        if self.shared.restored.load(Ordering::Acquire) {
            return true;
        }

        match self.shared.store.load(&self.shared.store_key).await {
            Ok(stored) => {
                let count = stored.len();
                let mut merged = inbox.notifications().to_vec();
                merged.extend(stored);
                *inbox = NotificationInbox::from_stored(merged);
                self.shared.restored.store(true, Ordering::Release);

                tracing::debug!(user_id = %self.user_id(), count, "restored stored notifications");
                true
            }
            Err(e) => {
                tracing::warn!(user_id = %self.user_id(), error = %e, "failed to restore stored inbox");
                false
            }
        }
    }

    async fn mutate<R>(&self, f: impl FnOnce(&mut NotificationInbox) -> R) -> R {
        let mut inbox = self.shared.inbox.lock().await;
        let restored = self.restore_locked(&mut inbox).await;
        let result = f(&mut inbox);

        // saving before the stored list is merged would overwrite it
        if restored {
            if let Err(e) = self
                .shared
                .store
                .save(&self.shared.store_key, inbox.notifications())
                .await
            {
                tracing::warn!(user_id = %self.user_id(), error = %e, "failed to persist inbox");
            }
        }
        self.shared.inbox_tx.send_replace(inbox.snapshot());
        result
    }

    fn set_state(&self, next: ConnectionState) {
        let changed = self.shared.state_tx.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            *state = next;
            true
        });
        if changed {
            tracing::debug!(user_id = %self.user_id(), state = ?next, "connection state changed");
        }
    }
}

/// Handle to a spawned `Subscriber::run_until`
pub struct SubscriberTask {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<()>>,
}

impl SubscriberTask {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Close the socket and wait for the task to end
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        (&mut self.handle)
            .await
            .map_err(|e| SubscriberError::Task(e.to_string()))?
    }
}
