//! Subscriber against a bare tokio-tungstenite server
//!
//! Covers:
//! - handshake carries userId
//! - notification / application_status_update frames land in the inbox
//! - reconnect after the server drops the socket
//! - inbox persisted to a JSON file store and restored
//! - a spawned subscriber appends to, never replaces, the stored inbox

use futures_util::{SinkExt, StreamExt};
use notification_events::{
    ApplicationStatus, ApplicationStatusUpdate, Notification, NotificationType, ServerEvent,
};
use notification_subscriber::{
    storage_key, ConnectionState, InboxSnapshot, InboxStore, JsonFileStore, Subscriber,
    SubscriberConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::{
    handshake::server::{ErrorResponse, Request, Response},
    Message,
};

async fn wait_for_inbox(rx: &mut watch::Receiver<InboxSnapshot>, len: usize) -> InboxSnapshot {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if snapshot.notifications.len() >= len {
                return snapshot;
            }
            rx.changed().await.expect("subscriber dropped");
        }
    })
    .await
    .expect("timed out waiting for inbox")
}

fn frame(event: &ServerEvent) -> Message {
    Message::Text(event.to_json().unwrap().into())
}

fn fast_config(addr: std::net::SocketAddr, user_id: &str) -> SubscriberConfig {
    let mut config = SubscriberConfig::new(format!("ws://{addr}"), user_id);
    config.reconnect_initial_delay_ms = 10;
    config.reconnect_max_delay_ms = 50;
    config.reconnect_jitter = false;
    config
}

#[tokio::test]
async fn receives_events_and_maps_application_status() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (uri_tx, mut uri_rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            let _ = uri_tx.send(req.uri().to_string());
            Ok(resp)
        })
        .await
        .unwrap();

        ws.send(frame(&ServerEvent::Notification(Notification::new(
            NotificationType::Info,
            "New system design challenge",
        ))))
        .await
        .unwrap();
        ws.send(frame(&ServerEvent::ApplicationStatusUpdate(
            ApplicationStatusUpdate {
                application_id: "mod-17".to_string(),
                status: ApplicationStatus::Approved,
                message: "Your moderator application was approved".to_string(),
            },
        )))
        .await
        .unwrap();

        // hold the socket open until the client goes away
        while ws.next().await.is_some() {}
    });

    let subscriber = Subscriber::from_config(fast_config(addr, "candidate-1"));
    let mut inbox_rx = subscriber.watch_inbox();
    let task = subscriber.spawn();

    let snapshot = wait_for_inbox(&mut inbox_rx, 2).await;
    assert_eq!(snapshot.unread_count, 2);

    // newest first
    let newest = &snapshot.notifications[0];
    assert!(newest.id.starts_with("app_mod-17_"));
    assert_eq!(newest.notification_type, NotificationType::Success);
    assert_eq!(snapshot.notifications[1].message, "New system design challenge");

    let uri = uri_rx.recv().await.unwrap();
    assert_eq!(uri, "/api/socket/ws?userId=candidate-1");
    assert_eq!(subscriber.state(), ConnectionState::Connected);

    task.shutdown().await.unwrap();
    assert_eq!(subscriber.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn reconnects_after_server_closes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        // first connection: close right away
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.close(None).await.unwrap();
        drop(ws);

        // second connection: deliver one notification
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(frame(&ServerEvent::Notification(Notification::new(
            NotificationType::Success,
            "after reconnect",
        ))))
        .await
        .unwrap();

        while ws.next().await.is_some() {}
    });

    let subscriber = Subscriber::from_config(fast_config(addr, "candidate-2"));
    let mut inbox_rx = subscriber.watch_inbox();
    let task = subscriber.spawn();

    let snapshot = wait_for_inbox(&mut inbox_rx, 1).await;
    assert_eq!(snapshot.notifications[0].message, "after reconnect");

    task.shutdown().await.unwrap();
}

#[tokio::test]
async fn inbox_survives_restart_through_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = SubscriberConfig::new("ws://127.0.0.1:1", "candidate-3");

    let first = Subscriber::new(config.clone(), Arc::new(JsonFileStore::new(dir.path())));
    first
        .handle_event(ServerEvent::Notification(Notification::new(
            NotificationType::Info,
            "Interview feedback is ready",
        )))
        .await;
    let id = first.notifications().await[0].id.clone();
    assert!(first.mark_as_read(&id).await);

    let second = Subscriber::new(config, Arc::new(JsonFileStore::new(dir.path())));
    assert_eq!(second.load().await.unwrap(), 1);

    let restored = second.notifications().await;
    assert_eq!(restored[0].message, "Interview feedback is ready");
    assert!(restored[0].read);
    assert_eq!(second.unread_count().await, 0);

    second.clear_notifications().await;
    let third = Subscriber::new(
        SubscriberConfig::new("ws://127.0.0.1:1", "candidate-3"),
        Arc::new(JsonFileStore::new(dir.path())),
    );
    assert_eq!(third.load().await.unwrap(), 0);
}

#[tokio::test]
async fn spawned_subscriber_appends_to_stored_history() {
    let dir = tempfile::tempdir().unwrap();
    let seeded = vec![
        Notification::new(NotificationType::Info, "older"),
        Notification::new(NotificationType::Info, "oldest"),
    ];
    JsonFileStore::new(dir.path())
        .save(&storage_key("candidate-4"), &seeded)
        .await
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(frame(&ServerEvent::Notification(Notification::new(
            NotificationType::Success,
            "fresh",
        ))))
        .await
        .unwrap();

        while ws.next().await.is_some() {}
    });

    let subscriber = Subscriber::new(
        fast_config(addr, "candidate-4"),
        Arc::new(JsonFileStore::new(dir.path())),
    );
    let mut inbox_rx = subscriber.watch_inbox();
    let task = subscriber.spawn();

    let snapshot = wait_for_inbox(&mut inbox_rx, 3).await;
    task.shutdown().await.unwrap();

    let messages: Vec<&str> = snapshot
        .notifications
        .iter()
        .map(|n| n.message.as_str())
        .collect();
    assert_eq!(messages, vec!["fresh", "older", "oldest"]);

    let stored = JsonFileStore::new(dir.path())
        .load(&storage_key("candidate-4"))
        .await
        .unwrap();
    assert_eq!(stored.len(), 3);
    assert_eq!(stored[0].message, "fresh");
}
