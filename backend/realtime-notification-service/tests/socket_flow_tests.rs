//! End-to-end tests for realtime-notification-service
//!
//! A real HttpServer on an ephemeral port, driven by:
//! - the notification-subscriber client
//! - raw tokio-tungstenite sockets (for reconnect / last-write-wins)
//! - reqwest for the HTTP dispatch endpoints
//! - a client that never answers pings (heartbeat timeout)

use actix_web::{web, App, HttpServer};
use futures_util::StreamExt;
use notification_events::{NotificationType, ServerEvent};
use notification_subscriber::{InboxSnapshot, Subscriber, SubscriberConfig};
use realtime_notification_service::{handlers, AppState, Config};
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

fn start_server() -> (String, AppState) {
    start_server_with(Config::test_defaults())
}

fn start_server_with(config: Config) -> (String, AppState) {
    let state = AppState::new(config);
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let app_state = state.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .configure(handlers::register_routes)
    })
    .workers(1)
    .listen(listener)
    .unwrap()
    .run();
    actix_rt::spawn(server);

    (format!("127.0.0.1:{}", addr.port()), state)
}

async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..250 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}

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

async fn next_event(client: &mut Client, wait: Duration) -> Option<ServerEvent> {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        let msg = tokio::time::timeout_at(deadline, client.next()).await.ok()??;
        if let Ok(Message::Text(text)) = msg {
            return Some(ServerEvent::from_json(text.as_str()).unwrap());
        }
    }
}

async fn post_json(url: String, body: Value) -> Value {
    let resp = reqwest::Client::new()
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success(), "unexpected status {}", resp.status());
    resp.json().await.unwrap()
}

#[actix_rt::test]
async fn socket_status_endpoint() {
    let (addr, _state) = start_server();

    let body = reqwest::get(format!("http://{addr}/api/socket"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "Socket server is running");
}

#[actix_rt::test]
async fn http_dispatch_reaches_subscriber_until_it_disconnects() {
    let (addr, state) = start_server();

    let subscriber = Subscriber::from_config(SubscriberConfig::new(format!("ws://{addr}"), "u1"));
    let mut inbox_rx = subscriber.watch_inbox();
    let task = subscriber.spawn();

    let registry = state.registry.clone();
    wait_until(|| {
        let registry = registry.clone();
        async move { registry.is_connected("u1").await }
    })
    .await;

    let resp = post_json(
        format!("http://{addr}/api/v1/notifications/u1"),
        json!({ "type": "info", "message": "x" }),
    )
    .await;
    assert_eq!(resp["delivered"], true);

    let snapshot = wait_for_inbox(&mut inbox_rx, 1).await;
    assert_eq!(snapshot.notifications[0].message, "x");
    assert_eq!(snapshot.notifications[0].notification_type, NotificationType::Info);
    assert_eq!(
        snapshot.notifications[0].id,
        resp["notificationId"].as_str().unwrap()
    );

    let resp = post_json(
        format!("http://{addr}/api/v1/applications/app-5/status"),
        json!({ "userId": "u1", "status": "approved", "message": "Approved!" }),
    )
    .await;
    assert_eq!(resp["delivered"], true);

    let snapshot = wait_for_inbox(&mut inbox_rx, 2).await;
    assert!(snapshot.notifications[0].id.starts_with("app_app-5_"));
    assert_eq!(snapshot.notifications[0].notification_type, NotificationType::Success);
    assert_eq!(snapshot.unread_count, 2);

    task.shutdown().await.unwrap();
    wait_until(|| {
        let registry = registry.clone();
        async move { !registry.is_connected("u1").await }
    })
    .await;

    let resp = post_json(
        format!("http://{addr}/api/v1/notifications/u1"),
        json!({ "type": "info", "message": "too late" }),
    )
    .await;
    assert_eq!(resp["delivered"], false);
}

#[actix_rt::test]
async fn reconnect_routes_only_to_latest_socket() {
    let (addr, state) = start_server();
    let url = format!("ws://{addr}/api/socket/ws?userId=u2");

    let (mut first, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let Some(ServerEvent::Connected { connection_id: first_id }) =
        next_event(&mut first, Duration::from_secs(5)).await
    else {
        panic!("expected connected event on first socket");
    };

    let (mut second, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let Some(ServerEvent::Connected { connection_id: second_id }) =
        next_event(&mut second, Duration::from_secs(5)).await
    else {
        panic!("expected connected event on second socket");
    };
    assert_ne!(first_id, second_id);

    let registry = state.registry.clone();
    wait_until(|| {
        let registry = registry.clone();
        async move {
            registry
                .connection_id("u2")
                .await
                .map(|id| id.as_uuid() == second_id)
                .unwrap_or(false)
        }
    })
    .await;

    let resp = post_json(
        format!("http://{addr}/api/v1/notifications/u2"),
        json!({ "type": "success", "message": "only the second tab" }),
    )
    .await;
    assert_eq!(resp["delivered"], true);

    match next_event(&mut second, Duration::from_secs(5)).await {
        Some(ServerEvent::Notification(n)) => assert_eq!(n.message, "only the second tab"),
        other => panic!("unexpected event on second socket: {other:?}"),
    }
    assert!(next_event(&mut first, Duration::from_millis(300)).await.is_none());

    // closing the displaced socket must not evict the live one
    first.close(None).await.unwrap();
    drop(first);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let status: Value = reqwest::get(format!("http://{addr}/api/v1/connections/u2"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["connected"], true);
    assert_eq!(state.registry.connected_users_count().await, 1);
}

#[actix_rt::test]
async fn dispatch_to_unknown_user_is_dropped() {
    let (addr, state) = start_server();

    let resp = post_json(
        format!("http://{addr}/api/v1/notifications/nobody"),
        json!({ "type": "error", "message": "lost" }),
    )
    .await;
    assert_eq!(resp["delivered"], false);
    assert_eq!(state.registry.connected_users_count().await, 0);

    let list: Value = reqwest::get(format!("http://{addr}/api/v1/connections"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["count"], 0);
}

#[actix_rt::test]
async fn empty_message_is_rejected() {
    let (addr, _state) = start_server();

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/api/v1/notifications/u3"))
        .json(&json!({ "type": "info", "message": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "bad request: message must not be empty");
}

#[actix_rt::test]
async fn silent_client_is_dropped_after_heartbeat_timeout() {
    let mut config = Config::test_defaults();
    config.ws_heartbeat_interval_secs = 1;
    config.ws_client_timeout_secs = 2;
    let (addr, state) = start_server_with(config);

    // never polled, so pings from the server go unanswered
    let (silent, _) =
        tokio_tungstenite::connect_async(format!("ws://{addr}/api/socket/ws?userId=silent"))
            .await
            .unwrap();

    // reads continuously, so tungstenite answers every ping
    let responsive = Subscriber::from_config(SubscriberConfig::new(format!("ws://{addr}"), "awake"));
    let task = responsive.spawn();

    let registry = state.registry.clone();
    wait_until(|| {
        let registry = registry.clone();
        async move { registry.is_connected("silent").await && registry.is_connected("awake").await }
    })
    .await;

    wait_until(|| {
        let registry = registry.clone();
        async move { !registry.is_connected("silent").await }
    })
    .await;

    assert!(registry.is_connected("awake").await);
    let resp = post_json(
        format!("http://{addr}/api/v1/notifications/silent"),
        json!({ "type": "info", "message": "nobody home" }),
    )
    .await;
    assert_eq!(resp["delivered"], false);

    drop(silent);
    task.shutdown().await.unwrap();
}
