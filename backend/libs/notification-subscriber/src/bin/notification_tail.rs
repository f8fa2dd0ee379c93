//! Connects as one user and logs inbox changes until Ctrl-C.
use anyhow::Context;
use notification_subscriber::{Subscriber, SubscriberConfig};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,notification_subscriber=debug"));
    fmt().with_env_filter(env_filter).with_target(false).init();

    let config = SubscriberConfig::from_env().context("loading SUBSCRIBER_* configuration")?;
    let subscriber = Subscriber::from_config(config);

    let restored = subscriber.load().await.context("loading stored inbox")?;
    tracing::info!(user_id = %subscriber.user_id(), restored, "inbox restored");

    let mut inbox_rx = subscriber.watch_inbox();
    let mut state_rx = subscriber.watch_state();
    let task = subscriber.spawn();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = inbox_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = inbox_rx.borrow_and_update().clone();
                if let Some(latest) = snapshot.notifications.first() {
                    tracing::info!(
                        unread = snapshot.unread_count,
                        total = snapshot.notifications.len(),
                        kind = latest.notification_type.as_str(),
                        message = %latest.message,
                        "inbox updated"
                    );
                }
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *state_rx.borrow_and_update();
                tracing::info!(?state, "connection state");
            }
        }
    }

    task.shutdown().await.context("stopping subscriber")?;
    Ok(())
}
