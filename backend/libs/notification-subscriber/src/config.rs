use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::backoff::ReconnectPolicy;
use crate::error::{Result, SubscriberError};

/// Subscriber settings
///
/// `from_env` reads `SUBSCRIBER_*` variables, e.g. `SUBSCRIBER_SERVER_URL`,
/// `SUBSCRIBER_USER_ID`, `SUBSCRIBER_TOKEN`, `SUBSCRIBER_STORE_DIR`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriberConfig {
    /// Base WebSocket URL of the service, e.g. `ws://localhost:8000`
    pub server_url: String,
    pub user_id: String,
    #[serde(default)]
    pub token: Option<String>,
    /// Directory for the JSON inbox store; in-memory when unset
    #[serde(default)]
    pub store_dir: Option<PathBuf>,
    #[serde(default = "default_initial_delay_ms")]
    pub reconnect_initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    #[serde(default)]
    pub reconnect_max_attempts: Option<u32>,
    #[serde(default = "default_jitter")]
    pub reconnect_jitter: bool,
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_jitter() -> bool {
    true
}

impl SubscriberConfig {
    pub fn new(server_url: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            user_id: user_id.into(),
            token: None,
            store_dir: None,
            reconnect_initial_delay_ms: default_initial_delay_ms(),
            reconnect_max_delay_ms: default_max_delay_ms(),
            reconnect_max_attempts: None,
            reconnect_jitter: default_jitter(),
        }
    }

    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let cfg = envy::prefixed("SUBSCRIBER_").from_env::<SubscriberConfig>()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(SubscriberError::Config("user_id must not be empty".to_string()));
        }
        if !(self.server_url.starts_with("ws://") || self.server_url.starts_with("wss://")) {
            return Err(SubscriberError::Config(format!(
                "server_url must use ws:// or wss://, got {}",
                self.server_url
            )));
        }
        Ok(())
    }

    /// Full handshake URL carrying `userId` (and `token` when set)
    pub fn socket_url(&self) -> String {
        let mut url = format!(
            "{}/api/socket/ws?userId={}",
            self.server_url.trim_end_matches('/'),
            urlencoding::encode(&self.user_id)
        );
        if let Some(token) = &self.token {
            url.push_str("&token=");
            url.push_str(&urlencoding::encode(token));
        }
        url
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_backoff: Duration::from_millis(self.reconnect_initial_delay_ms),
            max_backoff: Duration::from_millis(self.reconnect_max_delay_ms),
            jitter: self.reconnect_jitter,
            max_attempts: self.reconnect_max_attempts,
            ..ReconnectPolicy::default()
        }
    }
}
