use thiserror::Error;

pub type Result<T> = std::result::Result<T, SubscriberError>;

#[derive(Debug, Error)]
pub enum SubscriberError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("inbox store error: {0}")]
    Store(String),

    #[error("gave up reconnecting after {0} attempts")]
    ReconnectExhausted(u32),

    #[error("subscriber task failed: {0}")]
    Task(String),
}

impl From<std::io::Error> for SubscriberError {
    fn from(e: std::io::Error) -> Self {
        SubscriberError::Store(e.to_string())
    }
}

impl From<envy::Error> for SubscriberError {
    fn from(e: envy::Error) -> Self {
        SubscriberError::Config(e.to_string())
    }
}
