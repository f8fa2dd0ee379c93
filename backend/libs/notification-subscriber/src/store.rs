use async_trait::async_trait;
use notification_events::Notification;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{Result, SubscriberError};

/// Key an inbox is stored under
pub fn storage_key(user_id: &str) -> String {
    format!("notifications_{user_id}")
}

/// Local persistence for an inbox, keyed per user
#[async_trait]
pub trait InboxStore: Send + Sync {
    /// Missing keys load as an empty list
    async fn load(&self, key: &str) -> Result<Vec<Notification>>;

    async fn save(&self, key: &str, notifications: &[Notification]) -> Result<()>;
}

/// Process-local store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Vec<Notification>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InboxStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Vec<Notification>> {
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, key: &str, notifications: &[Notification]) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), notifications.to_vec());
        Ok(())
    }
}

/// One JSON file per key inside a directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Percent-encoded so distinct keys never share a file and no key can
    /// leave `dir`
    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", urlencoding::encode(key)))
    }
}

#[async_trait]
impl InboxStore for JsonFileStore {
    async fn load(&self, key: &str) -> Result<Vec<Notification>> {
        let path = self.path_for(key);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&raw).map_err(|e| {
            SubscriberError::Store(format!("corrupt inbox file {}: {e}", path.display()))
        })
    }

    async fn save(&self, key: &str, notifications: &[Notification]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec(notifications)?;

        // write-then-rename so readers never see a torn file
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}
