use std::sync::Arc;

use crate::{
    config::Config,
    websocket::{ConnectionRegistry, NotificationDispatcher},
};

#[derive(Clone)]
pub struct AppState {
    pub registry: ConnectionRegistry,
    pub dispatcher: NotificationDispatcher,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let registry = ConnectionRegistry::new();
        Self {
            dispatcher: NotificationDispatcher::new(registry.clone()),
            registry,
            config: Arc::new(config),
        }
    }
}
