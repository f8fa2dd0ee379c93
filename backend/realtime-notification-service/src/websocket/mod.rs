/// Real-time delivery over WebSocket
///
/// 1. ConnectionRegistry: user id -> live connection handle
/// 2. NotificationDispatcher: typed, best-effort sends through the registry
/// 3. WsSession: actor that owns one socket and drains its handle's channel
pub mod dispatcher;
pub mod registry;
pub mod session;

pub use dispatcher::NotificationDispatcher;
pub use registry::{ConnectionHandle, ConnectionId, ConnectionRegistry};
pub use session::WsSession;
