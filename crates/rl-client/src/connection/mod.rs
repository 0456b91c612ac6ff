//! Channel lifecycle management

mod backoff;
mod manager;
mod websocket;

pub use backoff::ExponentialBackoff;
pub use manager::{ConnectionManager, HandlerId, MessageHandler};
pub use websocket::{socket_url, WebSocketChannel, WebSocketTransport};
