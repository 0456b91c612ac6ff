//! Transport traits
//!
//! The connection manager talks to the network only through these two
//! traits, so tests can swap the WebSocket implementation for an in-memory
//! one.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::credentials::AuthCredentials;
use crate::error::ConnectionError;
use rl_protocol::{ClientEvent, ServerEvent};

/// Something pushed up from an open channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A decoded protocol event
    Message(ServerEvent),
    /// The channel failed; it should be considered unusable
    Error(String),
    /// The channel was closed by the remote side
    Closed(String),
}

/// Opens authenticated channels to the dispatch server
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the handshake and return the open channel.
    ///
    /// Everything the server sends afterwards is delivered, in order, to
    /// `events`. The transport must stop sending once the channel is closed.
    async fn open(
        &self,
        credentials: &AuthCredentials,
        events: mpsc::Sender<ChannelEvent>,
    ) -> Result<Box<dyn Channel>, ConnectionError>;
}

/// One open, authenticated channel
#[async_trait]
pub trait Channel: Send + Sync {
    /// Send an event to the server
    async fn emit(&self, event: &ClientEvent) -> Result<(), ConnectionError>;

    /// Close the channel gracefully
    async fn close(&self) -> Result<(), ConnectionError>;
}
