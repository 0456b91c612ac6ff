//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the dispatch channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No channel is open
    #[default]
    Disconnected,
    /// Handshake in progress
    Connecting,
    /// Channel is open and authenticated
    Connected,
    /// Last handshake or the open channel failed
    Errored,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Errored => write!(f, "errored"),
        }
    }
}

/// Observable snapshot of the connection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    /// Current lifecycle state
    pub state: ConnectionState,
    /// Last recorded connection error, cleared by the next attempt
    pub error: Option<String>,
    /// Set once any connect attempt has finished, including the silent
    /// no-op when no credentials are available
    pub connection_attempted: bool,
}

impl ConnectionStatus {
    /// Whether the channel is usable
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}
