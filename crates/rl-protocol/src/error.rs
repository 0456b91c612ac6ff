//! Protocol error types

use thiserror::Error;

/// Errors that can occur while framing or decoding protocol messages
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Frame was empty or structurally malformed
    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    /// Unknown Engine.IO or Socket.IO packet type
    #[error("Unknown packet type: {0}")]
    UnknownPacketType(char),

    /// Event name is not part of the delivery protocol
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    /// Payload did not match the expected shape
    #[error("Invalid payload for {event}: {source}")]
    InvalidPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    /// Packet kind the client does not speak (binary attachments)
    #[error("Unsupported packet: {0}")]
    Unsupported(&'static str),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
