//! Core error types for rider-link
//!
//! Three families matter to callers:
//!
//! - [`ConnectionError`]: the channel could not be opened or broke. Recorded
//!   in the observable connection status, never fatal.
//! - [`OperationError`]: the caller asked for something the current state
//!   does not allow (search while offline, cancel with nothing running).
//!   Returned synchronously, with no state change.
//! - Server-side search rejections are not Rust errors at all; they land in
//!   the search session as an `Errored` status carrying the server message.

use rl_protocol::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the rider-link crates
#[derive(Error, Debug)]
pub enum RlError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Operation rejected
    #[error("Operation error: {0}")]
    Operation(#[from] OperationError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handshake and transport failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Could not reach the server or the upgrade failed
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    /// Server refused the bearer token
    #[error("Authentication rejected: {0}")]
    AuthRejected(String),

    /// Handshake did not finish in time
    #[error("Connection timed out after {0}s")]
    Timeout(u64),

    /// Established channel failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// No channel is open
    #[error("Not connected")]
    NotConnected,

    /// A disconnect raced the handshake and won
    #[error("Connection attempt aborted by disconnect")]
    Aborted,
}

/// Operations rejected at the call site
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// The channel is not connected
    #[error("Not connected to the dispatch server")]
    NotConnected,

    /// Cancel requested with no search in progress
    #[error("No delivery search in progress")]
    NoActiveSearch,

    /// A search is already running; cancel it or wait for its outcome
    #[error("A delivery search is already in progress")]
    SearchInProgress,

    /// The request was valid but the channel failed to deliver it
    #[error("Failed to send request: {0}")]
    Emit(ConnectionError),
}

impl From<ConnectionError> for OperationError {
    fn from(error: ConnectionError) -> Self {
        match error {
            ConnectionError::NotConnected => OperationError::NotConnected,
            other => OperationError::Emit(other),
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}
