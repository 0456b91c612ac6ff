//! rl-core: Core abstractions and configuration for rider-link
//!
//! This crate provides the error taxonomy, credential stores, transport
//! traits and configuration structures shared by the client library and
//! the CLI.

pub mod config;
pub mod credentials;
pub mod error;
pub mod time;
pub mod traits;
pub mod types;

pub use credentials::{AuthCredentials, CredentialStore};
pub use error::{ConnectionError, OperationError, RlError};
pub use types::{ConnectionState, ConnectionStatus};
