//! Core trait definitions

mod transport;

pub use transport::{Channel, ChannelEvent, Transport};
