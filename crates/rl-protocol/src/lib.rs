//! rl-protocol: Wire protocol for the rider-link delivery search channel
//!
//! This crate defines the closed set of named events exchanged with the
//! dispatch backend, their payload shapes, and the Socket.IO text framing
//! they travel in.

pub mod delivery;
pub mod error;
pub mod event;
pub mod packet;

pub use delivery::{Delivery, DeliveryId, Location};
pub use error::ProtocolError;
pub use event::{ClientEvent, ServerEvent};
pub use packet::{EnginePacket, HandshakeInfo, SocketPacket, DEFAULT_NAMESPACE};
