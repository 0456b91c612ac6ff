//! rl-client: Delivery search client for rider-link
//!
//! Two layers sit on top of the wire protocol:
//!
//! - [`ConnectionManager`] owns one persistent channel to the dispatch
//!   server: connect, authenticate, disconnect, and an observable status.
//!   It never reconnects on its own.
//! - [`DeliverySearchCoordinator`] turns one "create and search" request into
//!   a terminal outcome by mirroring the events the server pushes back.

pub mod connection;
pub mod search;

pub use connection::{ConnectionManager, ExponentialBackoff, HandlerId, WebSocketTransport};
pub use search::{DeliverySearchCoordinator, SearchSession, SearchStatus, SearchView};
