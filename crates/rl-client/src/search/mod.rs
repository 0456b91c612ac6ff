//! Delivery search state machine and coordinator

mod coordinator;
mod session;

pub use coordinator::{DeliverySearchCoordinator, SearchView};
pub use session::{SearchSession, SearchStatus};
