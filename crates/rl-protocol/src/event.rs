//! Named events of the delivery search protocol
//!
//! Every message on the channel is a Socket.IO event: a name plus one JSON
//! payload. This module is the only place that knows the names and payload
//! shapes; everything above it works with the closed enums below.
//!
//! # Event Flow
//!
//! Typical sequence for one search:
//!
//! 1. Client emits `delivery:create_and_search`
//! 2. Server emits `delivery:searching` zero or more times with the number of
//!    nearby couriers (informational, not monotonic)
//! 3. Server emits exactly one terminal event: `delivery:assigned`,
//!    `delivery:no_persons_available`, `delivery:auto_cancelled`,
//!    `delivery:cancelled` or `delivery:search_error`
//!
//! The client may emit `delivery:cancel_search` at any point while searching,
//! and `delivery:track` for a delivery that is already underway.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::delivery::{Delivery, DeliveryId, Location};
use crate::error::ProtocolError;

pub const CREATE_AND_SEARCH: &str = "delivery:create_and_search";
pub const CANCEL_SEARCH: &str = "delivery:cancel_search";
pub const TRACK: &str = "delivery:track";

pub const SEARCHING: &str = "delivery:searching";
pub const ASSIGNED: &str = "delivery:assigned";
pub const NO_PERSONS_AVAILABLE: &str = "delivery:no_persons_available";
pub const AUTO_CANCELLED: &str = "delivery:auto_cancelled";
pub const CANCELLED: &str = "delivery:cancelled";
pub const SEARCH_ERROR: &str = "delivery:search_error";

/// Events emitted by the client
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Create the delivery server-side and start looking for a courier
    CreateAndSearch {
        delivery: Delivery,
        pickup_location: Location,
    },

    /// Abandon the running search
    CancelSearch { delivery_id: DeliveryId },

    /// Subscribe to live updates for a delivery
    Track { delivery_id: DeliveryId },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateAndSearchPayload<'a> {
    delivery: &'a Delivery,
    pickup_location: &'a Location,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeliveryIdPayload<'a> {
    delivery_id: &'a DeliveryId,
}

impl ClientEvent {
    /// Wire name of this event
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::CreateAndSearch { .. } => CREATE_AND_SEARCH,
            ClientEvent::CancelSearch { .. } => CANCEL_SEARCH,
            ClientEvent::Track { .. } => TRACK,
        }
    }

    /// JSON payload of this event
    pub fn payload(&self) -> Result<Value, ProtocolError> {
        let value = match self {
            ClientEvent::CreateAndSearch {
                delivery,
                pickup_location,
            } => serde_json::to_value(CreateAndSearchPayload {
                delivery,
                pickup_location,
            })?,
            ClientEvent::CancelSearch { delivery_id } | ClientEvent::Track { delivery_id } => {
                serde_json::to_value(DeliveryIdPayload { delivery_id })?
            }
        };
        Ok(value)
    }

    /// Delivery this event refers to
    pub fn delivery_id(&self) -> &DeliveryId {
        match self {
            ClientEvent::CreateAndSearch { delivery, .. } => &delivery.id,
            ClientEvent::CancelSearch { delivery_id } | ClientEvent::Track { delivery_id } => {
                delivery_id
            }
        }
    }
}

/// Events pushed by the server
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Search is running; `nearby_count` couriers are currently in range
    Searching { nearby_count: u32 },

    /// A courier accepted the delivery
    Assigned { delivery: Delivery },

    /// Nobody could take the delivery
    NoPersonsAvailable,

    /// The server gave up waiting
    AutoCancelled,

    /// The search was cancelled, by either party
    Cancelled,

    /// The server rejected the search
    SearchError { message: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchingPayload {
    nearby_count: u32,
}

#[derive(Deserialize)]
struct AssignedPayload {
    delivery: Delivery,
}

#[derive(Deserialize)]
struct SearchErrorPayload {
    #[serde(default)]
    message: Option<String>,
}

impl ServerEvent {
    /// Decode an event from its wire name and (optional) payload.
    ///
    /// Events without a meaningful payload accept `{}`, `null`, or no
    /// argument at all.
    pub fn decode(name: &str, data: Option<Value>) -> Result<Self, ProtocolError> {
        let data = data.unwrap_or(Value::Null);
        let event = match name {
            SEARCHING => {
                let payload: SearchingPayload = parse(name, data)?;
                ServerEvent::Searching {
                    nearby_count: payload.nearby_count,
                }
            }
            ASSIGNED => {
                let payload: AssignedPayload = parse(name, data)?;
                ServerEvent::Assigned {
                    delivery: payload.delivery,
                }
            }
            NO_PERSONS_AVAILABLE => ServerEvent::NoPersonsAvailable,
            AUTO_CANCELLED => ServerEvent::AutoCancelled,
            CANCELLED => ServerEvent::Cancelled,
            SEARCH_ERROR => {
                let payload: SearchErrorPayload = if data.is_null() {
                    SearchErrorPayload { message: None }
                } else {
                    parse(name, data)?
                };
                ServerEvent::SearchError {
                    message: payload
                        .message
                        .unwrap_or_else(|| "Search failed".to_string()),
                }
            }
            other => return Err(ProtocolError::UnknownEvent(other.to_string())),
        };
        Ok(event)
    }

    /// Wire name of this event
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Searching { .. } => SEARCHING,
            ServerEvent::Assigned { .. } => ASSIGNED,
            ServerEvent::NoPersonsAvailable => NO_PERSONS_AVAILABLE,
            ServerEvent::AutoCancelled => AUTO_CANCELLED,
            ServerEvent::Cancelled => CANCELLED,
            ServerEvent::SearchError { .. } => SEARCH_ERROR,
        }
    }

    /// Whether this event ends the active search session
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ServerEvent::Searching { .. })
    }
}

fn parse<T: serde::de::DeserializeOwned>(event: &str, data: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|source| ProtocolError::InvalidPayload {
        event: event.to_string(),
        source,
    })
}
