//! Delivery search session state machine
//!
//! Pure state: no I/O, no clocks. The coordinator feeds it local actions
//! and server events and publishes whatever it ends up as.
//!
//! ```text
//!            begin              searching(n)
//!   Idle ───────────▶ Searching ◀──────────┐
//!                        │ │ │ └───────────┘
//!          assigned ◀────┘ │ └────▶ no_persons_available / auto_cancelled
//!                          ▼        / search_error / cancelled
//!                      Cancelled ──(late assigned, same id)──▶ Assigned
//! ```
//!
//! Every terminal state accepts `begin` again.

use rl_protocol::{Delivery, DeliveryId, ServerEvent};
use serde::Serialize;
use std::fmt;

/// Where a search stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    /// No search has been started
    #[default]
    Idle,
    /// Waiting for a courier
    Searching,
    /// A courier accepted the delivery
    Assigned,
    /// The server found nobody to take it
    NoRidersAvailable,
    /// Cancelled by the user (or confirmed cancelled by the server)
    Cancelled,
    /// The server gave up waiting
    AutoCancelled,
    /// The search could not be run
    Errored,
}

impl SearchStatus {
    /// Whether the search has finished
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SearchStatus::Idle | SearchStatus::Searching)
    }
}

impl fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SearchStatus::Idle => "idle",
            SearchStatus::Searching => "searching",
            SearchStatus::Assigned => "assigned",
            SearchStatus::NoRidersAvailable => "no riders available",
            SearchStatus::Cancelled => "cancelled",
            SearchStatus::AutoCancelled => "auto-cancelled",
            SearchStatus::Errored => "errored",
        };
        f.write_str(label)
    }
}

/// State of the single live delivery search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchSession {
    delivery_id: Option<DeliveryId>,
    status: SearchStatus,
    nearby_count: u32,
    assigned_delivery: Option<Delivery>,
    started_at: Option<u64>,
    error: Option<String>,
    // Cancelled here, not yet confirmed by the server
    pending_cancel: Option<DeliveryId>,
}

impl SearchSession {
    /// Delivery being searched for; set only while `Searching`
    pub fn delivery_id(&self) -> Option<&DeliveryId> {
        self.delivery_id.as_ref()
    }

    pub fn status(&self) -> SearchStatus {
        self.status
    }

    pub fn is_searching(&self) -> bool {
        self.status == SearchStatus::Searching
    }

    /// Couriers in range, as last reported
    pub fn nearby_count(&self) -> u32 {
        self.nearby_count
    }

    /// The accepted delivery, once assigned
    pub fn assigned_delivery(&self) -> Option<&Delivery> {
        self.assigned_delivery.as_ref()
    }

    /// Milliseconds since the Unix epoch when the search began
    pub fn started_at(&self) -> Option<u64> {
        self.started_at
    }

    /// Server-reported or emit failure message
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Start a new search, discarding whatever the previous one left
    pub fn begin(&mut self, delivery_id: DeliveryId, now_millis: u64) {
        *self = SearchSession {
            delivery_id: Some(delivery_id),
            status: SearchStatus::Searching,
            started_at: Some(now_millis),
            ..SearchSession::default()
        };
    }

    /// Optimistically cancel the running search.
    ///
    /// Returns the id to send to the server, or `None` if nothing is running.
    pub fn cancel_locally(&mut self) -> Option<DeliveryId> {
        if !self.is_searching() {
            return None;
        }
        let delivery_id = self.delivery_id.take()?;
        self.status = SearchStatus::Cancelled;
        self.pending_cancel = Some(delivery_id.clone());
        Some(delivery_id)
    }

    /// Record that the request for `delivery_id` never reached the server.
    ///
    /// Returns true if the session changed.
    pub fn fail(&mut self, delivery_id: &DeliveryId, message: impl Into<String>) -> bool {
        if self.delivery_id.as_ref() != Some(delivery_id) {
            return false;
        }
        self.error = Some(message.into());
        self.finish(SearchStatus::Errored);
        true
    }

    /// Apply a server event. Returns true if anything observable changed.
    pub fn apply(&mut self, event: &ServerEvent) -> bool {
        match (self.status, event) {
            (SearchStatus::Searching, ServerEvent::Searching { nearby_count }) => {
                if self.nearby_count == *nearby_count {
                    return false;
                }
                self.nearby_count = *nearby_count;
                true
            }
            (SearchStatus::Searching, ServerEvent::Assigned { delivery }) => {
                // The server may have stored the delivery under its own id
                if self.delivery_id.as_ref() != Some(&delivery.id) {
                    tracing::info!(
                        requested = ?self.delivery_id,
                        assigned = %delivery.id,
                        "Server assigned the delivery under a different id"
                    );
                }
                self.assigned_delivery = Some(delivery.clone());
                self.finish(SearchStatus::Assigned);
                true
            }
            (SearchStatus::Cancelled, ServerEvent::Assigned { delivery })
                if self.pending_cancel.as_ref() == Some(&delivery.id) =>
            {
                tracing::info!(
                    delivery_id = %delivery.id,
                    "Assignment arrived after local cancel, server wins"
                );
                self.pending_cancel = None;
                self.assigned_delivery = Some(delivery.clone());
                self.status = SearchStatus::Assigned;
                true
            }
            (SearchStatus::Cancelled, ServerEvent::Cancelled) if self.pending_cancel.is_some() => {
                self.pending_cancel = None;
                false
            }
            (SearchStatus::Searching, ServerEvent::NoPersonsAvailable) => {
                self.finish(SearchStatus::NoRidersAvailable);
                true
            }
            (SearchStatus::Searching, ServerEvent::AutoCancelled) => {
                self.finish(SearchStatus::AutoCancelled);
                true
            }
            (SearchStatus::Searching, ServerEvent::Cancelled) => {
                self.finish(SearchStatus::Cancelled);
                true
            }
            (SearchStatus::Searching, ServerEvent::SearchError { message }) => {
                self.error = Some(message.clone());
                self.finish(SearchStatus::Errored);
                true
            }
            (status, event) => {
                tracing::debug!(%status, event = event.name(), "Ignoring event outside an active search");
                false
            }
        }
    }

    fn finish(&mut self, status: SearchStatus) {
        self.status = status;
        self.delivery_id = None;
        self.pending_cancel = None;
    }
}
