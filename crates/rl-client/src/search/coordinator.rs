//! Delivery search coordinator
//!
//! Binds a [`SearchSession`] to a [`ConnectionManager`]: local requests are
//! validated and emitted, and the server's pushed events are folded into
//! the session. Both the session and the connection status are observable
//! through watch channels.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::watch;

use rl_core::time::current_time_millis;
use rl_core::{ConnectionStatus, OperationError};
use rl_protocol::{ClientEvent, Delivery, DeliveryId, Location};

use super::session::{SearchSession, SearchStatus};
use crate::connection::{ConnectionManager, HandlerId};

/// Combined snapshot for a UI layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchView {
    pub connected: bool,
    pub searching: bool,
    pub status: SearchStatus,
    pub delivery_id: Option<DeliveryId>,
    pub assigned_delivery: Option<Delivery>,
    pub nearby_count: u32,
    /// Search error if there is one, otherwise the connection error
    pub error: Option<String>,
    pub connection_attempted: bool,
}

impl SearchView {
    fn compose(connection: &ConnectionStatus, session: &SearchSession) -> Self {
        Self {
            connected: connection.is_connected(),
            searching: session.is_searching(),
            status: session.status(),
            delivery_id: session.delivery_id().cloned(),
            assigned_delivery: session.assigned_delivery().cloned(),
            nearby_count: session.nearby_count(),
            error: session
                .error()
                .map(str::to_string)
                .or_else(|| connection.error.clone()),
            connection_attempted: connection.connection_attempted,
        }
    }
}

/// Drives one delivery search at a time over a shared connection
pub struct DeliverySearchCoordinator {
    manager: Arc<ConnectionManager>,
    session: Arc<watch::Sender<SearchSession>>,
    registration: Mutex<Option<HandlerId>>,
}

impl DeliverySearchCoordinator {
    /// Create a coordinator and register its event handler
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        let (session, _) = watch::channel(SearchSession::default());
        let coordinator = Self {
            manager,
            session: Arc::new(session),
            registration: Mutex::new(None),
        };
        coordinator.attach();
        coordinator
    }

    /// The underlying connection manager
    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// Make sure the session handler is registered for the current
    /// connection generation
    fn attach(&self) {
        let mut registration = self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let generation = self.manager.generation();
        if registration.map(|id| id.generation()) == Some(generation) {
            return;
        }

        let session = Arc::clone(&self.session);
        let id = self.manager.on_message(move |event| {
            session.send_if_modified(|session| session.apply(event));
        });
        tracing::trace!(generation = id.generation(), "Search handler attached");
        *registration = Some(id);
    }

    /// Connect with stored credentials. Returns whether the channel is open.
    ///
    /// Failures are recorded in the connection status, not returned.
    pub async fn connect(&self) -> bool {
        self.attach();
        if let Err(e) = self.manager.connect().await {
            tracing::debug!("Connect failed: {}", e);
        }
        self.manager.is_connected()
    }

    /// Tear down and connect again
    pub async fn reconnect(&self) -> bool {
        self.manager.disconnect().await;
        self.connect().await
    }

    /// Close the channel. The search session itself is left as it was.
    pub async fn disconnect(&self) {
        self.manager.disconnect().await;
    }

    /// Create `delivery` on the server and start looking for a courier
    pub async fn create_delivery_and_search(
        &self,
        delivery: Delivery,
        pickup_location: Location,
    ) -> Result<(), OperationError> {
        if !self.manager.is_connected() {
            tracing::warn!(delivery_id = %delivery.id, "Cannot search while disconnected");
            return Err(OperationError::NotConnected);
        }

        let delivery_id = delivery.id.clone();
        let mut started = false;
        self.session.send_if_modified(|session| {
            if session.is_searching() {
                return false;
            }
            session.begin(delivery_id.clone(), current_time_millis());
            started = true;
            true
        });
        if !started {
            return Err(OperationError::SearchInProgress);
        }

        tracing::info!(delivery_id = %delivery_id, "Starting delivery search");
        let event = ClientEvent::CreateAndSearch {
            delivery,
            pickup_location,
        };
        if let Err(e) = self.manager.emit(&event).await {
            tracing::warn!(delivery_id = %delivery_id, "Failed to start search: {}", e);
            let message = e.to_string();
            self.session
                .send_if_modified(|session| session.fail(&delivery_id, message));
            return Err(e.into());
        }
        Ok(())
    }

    /// Cancel the running search.
    ///
    /// The session moves to `Cancelled` immediately; the server's reply is
    /// not awaited. Returns the cancelled delivery id.
    pub async fn cancel_delivery_search(&self) -> Result<DeliveryId, OperationError> {
        let mut cancelled = None;
        self.session.send_if_modified(|session| {
            cancelled = session.cancel_locally();
            cancelled.is_some()
        });
        let Some(delivery_id) = cancelled else {
            tracing::debug!("Cancel requested with no search running");
            return Err(OperationError::NoActiveSearch);
        };

        tracing::info!(delivery_id = %delivery_id, "Cancelling delivery search");
        self.manager
            .emit(&ClientEvent::CancelSearch {
                delivery_id: delivery_id.clone(),
            })
            .await?;
        Ok(delivery_id)
    }

    /// Ask the server for live updates on `delivery_id`
    pub async fn track_delivery(&self, delivery_id: DeliveryId) -> Result<(), OperationError> {
        tracing::debug!(delivery_id = %delivery_id, "Tracking delivery");
        self.manager
            .emit(&ClientEvent::Track { delivery_id })
            .await?;
        Ok(())
    }

    /// Current search session
    pub fn session(&self) -> SearchSession {
        self.session.borrow().clone()
    }

    /// Watch the search session
    pub fn subscribe(&self) -> watch::Receiver<SearchSession> {
        self.session.subscribe()
    }

    /// Watch the connection status
    pub fn connection(&self) -> watch::Receiver<ConnectionStatus> {
        self.manager.subscribe()
    }

    /// Combined connection and search snapshot
    pub fn view(&self) -> SearchView {
        SearchView::compose(&self.manager.status(), &self.session.borrow())
    }
}

impl Drop for DeliverySearchCoordinator {
    fn drop(&mut self) {
        let registration = self
            .registration
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(id) = registration {
            self.manager.remove_handler(id);
        }
    }
}
