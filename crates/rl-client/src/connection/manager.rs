//! Session connection manager
//!
//! Owns the lifecycle of one persistent channel to the dispatch server.
//!
//! # Lifecycle Generations
//!
//! Every handler is bound to the generation that was current when it was
//! registered, and every connection's event pump is bound to the generation
//! it was opened in. `disconnect()` removes all handlers and advances the
//! generation under a single write lock, before the channel is closed.
//! Dispatch checks the generation under the matching read lock, so anything
//! the transport delivers during or after teardown is dropped instead of
//! reaching shared state.
//!
//! # Reconnection
//!
//! There is no automatic retry. A failed handshake leaves the manager in
//! `Errored` with the error recorded; reconnecting is always an explicit
//! `connect()` or `reconnect()` by the caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use rl_core::config::ClientConfig;
use rl_core::traits::{Channel, ChannelEvent, Transport};
use rl_core::{
    AuthCredentials, ConnectionError, ConnectionState, ConnectionStatus, CredentialStore,
};
use rl_protocol::{ClientEvent, ServerEvent};

/// Default capacity of the inbound event queue
const DEFAULT_EVENT_BUFFER: usize = 256;

/// Default upper bound on the handshake
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Callback invoked for every protocol event of its generation.
///
/// Handlers run on the event pump while dispatch holds the registry lock;
/// they must not call back into the manager.
pub type MessageHandler = Box<dyn Fn(&ServerEvent) + Send + Sync>;

/// Identifies a registered handler and the generation it is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId {
    id: u64,
    generation: u64,
}

impl HandlerId {
    /// Generation this handler receives events for
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

struct Registration {
    id: HandlerId,
    handler: MessageHandler,
}

struct Registry {
    generation: u64,
    handlers: Vec<Registration>,
}

/// State shared between the manager and its event pumps
struct Dispatcher {
    registry: RwLock<Registry>,
    status: watch::Sender<ConnectionStatus>,
}

impl Dispatcher {
    fn new() -> Self {
        let (status, _) = watch::channel(ConnectionStatus::default());
        Self {
            registry: RwLock::new(Registry {
                generation: 0,
                handlers: Vec::new(),
            }),
            status,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver one channel event on behalf of `generation`.
    ///
    /// Returns false if that generation is no longer current.
    fn deliver(&self, generation: u64, event: ChannelEvent) -> bool {
        let registry = self.read();
        if registry.generation != generation {
            tracing::debug!(
                generation,
                current = registry.generation,
                "Dropping event from a torn-down connection"
            );
            return false;
        }

        match event {
            ChannelEvent::Message(message) => {
                tracing::debug!(event = message.name(), generation, "Dispatching event");
                for registration in registry
                    .handlers
                    .iter()
                    .filter(|r| r.id.generation == generation)
                {
                    (registration.handler)(&message);
                }
            }
            ChannelEvent::Error(message) => {
                tracing::warn!(generation, "Channel error: {}", message);
                self.status.send_modify(|status| {
                    status.state = ConnectionState::Errored;
                    status.error = Some(message);
                });
            }
            ChannelEvent::Closed(reason) => {
                tracing::info!(generation, "Channel closed: {}", reason);
                // An earlier channel error stays visible
                self.status.send_if_modified(|status| {
                    if status.state != ConnectionState::Connected {
                        return false;
                    }
                    status.state = ConnectionState::Disconnected;
                    true
                });
            }
        }

        true
    }
}

/// An open channel plus the task pumping its events
struct ActiveLink {
    channel: Box<dyn Channel>,
    shutdown: CancellationToken,
    pump: JoinHandle<()>,
}

impl ActiveLink {
    async fn teardown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.channel.close().await {
            tracing::debug!("Channel close failed: {}", e);
        }
        if let Err(e) = self.pump.await {
            if e.is_panic() {
                tracing::warn!("Event pump panicked: {}", e);
            }
        }
    }
}

/// Owns one persistent channel to the dispatch server
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    dispatcher: Arc<Dispatcher>,
    link: Mutex<Option<ActiveLink>>,
    next_handler_id: AtomicU64,
    connect_timeout: Duration,
    event_buffer: usize,
}

impl ConnectionManager {
    /// Create a manager with default timeouts
    pub fn new(transport: Arc<dyn Transport>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            transport,
            credentials,
            dispatcher: Arc::new(Dispatcher::new()),
            link: Mutex::new(None),
            next_handler_id: AtomicU64::new(1),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    /// Create a manager using the timeouts from `config`
    pub fn with_config(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self::new(transport, credentials)
            .with_connect_timeout(config.connect_timeout)
            .with_event_buffer(config.event_buffer)
    }

    /// Override the handshake timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Override the inbound queue capacity
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    /// Snapshot of the connection status
    pub fn status(&self) -> ConnectionStatus {
        self.dispatcher.status.borrow().clone()
    }

    /// Watch the connection status
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.dispatcher.status.subscribe()
    }

    /// Whether the channel is open
    pub fn is_connected(&self) -> bool {
        self.dispatcher.status.borrow().is_connected()
    }

    /// Current lifecycle generation
    pub fn generation(&self) -> u64 {
        self.dispatcher.read().generation
    }

    /// Number of handlers bound to the current generation
    pub fn handler_count(&self) -> usize {
        let registry = self.dispatcher.read();
        registry
            .handlers
            .iter()
            .filter(|r| r.id.generation == registry.generation)
            .count()
    }

    /// Register a handler for protocol events.
    ///
    /// The handler is bound to the current generation and is removed by the
    /// next `disconnect()`.
    pub fn on_message<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        let mut registry = self.dispatcher.write();
        let id = HandlerId {
            id: self.next_handler_id.fetch_add(1, Ordering::Relaxed),
            generation: registry.generation,
        };
        registry.handlers.push(Registration {
            id,
            handler: Box::new(handler),
        });
        tracing::trace!(generation = id.generation, "Handler registered");
        id
    }

    /// Remove a handler. Returns false if it was already gone.
    pub fn remove_handler(&self, id: HandlerId) -> bool {
        let mut registry = self.dispatcher.write();
        let before = registry.handlers.len();
        registry.handlers.retain(|r| r.id != id);
        registry.handlers.len() != before
    }

    /// Connect using credentials read from the credential store
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        let credentials = self.credentials.load().await;
        self.connect_with(credentials).await
    }

    /// Connect with explicit credentials.
    ///
    /// Absent or blank credentials are a silent no-op that only marks the
    /// attempt as made. Calling this while connected or connecting does
    /// nothing.
    pub async fn connect_with(
        &self,
        credentials: Option<AuthCredentials>,
    ) -> Result<(), ConnectionError> {
        let credentials = match credentials {
            Some(credentials) if !credentials.is_empty() => credentials,
            _ => {
                tracing::debug!("No credentials available, skipping connect");
                self.dispatcher.status.send_if_modified(|status| {
                    let changed = !status.connection_attempted;
                    status.connection_attempted = true;
                    changed
                });
                return Ok(());
            }
        };

        let claimed = self
            .dispatcher
            .status
            .send_if_modified(|status| match status.state {
                ConnectionState::Disconnected | ConnectionState::Errored => {
                    status.state = ConnectionState::Connecting;
                    status.error = None;
                    true
                }
                ConnectionState::Connecting | ConnectionState::Connected => false,
            });
        if !claimed {
            tracing::debug!("Already connected or connecting");
            return Ok(());
        }

        let mut link = self.link.lock().await;

        // Left behind by a server-side close
        if let Some(stale) = link.take() {
            stale.teardown().await;
        }

        let generation = self.generation();
        let (events_tx, events_rx) = mpsc::channel(self.event_buffer);

        tracing::debug!(generation, user_id = %credentials.user_id, "Connecting");
        let opened = match tokio::time::timeout(
            self.connect_timeout,
            self.transport.open(&credentials, events_tx),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::Timeout(self.connect_timeout.as_secs())),
        };

        let channel = match opened {
            Ok(channel) => channel,
            Err(e) => {
                tracing::warn!(generation, "Connection failed: {}", e);
                let registry = self.dispatcher.read();
                if registry.generation == generation {
                    self.dispatcher.status.send_modify(|status| {
                        status.state = ConnectionState::Errored;
                        status.error = Some(e.to_string());
                        status.connection_attempted = true;
                    });
                }
                return Err(e);
            }
        };

        let still_current = {
            let registry = self.dispatcher.read();
            let current = registry.generation == generation;
            if current {
                self.dispatcher.status.send_modify(|status| {
                    status.state = ConnectionState::Connected;
                    status.error = None;
                    status.connection_attempted = true;
                });
            }
            current
        };

        if !still_current {
            tracing::debug!(generation, "Disconnected during handshake, closing new channel");
            let _ = channel.close().await;
            return Err(ConnectionError::Aborted);
        }

        let shutdown = CancellationToken::new();
        let pump = tokio::spawn(pump_events(
            Arc::clone(&self.dispatcher),
            generation,
            events_rx,
            shutdown.clone(),
        ));

        *link = Some(ActiveLink {
            channel,
            shutdown,
            pump,
        });

        tracing::info!(generation, "Connected to dispatch server");
        Ok(())
    }

    /// Close the channel.
    ///
    /// All handlers are removed and the generation advanced before the
    /// channel is closed, so nothing delivered during teardown is
    /// dispatched.
    pub async fn disconnect(&self) {
        let generation = {
            let mut registry = self.dispatcher.write();
            let removed = registry.handlers.len();
            registry.handlers.clear();
            registry.generation += 1;
            self.dispatcher.status.send_if_modified(|status| {
                let changed =
                    status.state != ConnectionState::Disconnected || status.error.is_some();
                status.state = ConnectionState::Disconnected;
                status.error = None;
                changed
            });
            tracing::debug!(removed, generation = registry.generation, "Handlers removed");
            registry.generation
        };

        let link = self.link.lock().await.take();
        if let Some(link) = link {
            link.teardown().await;
            tracing::info!(generation, "Disconnected from dispatch server");
        }
    }

    /// Explicit reconnect: `disconnect()` followed by `connect()`.
    ///
    /// The disconnect half removes every handler; callers that dispatch
    /// through this manager must register again before relying on events.
    pub async fn reconnect(&self) -> Result<(), ConnectionError> {
        self.disconnect().await;
        self.connect().await
    }

    /// Send an event to the server
    pub async fn emit(&self, event: &ClientEvent) -> Result<(), ConnectionError> {
        if !self.is_connected() {
            return Err(ConnectionError::NotConnected);
        }

        let link = self.link.lock().await;
        let active = link.as_ref().ok_or(ConnectionError::NotConnected)?;

        tracing::debug!(
            event = event.name(),
            delivery_id = %event.delivery_id(),
            "Emitting event"
        );
        active.channel.emit(event).await
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(link) = self.link.get_mut().take() {
            link.shutdown.cancel();
            link.pump.abort();
        }
    }
}

/// Forward events from one connection until it is torn down
async fn pump_events(
    dispatcher: Arc<Dispatcher>,
    generation: u64,
    mut events: mpsc::Receiver<ChannelEvent>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            event = events.recv() => {
                let Some(event) = event else {
                    dispatcher.deliver(
                        generation,
                        ChannelEvent::Closed("transport went away".to_string()),
                    );
                    break;
                };
                let closed = matches!(event, ChannelEvent::Closed(_));
                if !dispatcher.deliver(generation, event) || closed {
                    break;
                }
            }
        }
    }
    tracing::trace!(generation, "Event pump stopped");
}
