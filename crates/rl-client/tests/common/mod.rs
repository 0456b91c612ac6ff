//! Shared test fixtures: an in-memory transport the tests can drive

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use rl_client::{ConnectionManager, DeliverySearchCoordinator, SearchSession};
use rl_core::credentials::StaticCredentials;
use rl_core::traits::{Channel, ChannelEvent, Transport};
use rl_core::{AuthCredentials, ConnectionError, ConnectionStatus};
use rl_protocol::{ClientEvent, ServerEvent};

#[derive(Default)]
struct Shared {
    emitted: Mutex<Vec<ClientEvent>>,
    events: Mutex<Option<mpsc::Sender<ChannelEvent>>>,
    failure: Mutex<Option<ConnectionError>>,
    handshake_delay: Mutex<Option<Duration>>,
    fail_emits: AtomicBool,
    opens: AtomicUsize,
    closes: AtomicUsize,
}

/// Transport that records what is emitted and lets the test play the server
#[derive(Clone, Default)]
pub struct FakeTransport {
    shared: Arc<Shared>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every handshake fails with `error`
    pub fn failing(error: ConnectionError) -> Self {
        let transport = Self::new();
        transport.set_failure(Some(error));
        transport
    }

    pub fn set_failure(&self, error: Option<ConnectionError>) {
        *self.shared.failure.lock().unwrap() = error;
    }

    pub fn set_handshake_delay(&self, delay: Duration) {
        *self.shared.handshake_delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_emits(&self, fail: bool) {
        self.shared.fail_emits.store(fail, Ordering::SeqCst);
    }

    pub fn opens(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    pub fn emitted(&self) -> Vec<ClientEvent> {
        self.shared.emitted.lock().unwrap().clone()
    }

    /// Push a server event down the most recently opened channel.
    ///
    /// The sender outlives `close()`, so this also works after a disconnect.
    pub async fn push(&self, event: ServerEvent) {
        self.push_raw(ChannelEvent::Message(event)).await;
    }

    /// Drop the events sender, as a transport does when its I/O task exits
    pub fn drop_events(&self) {
        self.shared.events.lock().unwrap().take();
    }

    pub async fn push_raw(&self, event: ChannelEvent) {
        let sender = self.shared.events.lock().unwrap().clone();
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn open(
        &self,
        _credentials: &AuthCredentials,
        events: mpsc::Sender<ChannelEvent>,
    ) -> Result<Box<dyn Channel>, ConnectionError> {
        self.shared.opens.fetch_add(1, Ordering::SeqCst);

        let delay = *self.shared.handshake_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.shared.failure.lock().unwrap().clone();
        if let Some(error) = failure {
            return Err(error);
        }

        *self.shared.events.lock().unwrap() = Some(events);
        Ok(Box::new(FakeChannel {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct FakeChannel {
    shared: Arc<Shared>,
}

#[async_trait]
impl Channel for FakeChannel {
    async fn emit(&self, event: &ClientEvent) -> Result<(), ConnectionError> {
        if self.shared.fail_emits.load(Ordering::SeqCst) {
            return Err(ConnectionError::Transport("broken pipe".to_string()));
        }
        self.shared.emitted.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn credentials() -> StaticCredentials {
    StaticCredentials::new(AuthCredentials::new("test-token", "user-1"))
}

pub fn manager(transport: &FakeTransport, credentials: StaticCredentials) -> Arc<ConnectionManager> {
    Arc::new(ConnectionManager::new(
        Arc::new(transport.clone()),
        Arc::new(credentials),
    ))
}

/// Coordinator over a fake transport with valid credentials
pub fn coordinator() -> (FakeTransport, DeliverySearchCoordinator) {
    let transport = FakeTransport::new();
    let coordinator = DeliverySearchCoordinator::new(manager(&transport, credentials()));
    (transport, coordinator)
}

/// Let spawned tasks drain whatever is queued
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

pub async fn wait_for_session<F>(rx: &mut watch::Receiver<SearchSession>, condition: F) -> SearchSession
where
    F: FnMut(&SearchSession) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(condition))
        .await
        .expect("Timed out waiting for search session")
        .expect("Session channel closed")
        .clone()
}

pub async fn wait_for_connection<F>(
    rx: &mut watch::Receiver<ConnectionStatus>,
    condition: F,
) -> ConnectionStatus
where
    F: FnMut(&ConnectionStatus) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(condition))
        .await
        .expect("Timed out waiting for connection status")
        .expect("Status channel closed")
        .clone()
}
