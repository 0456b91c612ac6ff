//! Client wiring shared by the network commands

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use rl_client::{ConnectionManager, DeliverySearchCoordinator, ExponentialBackoff, WebSocketTransport};
use rl_core::config::{self, ClientConfig};
use rl_core::credentials::{
    ChainedCredentialStore, CredentialStore, EnvCredentialStore, FileCredentialStore,
};
use rl_core::AuthCredentials;

use crate::output::print_warning;

/// Resolved configuration plus the credentials location
pub struct ClientContext {
    pub config: ClientConfig,
    pub credentials_path: PathBuf,
}

impl ClientContext {
    /// Load the config file (defaults if absent) and apply CLI overrides
    pub fn load(
        config_path: Option<&PathBuf>,
        credentials_path: Option<&PathBuf>,
        server: Option<&str>,
    ) -> Result<Self> {
        let path = config_path
            .cloned()
            .unwrap_or_else(config::default_config_path);

        let mut config = config::load_or_default(&path)
            .with_context(|| format!("Failed to load config: {:?}", path))?;
        if let Some(server) = server {
            config.server_url = server.to_string();
        }

        let credentials_path = credentials_path
            .cloned()
            .unwrap_or_else(|| config.credentials_path.clone());

        Ok(Self {
            config,
            credentials_path,
        })
    }

    /// The credentials file for this context
    pub fn credentials_file(&self) -> FileCredentialStore {
        FileCredentialStore::new(self.credentials_path.clone())
    }

    /// Environment first, then the credentials file
    pub fn credential_store(&self) -> ChainedCredentialStore {
        ChainedCredentialStore::new(vec![
            Box::new(EnvCredentialStore),
            Box::new(self.credentials_file()),
        ])
    }

    /// Credentials that a connect would use right now
    pub async fn current_credentials(&self) -> Option<AuthCredentials> {
        self.credential_store()
            .load()
            .await
            .filter(|credentials| !credentials.is_empty())
    }

    /// A coordinator over a WebSocket connection to the configured server
    pub fn coordinator(&self) -> DeliverySearchCoordinator {
        let manager = ConnectionManager::with_config(
            &self.config,
            Arc::new(WebSocketTransport::from_config(&self.config)),
            Arc::new(self.credential_store()),
        );
        DeliverySearchCoordinator::new(Arc::new(manager))
    }
}

/// Connect, retrying up to `retries` more times with backoff.
///
/// Fails straight away when there are no credentials.
pub async fn connect_with_retries(
    coordinator: &DeliverySearchCoordinator,
    context: &ClientContext,
    retries: u32,
) -> Result<()> {
    let mut backoff = ExponentialBackoff::from_config(&context.config.backoff);
    let mut attempt = 0;

    loop {
        tracing::debug!(server = %context.config.server_url, attempt, "Connecting");
        if coordinator.connect().await {
            tracing::info!(server = %context.config.server_url, "Connected");
            return Ok(());
        }

        let status = coordinator.manager().status();
        let Some(error) = status.error else {
            anyhow::bail!("Not signed in. Run 'rider-link login' first");
        };

        if attempt >= retries {
            anyhow::bail!(
                "Could not connect to {}: {}",
                context.config.server_url,
                error
            );
        }

        attempt += 1;
        let delay = backoff.next_delay();
        print_warning(&format!(
            "Connection failed ({}), retrying in {:.1}s ({}/{})",
            error,
            delay.as_secs_f64(),
            attempt,
            retries
        ));
        tokio::time::sleep(delay).await;
    }
}
