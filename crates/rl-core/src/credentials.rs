//! Credential sources for the channel handshake
//!
//! Credentials come from an external secure store and are read once per
//! connect attempt. A missing token is not an error: the UI may be rendered
//! before the user has signed in, so every store reports absence as `None`
//! and the connection manager turns that into a silent no-op.
//!
//! # Security Model
//!
//! - Tokens are never cached by the client beyond a single connect attempt
//! - The credentials file is written with mode 0600 on Unix
//! - The token is presented once, at handshake; messages are not signed

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Environment variable holding the bearer token
pub const TOKEN_ENV: &str = "RIDER_LINK_TOKEN";

/// Environment variable holding the user id
pub const USER_ID_ENV: &str = "RIDER_LINK_USER_ID";

/// Credentials file name inside the config directory
pub const CREDENTIALS_FILENAME: &str = "credentials.json";

/// Bearer token plus the user it belongs to
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCredentials {
    pub token: String,
    pub user_id: String,
}

impl AuthCredentials {
    /// Create a new credential pair
    pub fn new(token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            user_id: user_id.into(),
        }
    }

    /// A blank token is treated the same as no credentials at all
    pub fn is_empty(&self) -> bool {
        self.token.trim().is_empty()
    }
}

impl std::fmt::Debug for AuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCredentials")
            .field("token", &"<redacted>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Source of handshake credentials
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read the current credentials, or `None` if the user is signed out
    async fn load(&self) -> Option<AuthCredentials>;
}

/// Fixed credentials, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials(Option<AuthCredentials>);

impl StaticCredentials {
    /// Always return these credentials
    pub fn new(credentials: AuthCredentials) -> Self {
        Self(Some(credentials))
    }

    /// Never return credentials
    pub fn none() -> Self {
        Self(None)
    }
}

#[async_trait]
impl CredentialStore for StaticCredentials {
    async fn load(&self) -> Option<AuthCredentials> {
        self.0.clone()
    }
}

/// Credentials from `RIDER_LINK_TOKEN` / `RIDER_LINK_USER_ID`
#[derive(Debug, Clone, Default)]
pub struct EnvCredentialStore;

#[async_trait]
impl CredentialStore for EnvCredentialStore {
    async fn load(&self) -> Option<AuthCredentials> {
        let token = std::env::var(TOKEN_ENV).ok().filter(|t| !t.trim().is_empty())?;
        let user_id = std::env::var(USER_ID_ENV).unwrap_or_default();
        Some(AuthCredentials::new(token, user_id))
    }
}

/// Credentials persisted as JSON in the config directory
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Store backed by the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location
    pub fn default_location() -> Self {
        Self::new(crate::config::default_config_dir().join(CREDENTIALS_FILENAME))
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file.
    ///
    /// Returns `Ok(None)` if the file doesn't exist or doesn't parse.
    pub fn read(&self) -> io::Result<Option<AuthCredentials>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => match serde_json::from_str::<AuthCredentials>(&contents) {
                Ok(credentials) => Ok(Some(credentials)),
                Err(e) => {
                    tracing::debug!(path = %self.path.display(), "Credentials file is not valid JSON: {}", e);
                    Ok(None)
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write credentials to the file.
    ///
    /// Creates the parent directory if needed. On Unix the file is created
    /// owner-only (0600) before any secret is written to it.
    pub fn save(&self, credentials: &AuthCredentials) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(credentials)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&self.path)?;

        // mode() only applies on create; tighten a file left by an older write
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }

        file.write_all(json.as_bytes())?;
        file.sync_all()
    }

    /// Delete the file; a missing file is not an error
    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Option<AuthCredentials> {
        match self.read() {
            Ok(credentials) => credentials,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Failed to read credentials: {}", e);
                None
            }
        }
    }
}

/// Tries each store in order and returns the first non-blank credentials
pub struct ChainedCredentialStore {
    stores: Vec<Box<dyn CredentialStore>>,
}

impl ChainedCredentialStore {
    /// Chain the given stores
    pub fn new(stores: Vec<Box<dyn CredentialStore>>) -> Self {
        Self { stores }
    }
}

#[async_trait]
impl CredentialStore for ChainedCredentialStore {
    async fn load(&self) -> Option<AuthCredentials> {
        for store in &self.stores {
            match store.load().await {
                Some(credentials) if !credentials.is_empty() => return Some(credentials),
                _ => continue,
            }
        }
        None
    }
}
