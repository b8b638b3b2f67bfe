//! Credential persistence.
//!
//! `CredentialStore` is the only shared mutable state in the client. It is
//! passed explicitly to the `TokenManager`; nothing reads it ambiently.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use thiserror::Error;
use tracing::debug;

use super::SessionData;

/// Session file name in cache directory
pub const SESSION_FILE: &str = "session.json";

/// Keychain service name
const KEYRING_SERVICE: &str = "papertime";

/// Keychain account under which the serialized session is stored
const KEYRING_ACCOUNT: &str = "session";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access session file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse stored session: {0}")]
    Format(#[from] serde_json::Error),

    #[error("Failed to access keychain: {0}")]
    Keyring(#[from] keyring::Error),
}

pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Result<Option<SessionData>, StoreError>;

    /// Replace the stored session as a whole.
    fn set(&self, data: &SessionData) -> Result<(), StoreError>;

    /// Remove every stored credential. Clearing an empty store is not an error.
    fn clear(&self) -> Result<(), StoreError>;
}

/// Process-local store; nothing survives a restart.
#[derive(Default)]
pub struct MemoryCredentialStore {
    data: RwLock<Option<SessionData>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(data: SessionData) -> Self {
        Self {
            data: RwLock::new(Some(data)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Result<Option<SessionData>, StoreError> {
        Ok(self
            .data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn set(&self, data: &SessionData) -> Result<(), StoreError> {
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = Some(data.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Session persisted as JSON in the cache directory.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            path: cache_dir.join(SESSION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Result<Option<SessionData>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn set(&self, data: &SessionData) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Write then rename so a crash never leaves half a credential pair.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(data)?)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = ?self.path, "session saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Session stored as a single OS keychain secret.
pub struct KeyringCredentialStore {
    service: String,
}

impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, StoreError> {
        Ok(keyring::Entry::new(&self.service, KEYRING_ACCOUNT)?)
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn get(&self) -> Result<Option<SessionData>, StoreError> {
        match self.entry()?.get_password() {
            Ok(secret) => Ok(Some(serde_json::from_str(&secret)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, data: &SessionData) -> Result<(), StoreError> {
        self.entry()?.set_password(&serde_json::to_string(data)?)?;
        debug!("session saved to keychain");
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
