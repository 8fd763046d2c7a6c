//! credentials::memory_store
//!
//! In-memory credential persistence for tests and ephemeral sessions.

use std::sync::{Arc, Mutex};

use super::traits::{CredentialError, CredentialPersistence};
use super::Credential;

/// Keeps the "persisted" collection in memory.
///
/// Clones share state, so a test can hold one handle while the store owns
/// another and observe every save.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    saved: Vec<Credential>,
    corrupt: bool,
    fail_saves: bool,
    save_count: usize,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an already persisted collection.
    pub fn with_credentials(credentials: Vec<Credential>) -> Self {
        let store = Self::new();
        store.lock().saved = credentials;
        store
    }

    /// Make every subsequent `load` fail as if the data were malformed.
    pub fn set_corrupt(&self, corrupt: bool) {
        self.lock().corrupt = corrupt;
    }

    /// Make every subsequent `save` fail.
    pub fn set_fail_saves(&self, fail: bool) {
        self.lock().fail_saves = fail;
    }

    /// The last successfully saved collection.
    pub fn saved(&self) -> Vec<Credential> {
        self.lock().saved.clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.lock().save_count
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        // A poisoned lock only means another test thread panicked mid-update
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CredentialPersistence for MemoryCredentialStore {
    fn load(&self) -> Result<Vec<Credential>, CredentialError> {
        let inner = self.lock();
        if inner.corrupt {
            return Err(CredentialError::Read("malformed credential data".into()));
        }
        Ok(inner.saved.clone())
    }

    fn save(&self, credentials: &[Credential]) -> Result<(), CredentialError> {
        let mut inner = self.lock();
        if inner.fail_saves {
            return Err(CredentialError::Persist("save disabled".into()));
        }
        inner.saved = credentials.to_vec();
        inner.save_count += 1;
        Ok(())
    }
}
