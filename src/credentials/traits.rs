//! credentials::traits
//!
//! Persistence contract for the credential collection.
//!
//! # Design
//!
//! The store keeps the collection in memory and hands the *whole*
//! collection to the backend on every mutation. Backends therefore never
//! merge or patch: a save replaces everything, and must do so atomically.
//!
//! # Security
//!
//! Implementations MUST:
//! - Never log, print, or include secrets in error messages
//! - Be thread-safe (Send + Sync)

use thiserror::Error;

use super::Credential;

/// Rejected credential mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("the credential id must not be empty")]
    EmptyId,

    #[error("a credential with id '{0}' already exists")]
    DuplicateId(String),

    #[error("no credential with id '{0}' to replace")]
    UnknownId(String),
}

/// Errors from credential operations.
///
/// Note: messages never include secret values.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Reading or parsing the persisted collection failed.
    #[error("failed to read credentials: {0}")]
    Read(String),

    /// Writing the collection failed; the in-memory change was rolled back.
    #[error("failed to persist credentials: {0}")]
    Persist(String),
}

/// Durable storage for the full credential collection.
pub trait CredentialPersistence: Send + Sync {
    /// Load every stored credential, in stored order.
    ///
    /// A store that was never written loads as empty.
    fn load(&self) -> Result<Vec<Credential>, CredentialError>;

    /// Replace the stored collection with `credentials`.
    fn save(&self, credentials: &[Credential]) -> Result<(), CredentialError>;
}
