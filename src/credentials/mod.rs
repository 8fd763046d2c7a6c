//! credentials
//!
//! Credential storage and lookup for remote endpoints.
//!
//! # Architecture
//!
//! [`CredentialStore`] holds the ordered collection in memory and applies
//! the lookup policy. Persistence goes through the
//! [`CredentialPersistence`] trait:
//!
//! - [`FileCredentialStore`]: JSON file, atomic rewrite, 0600 (default)
//! - [`MemoryCredentialStore`]: in-memory, for tests and ephemeral use
//!
//! # Lookup policy
//!
//! The first credential in insertion order whose target URL is a prefix of
//! the remote URL wins. No match is not an error; the network operation
//! then reports that a credential is required if the remote asks for one.
//!
//! # Example
//!
//! ```
//! use repoview::credentials::{Credential, CredentialStore};
//!
//! let mut store = CredentialStore::in_memory();
//! store
//!     .add_or_update(None, Credential::ssh("deploy", "git@example.com:", "pub", "priv"))
//!     .unwrap();
//!
//! let cred = store.lookup("git@example.com:team/repo.git").unwrap();
//! assert_eq!(cred.id, "deploy");
//! ```

mod credential;
mod file_store;
mod memory_store;
mod store;
mod traits;

pub use credential::{Credential, CredentialKind, Secret};
pub use file_store::FileCredentialStore;
pub use memory_store::MemoryCredentialStore;
pub use store::CredentialStore;
pub use traits::{CredentialError, CredentialPersistence, ValidationError};
