//! engine::traits
//!
//! The engine contract and the observer interfaces it reports through.
//!
//! # Design
//!
//! The engine performs every version-control algorithm and all I/O. The
//! coordination layer only ever reaches it through [`Engine`]. Local
//! operations (reset, checkout, merge) run on the caller's thread and
//! stream progress into a `&mut` observer. Network operations (clone,
//! fetch, push) run on a worker thread and report through a shared
//! [`RemoteObserver`], which must be `Send + Sync`.
//!
//! # Example
//!
//! ```ignore
//! use repoview::engine::{Engine, EngineError};
//!
//! fn stage_all(engine: &dyn Engine, paths: &[&str]) -> Result<(), EngineError> {
//!     for path in paths {
//!         engine.stage(path)?;
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use super::model::{
    CheckoutPerf, CommitRecord, Diff, PushUpdate, ReferenceInfo, Remote, Signature, StatusReport,
    TransferProgress,
};
use crate::core::types::{Oid, RefName, TypeError};
use crate::credentials::Credential;

/// Extra diagnostic attached to an engine failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail {
    /// Engine error class (libgit2 `klass`)
    pub class: i32,
    pub message: String,
}

/// A failure reported by the engine, surfaced verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (code {code})")]
pub struct EngineError {
    pub code: i32,
    pub detail: Option<ErrorDetail>,
    pub message: String,
}

impl EngineError {
    /// Generic failure.
    pub const GENERIC: i32 = -1;
    /// Requested object or reference does not exist.
    pub const NOT_FOUND: i32 = -3;
    /// Object or reference already exists.
    pub const EXISTS: i32 = -4;
    /// Operation aborted by a callback (cancellation).
    pub const USER: i32 = -7;
    /// Operation not valid in the current repository state.
    pub const INVALID: i32 = -12;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            detail: None,
            message: message.into(),
        }
    }

    pub fn with_detail(mut self, class: i32, message: impl Into<String>) -> Self {
        self.detail = Some(ErrorDetail {
            class,
            message: message.into(),
        });
        self
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(Self::GENERIC, message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Self::NOT_FOUND, message)
    }

    pub fn cancelled() -> Self {
        Self::new(Self::USER, "operation cancelled")
    }

    pub fn is_cancelled(&self) -> bool {
        self.code == Self::USER
    }
}

impl From<TypeError> for EngineError {
    fn from(err: TypeError) -> Self {
        Self::invalid(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Receives progress of a checkout (also used by reset).
pub trait CheckoutObserver {
    /// `completed` of `total` files checked out; `path` is the current file.
    fn on_checkout_progress(&mut self, path: Option<&str>, completed: usize, total: usize);

    /// Final filesystem counters. Marks the checkout finished.
    fn on_checkout_perf_data(&mut self, perf: CheckoutPerf);
}

/// Receives merge analysis followed by checkout progress.
pub trait MergeObserver: CheckoutObserver {
    /// Raw `git_merge_analysis_t` value, delivered before any checkout progress.
    fn set_merge_analysis_result(&mut self, raw: i32);
}

/// Receives progress of a network operation from the transport thread.
///
/// Implementations must not block: every call happens inside the engine's
/// transfer loop.
pub trait RemoteObserver: Send + Sync {
    /// Credential resolved for the remote endpoint, if any.
    fn credential(&self) -> Option<Credential>;

    /// The remote demanded authentication and no credential was resolved.
    fn must_supply_credential(&self);

    fn on_sideband_progress(&self, text: &str);

    fn on_transfer_progress(&self, progress: TransferProgress);

    fn on_pack_progress(&self, stage: i32, current: u32, total: u32);

    fn on_push_transfer_progress(&self, current: u32, total: u32, bytes: usize);

    fn on_update_tips(&self, refname: &str, old: Oid, new: Oid);

    fn on_push_negotiation(&self, updates: Vec<PushUpdate>);

    /// `status` is `None` when the remote accepted the update.
    fn on_push_update_reference(&self, refname: &str, status: Option<&str>);

    /// Secondary error raised inside a callback.
    fn on_error(&self, error: EngineError);

    /// Whether the caller asked to abort. Checked at each callback boundary.
    fn is_cancelled(&self) -> bool;
}

/// The engine collaborator.
///
/// One engine instance is bound to one on-disk location. Implementations
/// must be `Send + Sync`: network operations run on a worker thread while
/// the consumer keeps querying status.
pub trait Engine: Send + Sync {
    /// Open the repository at the bound location.
    fn open(&self) -> EngineResult<()>;

    /// Initialize a repository at the bound location.
    fn create(&self) -> EngineResult<()>;

    /// Whether a valid repository exists at the bound location.
    fn exists(&self) -> bool;

    fn status(&self) -> EngineResult<StatusReport>;

    /// Commit history, ordered by topology then time.
    fn log(&self) -> EngineResult<Vec<CommitRecord>>;

    /// All references, including `HEAD`.
    fn references(&self) -> EngineResult<Vec<ReferenceInfo>>;

    fn diff(&self, base: &Oid, target: &Oid) -> EngineResult<Diff>;

    fn remotes(&self) -> EngineResult<Vec<Remote>>;

    fn add_remote(&self, name: &str, url: &str) -> EngineResult<Remote>;

    fn remove_remote(&self, name: &str) -> EngineResult<()>;

    fn signature(&self) -> EngineResult<Option<Signature>>;

    fn set_signature(&self, name: &str, email: &str) -> EngineResult<()>;

    fn stage(&self, path: &str) -> EngineResult<()>;

    fn unstage(&self, path: &str) -> EngineResult<()>;

    /// Commit the index. Returns the new commit id.
    fn commit(&self, message: &str) -> EngineResult<Oid>;

    fn create_branch(&self, name: &str, from: &Oid) -> EngineResult<()>;

    /// Create a local branch tracking `remote_ref` unless one already exists.
    fn create_local_tracking_branch(&self, remote_ref: &RefName) -> EngineResult<()>;

    fn create_lightweight_tag(&self, name: &str, from: &Oid) -> EngineResult<()>;

    fn remove_reference(&self, reference: &RefName) -> EngineResult<()>;

    /// Hard reset the current branch to `commit`.
    fn reset(&self, commit: &Oid, progress: &mut dyn CheckoutObserver) -> EngineResult<()>;

    /// Check out a local branch.
    fn checkout(&self, reference: &RefName, progress: &mut dyn CheckoutObserver)
        -> EngineResult<()>;

    /// Merge into the working tree and index. Never commits.
    fn merge(&self, references: &[RefName], progress: &mut dyn MergeObserver) -> EngineResult<()>;

    /// Clone `url` into the bound location.
    fn clone_repository(&self, url: &str, progress: &dyn RemoteObserver) -> EngineResult<()>;

    /// Push all local branches.
    fn push(&self, remote: &Remote, force: bool, progress: &dyn RemoteObserver)
        -> EngineResult<()>;

    fn fetch(&self, remote: &Remote, progress: &dyn RemoteObserver) -> EngineResult<()>;
}
