//! engine
//!
//! The version-control engine contract.
//!
//! # Architecture
//!
//! The engine is an external collaborator: it owns object storage, diffing,
//! merging and the network protocol. This crate never implements those; it
//! calls the [`Engine`] trait and reacts to what comes back.
//!
//! - [`traits`] - `Engine`, the observer traits, `EngineError`
//! - [`model`] - Owned data passed across the boundary
//! - [`mock`] - Deterministic in-memory engine for tests
//!
//! The production implementation backed by libgit2 lives in
//! [`crate::git`].

pub mod mock;
pub mod model;
pub mod traits;

pub use model::{
    ChangeKind, CheckoutPerf, CommitRecord, Diff, DiffDelta, DiffHunk, DiffLine, MergeAnalysis,
    PushUpdate, ReferenceInfo, ReferenceKind, Remote, RepositoryState, Signature, StatusReport,
    TransferProgress,
};
pub use traits::{
    CheckoutObserver, Engine, EngineError, EngineResult, ErrorDetail, MergeObserver,
    RemoteObserver,
};
