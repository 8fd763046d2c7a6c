//! progress
//!
//! Progress tracking and error capture for long-running operations.
//!
//! - [`local`] - synchronous reset/checkout/merge progress and merge analysis
//! - [`remote`] - clone/fetch/push progress marshalled from a worker thread
//! - [`error_slot`] - first-failure-wins error capture per operation

pub mod error_slot;
pub mod local;
pub mod remote;

pub use error_slot::{ErrorSlot, OperationError};
pub use local::{LocalOperationCoordinator, LocalOperationState};
pub use remote::{
    PackProgress, PushRefResult, PushTransfer, RemoteCompletion, RemoteError,
    RemoteOperationCoordinator, RemoteOperationKind, RemoteOperationState, RemoteProgressSink,
    UpdateTip, ABORTED_MESSAGE, UP_TO_DATE_MESSAGE,
};
