//! progress::remote
//!
//! Progress aggregation for network operations (clone, fetch, push).
//!
//! # Threading
//!
//! The engine runs a network operation on a worker thread and reports
//! through a [`RemoteProgressSink`]. The sink never touches
//! [`RemoteOperationState`]: it sends each callback over an unbounded
//! channel, tagged with the operation's generation. The coordinator applies
//! events only when the consumer drains the channel, so every mutation of
//! the observable state happens on the consumer's thread.
//!
//! # Invariants
//!
//! - At most one operation is in flight; a second start is rejected.
//! - Events tagged with a superseded generation are dropped.
//! - Completion is delivered exactly once per operation: the sink is
//!   consumed by [`RemoteProgressSink::finish`]. A sink dropped without
//!   finishing (the job panicked) completes the operation with an error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::core::types::Oid;
use crate::credentials::Credential;
use crate::engine::{EngineError, EngineResult, PushUpdate, RemoteObserver, TransferProgress};

use super::error_slot::{ErrorSlot, OperationError};

/// Completion error for a job that ended without reporting a result.
pub const ABORTED_MESSAGE: &str = "network operation aborted";

/// Message shown when push negotiation finds nothing to update.
pub const UP_TO_DATE_MESSAGE: &str = "Already up-to-date.";

/// Errors starting a network operation.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("a {0} operation is already in progress")]
    OperationInProgress(RemoteOperationKind),

    #[error("no remote named '{0}'")]
    UnknownRemote(String),

    /// Resolving the remote failed before anything was dispatched.
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("worker runtime unavailable: {0}")]
    Runtime(String),
}

/// Which network operation is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOperationKind {
    Clone,
    Fetch,
    Push,
}

impl RemoteOperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clone => "clone",
            Self::Fetch => "fetch",
            Self::Push => "push",
        }
    }
}

impl std::fmt::Display for RemoteOperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote-tracking tip the fetch moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTip {
    pub refname: String,
    pub old: Oid,
    pub new: Oid,
}

/// Outcome of one pushed reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushRefResult {
    pub refname: String,
    /// Rejection reason; `None` means accepted
    pub status: Option<String>,
}

impl PushRefResult {
    pub fn is_accepted(&self) -> bool {
        self.status.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushTransfer {
    pub current: u32,
    pub total: u32,
    pub bytes: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackProgress {
    pub stage: i32,
    pub current: u32,
    pub total: u32,
}

/// Observable state of the current (or last) network operation.
///
/// Reset at the start of every operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteOperationState {
    pub label: String,
    pub kind: Option<RemoteOperationKind>,
    pub in_progress: bool,
    /// Last sideband line or informational message
    pub message: Option<String>,
    pub transfer: TransferProgress,
    pub fetch_transfer_in_progress: bool,
    pub push_transfer: PushTransfer,
    pub push_transfer_in_progress: bool,
    pub pack: PackProgress,
    pub packing_in_progress: bool,
    /// Updates agreed during push negotiation
    pub push_updates: Vec<PushUpdate>,
    pub tip_updates: Vec<UpdateTip>,
    pub push_results: Vec<PushRefResult>,
}

/// Terminal result of a network operation, handed to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCompletion {
    pub kind: RemoteOperationKind,
    pub result: Result<(), EngineError>,
}

#[derive(Debug)]
enum RemoteEvent {
    CredentialRequired,
    Sideband(String),
    Transfer(TransferProgress),
    Pack(PackProgress),
    PushTransfer(PushTransfer),
    UpdateTip(UpdateTip),
    PushNegotiation(Vec<PushUpdate>),
    PushUpdateReference(PushRefResult),
    Error(EngineError),
    Completed(Result<(), EngineError>),
}

#[derive(Debug)]
struct Envelope {
    generation: u64,
    event: RemoteEvent,
}

/// Worker-side observer for one network operation.
///
/// Every callback is forwarded to the consumer; nothing is applied here.
#[derive(Debug)]
pub struct RemoteProgressSink {
    generation: u64,
    tx: UnboundedSender<Envelope>,
    credential: Option<Credential>,
    cancelled: Arc<AtomicBool>,
    finished: bool,
}

impl RemoteProgressSink {
    fn send(&self, event: RemoteEvent) {
        // The coordinator owns the receiver; a closed channel means the
        // repository handle is gone and nobody is left to observe.
        let _ = self.tx.send(Envelope {
            generation: self.generation,
            event,
        });
    }

    /// Deliver the terminal result. Consumes the sink.
    pub fn finish(mut self, result: EngineResult<()>) {
        self.send(RemoteEvent::Completed(result));
        self.finished = true;
    }
}

impl Drop for RemoteProgressSink {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(generation = self.generation, "network job ended without a result");
            self.send(RemoteEvent::Completed(Err(EngineError::generic(ABORTED_MESSAGE))));
        }
    }
}

impl RemoteObserver for RemoteProgressSink {
    fn credential(&self) -> Option<Credential> {
        self.credential.clone()
    }

    fn must_supply_credential(&self) {
        self.send(RemoteEvent::CredentialRequired);
    }

    fn on_sideband_progress(&self, text: &str) {
        self.send(RemoteEvent::Sideband(text.to_string()));
    }

    fn on_transfer_progress(&self, progress: TransferProgress) {
        self.send(RemoteEvent::Transfer(progress));
    }

    fn on_pack_progress(&self, stage: i32, current: u32, total: u32) {
        self.send(RemoteEvent::Pack(PackProgress {
            stage,
            current,
            total,
        }));
    }

    fn on_push_transfer_progress(&self, current: u32, total: u32, bytes: usize) {
        self.send(RemoteEvent::PushTransfer(PushTransfer {
            current,
            total,
            bytes,
        }));
    }

    fn on_update_tips(&self, refname: &str, old: Oid, new: Oid) {
        self.send(RemoteEvent::UpdateTip(UpdateTip {
            refname: refname.to_string(),
            old,
            new,
        }));
    }

    fn on_push_negotiation(&self, updates: Vec<PushUpdate>) {
        self.send(RemoteEvent::PushNegotiation(updates));
    }

    fn on_push_update_reference(&self, refname: &str, status: Option<&str>) {
        self.send(RemoteEvent::PushUpdateReference(PushRefResult {
            refname: refname.to_string(),
            status: status.map(str::to_string),
        }));
    }

    fn on_error(&self, error: EngineError) {
        self.send(RemoteEvent::Error(error));
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Consumer-side aggregation of network operation progress.
#[derive(Debug)]
pub struct RemoteOperationCoordinator {
    state: RemoteOperationState,
    errors: ErrorSlot,
    generation: u64,
    tx: UnboundedSender<Envelope>,
    rx: UnboundedReceiver<Envelope>,
    cancelled: Arc<AtomicBool>,
}

impl Default for RemoteOperationCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteOperationCoordinator {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            state: RemoteOperationState::default(),
            errors: ErrorSlot::new(),
            generation: 0,
            tx,
            rx,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Reset state and error slot and hand out the sink for a new operation.
    ///
    /// # Errors
    ///
    /// `RemoteError::OperationInProgress` while another operation runs.
    pub fn clear_state(
        &mut self,
        kind: RemoteOperationKind,
        label: impl Into<String>,
        credential: Option<Credential>,
    ) -> Result<RemoteProgressSink, RemoteError> {
        if self.state.in_progress {
            let running = self.state.kind.unwrap_or(kind);
            return Err(RemoteError::OperationInProgress(running));
        }

        self.generation += 1;
        self.cancelled = Arc::new(AtomicBool::new(false));
        self.errors.clear();
        self.state = RemoteOperationState {
            label: label.into(),
            kind: Some(kind),
            in_progress: true,
            ..RemoteOperationState::default()
        };
        tracing::debug!(
            %kind,
            generation = self.generation,
            has_credential = credential.is_some(),
            "remote operation started"
        );

        Ok(RemoteProgressSink {
            generation: self.generation,
            tx: self.tx.clone(),
            credential,
            cancelled: Arc::clone(&self.cancelled),
            finished: false,
        })
    }

    /// Ask the running operation to abort at its next callback boundary.
    pub fn cancel(&self) {
        if self.state.in_progress {
            self.cancelled.store(true, Ordering::Relaxed);
            tracing::info!(label = %self.state.label, "remote operation cancellation requested");
        }
    }

    pub fn state(&self) -> &RemoteOperationState {
        &self.state
    }

    pub fn errors(&self) -> &ErrorSlot {
        &self.errors
    }

    pub fn is_in_progress(&self) -> bool {
        self.state.in_progress
    }

    /// Apply every queued event without blocking.
    ///
    /// Returns the completion if the running operation finished.
    pub fn process_events(&mut self) -> Option<RemoteCompletion> {
        let mut completion = None;
        while let Ok(envelope) = self.rx.try_recv() {
            if let Some(done) = self.apply(envelope) {
                completion = Some(done);
            }
        }
        completion
    }

    /// Block the current thread until the running operation completes.
    ///
    /// Returns `None` immediately when nothing is in flight. Must not be
    /// called from within an async context; use [`Self::wait`] there.
    pub fn wait_blocking(&mut self) -> Option<RemoteCompletion> {
        // Drain whatever is already queued first
        if let Some(done) = self.process_events() {
            return Some(done);
        }
        while self.state.in_progress {
            let envelope = self.rx.blocking_recv()?;
            if let Some(done) = self.apply(envelope) {
                return Some(done);
            }
        }
        None
    }

    /// Wait asynchronously until the running operation completes.
    pub async fn wait(&mut self) -> Option<RemoteCompletion> {
        if let Some(done) = self.process_events() {
            return Some(done);
        }
        while self.state.in_progress {
            let envelope = self.rx.recv().await?;
            if let Some(done) = self.apply(envelope) {
                return Some(done);
            }
        }
        None
    }

    fn apply(&mut self, envelope: Envelope) -> Option<RemoteCompletion> {
        if envelope.generation != self.generation {
            tracing::debug!(
                stale = envelope.generation,
                current = self.generation,
                "dropping event from superseded operation"
            );
            return None;
        }

        let state = &mut self.state;
        match envelope.event {
            RemoteEvent::CredentialRequired => {
                tracing::warn!(label = %state.label, "remote requires a credential");
                self.errors.report(OperationError::CredentialRequired);
            }
            RemoteEvent::Sideband(text) => {
                state.message = Some(format!("Remote: {}", text.trim_end()));
            }
            RemoteEvent::Transfer(progress) => {
                state.transfer = progress;
                state.fetch_transfer_in_progress = true;
            }
            RemoteEvent::Pack(pack) => {
                state.pack = pack;
                state.packing_in_progress = true;
            }
            RemoteEvent::PushTransfer(transfer) => {
                state.push_transfer = transfer;
                state.push_transfer_in_progress = true;
            }
            RemoteEvent::UpdateTip(tip) => {
                tracing::debug!(refname = %tip.refname, new = %tip.new.short(7), "tip updated");
                state.tip_updates.push(tip);
            }
            RemoteEvent::PushNegotiation(updates) => {
                if updates.is_empty() {
                    state.message = Some(UP_TO_DATE_MESSAGE.to_string());
                }
                state.push_updates = updates;
            }
            RemoteEvent::PushUpdateReference(result) => {
                if let Some(reason) = &result.status {
                    tracing::warn!(refname = %result.refname, reason = %reason, "push rejected");
                }
                state.push_results.push(result);
            }
            RemoteEvent::Error(error) => {
                self.errors.report(error.into());
            }
            RemoteEvent::Completed(result) => {
                if !state.in_progress {
                    return None;
                }
                state.in_progress = false;
                let kind = state.kind?;
                match &result {
                    Ok(()) => tracing::info!(%kind, label = %state.label, "remote operation completed"),
                    Err(error) => {
                        tracing::info!(%kind, error = %error, "remote operation failed");
                        self.errors.report(error.clone().into());
                    }
                }
                return Some(RemoteCompletion { kind, result });
            }
        }
        None
    }
}
