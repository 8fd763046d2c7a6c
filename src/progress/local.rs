//! progress::local
//!
//! Staged progress and merge analysis for local operations (reset,
//! checkout, merge).
//!
//! Local operations are synchronous: the engine calls back on the caller's
//! thread, so the coordinator is mutated directly through `&mut`.
//!
//! # Lifecycle
//!
//! ```text
//! idle --clear_state--> in progress --on_checkout_perf_data--> complete
//!                                   \--complete (no perf data)--/
//! ```

use crate::engine::{CheckoutObserver, CheckoutPerf, MergeAnalysis, MergeObserver};

use super::error_slot::ErrorSlot;

/// Observable state of the current (or last) local operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalOperationState {
    /// Human-readable operation label, e.g. "Checking out main"
    pub label: String,
    pub is_merge: bool,
    pub merge_analysis: MergeAnalysis,
    pub in_progress: bool,
    pub current_path: Option<String>,
    pub completed_steps: usize,
    pub total_steps: usize,
    pub perf: CheckoutPerf,
}

impl LocalOperationState {
    /// Completed fraction in `0.0..=1.0`; zero when the total is unknown.
    pub fn fraction(&self) -> f64 {
        if self.total_steps == 0 {
            0.0
        } else {
            self.completed_steps as f64 / self.total_steps as f64
        }
    }
}

/// Receives engine callbacks for one local operation at a time.
#[derive(Debug, Default)]
pub struct LocalOperationCoordinator {
    state: LocalOperationState,
    errors: ErrorSlot,
}

impl LocalOperationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset state and error slot for a new operation.
    pub fn clear_state(&mut self, label: impl Into<String>, is_merge: bool) {
        self.state = LocalOperationState {
            label: label.into(),
            is_merge,
            in_progress: true,
            ..LocalOperationState::default()
        };
        self.errors.clear();
        tracing::debug!(label = %self.state.label, is_merge, "local operation started");
    }

    /// Mark the operation finished when the engine returned without perf data.
    pub fn complete(&mut self) {
        if self.state.in_progress {
            self.state.in_progress = false;
            tracing::debug!(label = %self.state.label, "local operation completed without perf data");
        }
    }

    pub fn state(&self) -> &LocalOperationState {
        &self.state
    }

    pub fn errors(&self) -> &ErrorSlot {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut ErrorSlot {
        &mut self.errors
    }
}

impl CheckoutObserver for LocalOperationCoordinator {
    fn on_checkout_progress(&mut self, path: Option<&str>, completed: usize, total: usize) {
        self.state.current_path = path.map(str::to_string);
        self.state.completed_steps = completed;
        self.state.total_steps = total;
        tracing::trace!(completed, total, path = path.unwrap_or_default(), "checkout progress");
    }

    fn on_checkout_perf_data(&mut self, perf: CheckoutPerf) {
        self.state.perf = perf;
        self.state.in_progress = false;
        tracing::debug!(
            label = %self.state.label,
            mkdir = perf.mkdir_calls,
            stat = perf.stat_calls,
            chmod = perf.chmod_calls,
            "checkout finished"
        );
    }
}

impl MergeObserver for LocalOperationCoordinator {
    fn set_merge_analysis_result(&mut self, raw: i32) {
        match MergeAnalysis::from_raw(raw) {
            Some(analysis) => {
                self.state.merge_analysis = analysis;
                tracing::debug!(?analysis, "merge analysis");
            }
            None => tracing::warn!(
                raw,
                kept = ?self.state.merge_analysis,
                "unrecognized merge analysis value"
            ),
        }
    }
}
