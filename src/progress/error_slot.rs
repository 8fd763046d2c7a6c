//! progress::error_slot
//!
//! First-failure-wins error capture for one operation window.
//!
//! A cascade of secondary engine errors must not obscure the root cause, so
//! the first report after `clear()` is kept and later reports are only
//! logged.

use thiserror::Error;

use crate::engine::{EngineError, ErrorDetail};

/// Error recorded for an in-flight operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    /// The remote demanded authentication and no credential matched.
    #[error("Credential is required!")]
    CredentialRequired,

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl OperationError {
    pub fn code(&self) -> i32 {
        match self {
            Self::CredentialRequired => EngineError::GENERIC,
            Self::Engine(e) => e.code,
        }
    }

    pub fn detail(&self) -> Option<&ErrorDetail> {
        match self {
            Self::CredentialRequired => None,
            Self::Engine(e) => e.detail.as_ref(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::CredentialRequired => self.to_string(),
            Self::Engine(e) => e.message.clone(),
        }
    }
}

/// Holds at most one error per window.
#[derive(Debug, Default, Clone)]
pub struct ErrorSlot {
    error: Option<OperationError>,
}

impl ErrorSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new window.
    pub fn clear(&mut self) {
        self.error = None;
    }

    /// Store `error` unless the window already holds one.
    ///
    /// Returns whether the error was stored.
    ///
    /// # Example
    ///
    /// ```
    /// use repoview::engine::EngineError;
    /// use repoview::progress::{ErrorSlot, OperationError};
    ///
    /// let mut slot = ErrorSlot::new();
    /// assert!(slot.report(EngineError::generic("first").into()));
    /// assert!(!slot.report(OperationError::CredentialRequired));
    /// assert_eq!(slot.get().unwrap().message(), "first");
    /// ```
    pub fn report(&mut self, error: OperationError) -> bool {
        if let Some(existing) = &self.error {
            tracing::warn!(
                kept = %existing,
                dropped = %error,
                "error slot already populated, dropping later error"
            );
            return false;
        }
        tracing::debug!(code = error.code(), error = %error, "operation error recorded");
        self.error = Some(error);
        true
    }

    /// Raw-form convenience for engine failures.
    pub fn report_engine(
        &mut self,
        code: i32,
        detail: Option<ErrorDetail>,
        message: impl Into<String>,
    ) -> bool {
        self.report(OperationError::Engine(EngineError {
            code,
            detail,
            message: message.into(),
        }))
    }

    pub fn get(&self) -> Option<&OperationError> {
        self.error.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_report_wins() {
        let mut slot = ErrorSlot::new();
        assert!(slot.report_engine(-3, None, "not found"));
        assert!(!slot.report_engine(-1, None, "cascade"));

        let err = slot.get().unwrap();
        assert_eq!(err.code(), -3);
        assert_eq!(err.message(), "not found");
    }

    #[test]
    fn clear_opens_new_window() {
        let mut slot = ErrorSlot::new();
        slot.report(OperationError::CredentialRequired);
        slot.clear();
        assert!(slot.is_empty());

        slot.report_engine(-12, None, "invalid");
        assert_eq!(slot.get().unwrap().code(), -12);
    }

    #[test]
    fn credential_required_diagnostic() {
        let err = OperationError::CredentialRequired;
        assert_eq!(err.code(), -1);
        assert_eq!(err.message(), "Credential is required!");
        assert!(err.detail().is_none());
    }

    #[test]
    fn engine_detail_exposed() {
        let mut slot = ErrorSlot::new();
        slot.report_engine(
            -1,
            Some(ErrorDetail {
                class: 12,
                message: "ssh".into(),
            }),
            "auth failed",
        );
        assert_eq!(slot.get().unwrap().detail().unwrap().class, 12);
    }
}
