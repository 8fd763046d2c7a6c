//! state::worker
//!
//! Background execution for network operations.
//!
//! Network calls block inside the engine, so they go to tokio's blocking
//! pool. When the repository is created inside a tokio runtime, that
//! runtime's handle is used; otherwise the worker owns a small
//! multi-threaded runtime.

use tokio::runtime::{Builder, Handle, Runtime};

use crate::progress::RemoteError;

#[derive(Debug)]
enum Backend {
    Ambient(Handle),
    Owned(Runtime),
}

/// Runs blocking jobs off the consumer thread.
#[derive(Debug)]
pub struct Worker {
    backend: Backend,
}

impl Worker {
    /// Use the ambient runtime if there is one, else build one with
    /// `threads` threads.
    pub fn new(threads: usize) -> Result<Self, RemoteError> {
        match Handle::try_current() {
            Ok(handle) => {
                tracing::debug!("using ambient tokio runtime for network operations");
                Ok(Self {
                    backend: Backend::Ambient(handle),
                })
            }
            Err(_) => Self::owned(threads),
        }
    }

    /// Always build a dedicated runtime.
    pub fn owned(threads: usize) -> Result<Self, RemoteError> {
        let threads = threads.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(threads)
            .max_blocking_threads(threads)
            .thread_name("repoview-worker")
            .build()
            .map_err(|e| RemoteError::Runtime(e.to_string()))?;
        tracing::debug!(threads, "started worker runtime");
        Ok(Self {
            backend: Backend::Owned(runtime),
        })
    }

    fn handle(&self) -> &Handle {
        match &self.backend {
            Backend::Ambient(handle) => handle,
            Backend::Owned(runtime) => runtime.handle(),
        }
    }

    /// Run `job` on the blocking pool. The job reports its own completion.
    pub fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // Detached: completion travels over the progress channel
        drop(self.handle().spawn_blocking(job));
    }
}
