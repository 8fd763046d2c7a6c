//! state
//!
//! The repository state controller.
//!
//! # Architecture
//!
//! [`Repository`] owns the derived views of one repository (status, commit
//! graph, reference list) and is the only entry point for mutating
//! commands. Every command follows the same path:
//!
//! ```text
//! clear error slot -> engine call -> [ok] apply invalidation row -> notify
//!                                 -> [err] record in slot, return Err
//! ```
//!
//! Network commands return as soon as the job is dispatched. Their progress
//! and completion are applied when the consumer calls
//! [`Repository::process_remote_events`] (or one of the wait helpers); the
//! invalidation row runs at that point, success or failure.
//!
//! # Invariants
//!
//! - Derived values are replaced wholesale; readers never see a partial view.
//! - Each applied refresh bumps exactly one [`StateVersions`] counter.
//! - A failed local command applies no invalidation.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use repoview::credentials::CredentialStore;
//! use repoview::engine::mock::MockEngine;
//! use repoview::state::Repository;
//!
//! let engine = MockEngine::with_initial_commit();
//! engine.add_worktree_change("src/lib.rs");
//!
//! let mut repo = Repository::new(Arc::new(engine), CredentialStore::in_memory()).unwrap();
//! repo.refresh_all();
//!
//! let before = repo.versions().status;
//! repo.stage("src/lib.rs").unwrap();
//!
//! assert_eq!(repo.versions().status, before + 1);
//! assert_eq!(repo.status().staged.paths(), vec!["src/lib.rs"]);
//! ```

pub mod derived;
pub mod invalidation;
mod worker;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::core::config::{Config, ConfigError, DEFAULT_WORKER_THREADS};
use crate::core::types::{BranchName, Oid, RefName};
use crate::credentials::CredentialStore;
use crate::engine::{
    Diff, Engine, EngineError, EngineResult, ReferenceInfo, Remote, RepositoryState, Signature,
};
use crate::progress::{
    ErrorSlot, LocalOperationCoordinator, LocalOperationState, OperationError, RemoteCompletion,
    RemoteError, RemoteOperationCoordinator, RemoteOperationKind, RemoteOperationState,
};

pub use derived::{CommitGraph, ReferenceAnnotations, StateChange, StateVersions, Status};
pub use invalidation::{Command, Invalidation};
pub use worker::Worker;

const FALLBACK_REMOTE: &str = "origin";

/// Errors constructing a repository controller.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

type StateObserver = Box<dyn FnMut(StateChange, &StateVersions) + Send>;

impl RemoteOperationKind {
    fn command(self) -> Command {
        match self {
            Self::Clone => Command::Clone,
            Self::Fetch => Command::Fetch,
            Self::Push => Command::Push,
        }
    }
}

/// Controller for one repository location.
pub struct Repository {
    engine: Arc<dyn Engine>,
    credentials: CredentialStore,
    worker: Worker,
    default_remote: String,

    has_repository: bool,
    status: Status,
    graph: CommitGraph,
    references: Vec<ReferenceInfo>,
    annotations: ReferenceAnnotations,
    versions: StateVersions,

    errors: ErrorSlot,
    local: LocalOperationCoordinator,
    remote: RemoteOperationCoordinator,
    observers: Vec<StateObserver>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("has_repository", &self.has_repository)
            .field("versions", &self.versions)
            .field("references", &self.references.len())
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Controller with default settings.
    pub fn new(
        engine: Arc<dyn Engine>,
        credentials: CredentialStore,
    ) -> Result<Self, RepositoryError> {
        let worker = Worker::new(DEFAULT_WORKER_THREADS)?;
        Ok(Self::assemble(engine, credentials, worker, FALLBACK_REMOTE))
    }

    /// Controller configured from `config`: credential file, worker size and
    /// default remote.
    pub fn from_config(engine: Arc<dyn Engine>, config: &Config) -> Result<Self, RepositoryError> {
        let credentials = CredentialStore::with_file(config.credentials_path()?);
        let worker = Worker::new(config.worker_threads())?;
        Ok(Self::assemble(
            engine,
            credentials,
            worker,
            config.default_remote(),
        ))
    }

    /// Controller with an explicit worker.
    pub fn with_worker(
        engine: Arc<dyn Engine>,
        credentials: CredentialStore,
        worker: Worker,
    ) -> Self {
        Self::assemble(engine, credentials, worker, FALLBACK_REMOTE)
    }

    fn assemble(
        engine: Arc<dyn Engine>,
        credentials: CredentialStore,
        worker: Worker,
        default_remote: &str,
    ) -> Self {
        let has_repository = engine.exists();
        Self {
            engine,
            credentials,
            worker,
            default_remote: default_remote.to_string(),
            has_repository,
            status: Status::default(),
            graph: CommitGraph::default(),
            references: Vec::new(),
            annotations: ReferenceAnnotations::default(),
            versions: StateVersions::default(),
            errors: ErrorSlot::new(),
            local: LocalOperationCoordinator::new(),
            remote: RemoteOperationCoordinator::new(),
            observers: Vec::new(),
        }
    }

    /// Register a callback run after every applied refresh.
    pub fn subscribe(&mut self, observer: impl FnMut(StateChange, &StateVersions) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    // ------------------------------------------------------------------
    // Read accessors
    // ------------------------------------------------------------------

    pub fn has_repository(&self) -> bool {
        self.has_repository
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    /// The commit graph, reloading it first if it was flagged stale.
    ///
    /// A reload also re-resolves reference targets so the new tips carry
    /// their annotations. This is part of the read, not a targets refresh:
    /// no version counter moves.
    pub fn commit_graph(&mut self) -> EngineResult<&CommitGraph> {
        if self.graph.needs_reload() {
            let commits = self.engine.log()?;
            self.refresh_reference_targets()?;
            tracing::debug!(count = commits.len(), "reloaded commit graph");
            self.graph.replace(commits);
        }
        Ok(&self.graph)
    }

    /// Whether the next graph read triggers a reload.
    pub fn commit_graph_needs_reload(&self) -> bool {
        self.graph.needs_reload()
    }

    pub fn references(&self) -> &[ReferenceInfo] {
        &self.references
    }

    pub fn reference(&self, name: &str) -> Option<&ReferenceInfo> {
        self.references.iter().find(|r| r.name.as_str() == name)
    }

    /// References pointing at `commit`.
    pub fn references_of(&self, commit: &Oid) -> &[RefName] {
        self.annotations.of(commit)
    }

    pub fn versions(&self) -> StateVersions {
        self.versions
    }

    /// Error of the last plain command (stage, commit, branch, ...).
    pub fn error(&self) -> Option<&OperationError> {
        self.errors.get()
    }

    pub fn local_progress(&self) -> &LocalOperationState {
        self.local.state()
    }

    /// Error of the last reset, checkout or merge.
    pub fn local_error(&self) -> Option<&OperationError> {
        self.local.errors().get()
    }

    pub fn remote_progress(&self) -> &RemoteOperationState {
        self.remote.state()
    }

    /// Error of the last network operation.
    pub fn remote_error(&self) -> Option<&OperationError> {
        self.remote.errors().get()
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn credentials_mut(&mut self) -> &mut CredentialStore {
        &mut self.credentials
    }

    pub fn default_remote(&self) -> &str {
        &self.default_remote
    }

    pub fn diff(&self, base: &Oid, target: &Oid) -> EngineResult<Diff> {
        self.engine.diff(base, target)
    }

    pub fn remotes(&self) -> EngineResult<Vec<Remote>> {
        self.engine.remotes()
    }

    pub fn signature(&self) -> EngineResult<Option<Signature>> {
        self.engine.signature()
    }

    pub fn set_signature(&mut self, name: &str, email: &str) -> EngineResult<()> {
        self.errors.clear();
        self.engine.set_signature(name, email).map_err(|e| {
            self.errors.report(e.clone().into());
            e
        })
    }

    // ------------------------------------------------------------------
    // Plain commands
    // ------------------------------------------------------------------

    pub fn open(&mut self) -> EngineResult<()> {
        self.run(Command::Open, |engine| engine.open())
    }

    pub fn create(&mut self) -> EngineResult<()> {
        self.run(Command::Create, |engine| engine.create())
    }

    pub fn stage(&mut self, path: &str) -> EngineResult<()> {
        self.run(Command::Stage, |engine| engine.stage(path))
    }

    pub fn unstage(&mut self, path: &str) -> EngineResult<()> {
        self.run(Command::Unstage, |engine| engine.unstage(path))
    }

    /// Commit the index; completes an in-progress merge.
    pub fn commit(&mut self, message: &str) -> EngineResult<Oid> {
        self.run(Command::Commit, |engine| engine.commit(message))
    }

    pub fn create_branch(&mut self, name: &BranchName, from: &Oid) -> EngineResult<()> {
        self.run(Command::CreateBranch, |engine| {
            engine.create_branch(name.as_str(), from)
        })
    }

    pub fn create_local_tracking_branch(&mut self, remote_ref: &RefName) -> EngineResult<()> {
        self.run(Command::CreateLocalTrackingBranch, |engine| {
            if !remote_ref.is_remote_ref() {
                return Err(EngineError::invalid(format!(
                    "'{}' is not a remote-tracking reference",
                    remote_ref
                )));
            }
            engine.create_local_tracking_branch(remote_ref)
        })
    }

    pub fn create_lightweight_tag(&mut self, name: &str, from: &Oid) -> EngineResult<()> {
        self.run(Command::CreateLightweightTag, |engine| {
            RefName::for_tag(name)?;
            engine.create_lightweight_tag(name, from)
        })
    }

    pub fn remove_reference(&mut self, reference: &RefName) -> EngineResult<()> {
        self.run(Command::RemoveReference, |engine| {
            engine.remove_reference(reference)
        })
    }

    pub fn add_remote(&mut self, name: &str, url: &str) -> EngineResult<Remote> {
        self.run(Command::AddRemote, |engine| engine.add_remote(name, url))
    }

    pub fn remove_remote(&mut self, name: &str) -> EngineResult<()> {
        self.run(Command::RemoveRemote, |engine| engine.remove_remote(name))
    }

    fn run<T>(
        &mut self,
        command: Command,
        op: impl FnOnce(&dyn Engine) -> EngineResult<T>,
    ) -> EngineResult<T> {
        self.errors.clear();
        tracing::debug!(?command, "dispatching command");

        match op(self.engine.as_ref()) {
            Ok(value) => {
                self.apply(command.invalidation());
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(?command, error = %e, "command failed");
                self.errors.report(e.clone().into());
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // Local operations with progress
    // ------------------------------------------------------------------

    /// Hard reset the current branch to `commit`.
    pub fn reset(&mut self, commit: &Oid) -> EngineResult<()> {
        self.local
            .clear_state(format!("Resetting to {}", commit.short(7)), false);
        let result = self.engine.reset(commit, &mut self.local);
        self.finish_local(Command::Reset, result)
    }

    pub fn checkout(&mut self, reference: &RefName) -> EngineResult<()> {
        self.local
            .clear_state(format!("Checking out {}", reference), false);
        let result = self.engine.checkout(reference, &mut self.local);
        self.finish_local(Command::Checkout, result)
    }

    /// Merge `references` into the working tree and index without committing.
    pub fn merge(&mut self, references: &[RefName]) -> EngineResult<()> {
        let names: Vec<&str> = references.iter().map(RefName::as_str).collect();
        self.local
            .clear_state(format!("Merging {}", names.join(", ")), true);
        let result = self.engine.merge(references, &mut self.local);
        self.finish_local(Command::Merge, result)
    }

    fn finish_local(&mut self, command: Command, result: EngineResult<()>) -> EngineResult<()> {
        self.local.complete();
        match result {
            Ok(()) => {
                self.apply(command.invalidation());
                Ok(())
            }
            Err(e) => {
                tracing::warn!(?command, error = %e, "local operation failed");
                self.local.errors_mut().report(e.clone().into());
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // Network operations
    // ------------------------------------------------------------------

    /// Start cloning `url` into the bound location.
    pub fn clone_from(&mut self, url: &str) -> Result<(), RemoteError> {
        let credential = self.credentials.lookup(url).cloned();
        let sink = self.remote.clear_state(
            RemoteOperationKind::Clone,
            format!("Cloning {}", url),
            credential,
        )?;

        let engine = Arc::clone(&self.engine);
        let url = url.to_string();
        self.worker.spawn(move || {
            let result = engine.clone_repository(&url, &sink);
            sink.finish(result);
        });
        Ok(())
    }

    /// Start fetching from `remote` (the configured default when `None`).
    pub fn fetch(&mut self, remote: Option<&str>) -> Result<(), RemoteError> {
        let remote = self.find_remote(remote)?;
        let credential = self.credentials.lookup(&remote.url).cloned();
        let sink = self.remote.clear_state(
            RemoteOperationKind::Fetch,
            format!("Fetching from {}", remote.name),
            credential,
        )?;

        let engine = Arc::clone(&self.engine);
        self.worker.spawn(move || {
            let result = engine.fetch(&remote, &sink);
            sink.finish(result);
        });
        Ok(())
    }

    /// Start pushing all local branches to `remote` (the configured default
    /// when `None`).
    pub fn push(&mut self, remote: Option<&str>, force: bool) -> Result<(), RemoteError> {
        let remote = self.find_remote(remote)?;
        let credential = self.credentials.lookup(&remote.url).cloned();
        let sink = self.remote.clear_state(
            RemoteOperationKind::Push,
            format!("Pushing to {}", remote.name),
            credential,
        )?;

        let engine = Arc::clone(&self.engine);
        self.worker.spawn(move || {
            let result = engine.push(&remote, force, &sink);
            sink.finish(result);
        });
        Ok(())
    }

    fn find_remote(&self, name: Option<&str>) -> Result<Remote, RemoteError> {
        let name = name.unwrap_or(self.default_remote.as_str());
        self.engine
            .remotes()?
            .into_iter()
            .find(|r| r.name == name)
            .ok_or_else(|| RemoteError::UnknownRemote(name.to_string()))
    }

    /// Ask the running network operation to abort.
    pub fn cancel_remote(&self) {
        self.remote.cancel();
    }

    /// Apply queued network progress without blocking.
    ///
    /// Returns the completion when the running operation finished; its
    /// invalidation row has been applied by then.
    pub fn process_remote_events(&mut self) -> Option<RemoteCompletion> {
        let completion = self.remote.process_events()?;
        self.complete_remote(&completion);
        Some(completion)
    }

    /// Block until the running network operation completes.
    ///
    /// Must not be called from within an async context.
    pub fn wait_remote_blocking(&mut self) -> Option<RemoteCompletion> {
        let completion = self.remote.wait_blocking()?;
        self.complete_remote(&completion);
        Some(completion)
    }

    /// Wait asynchronously until the running network operation completes.
    pub async fn wait_remote(&mut self) -> Option<RemoteCompletion> {
        let completion = self.remote.wait().await?;
        self.complete_remote(&completion);
        Some(completion)
    }

    fn complete_remote(&mut self, completion: &RemoteCompletion) {
        // Applied regardless of outcome: a failed fetch may still have moved tips
        self.apply(completion.kind.command().invalidation());
    }

    // ------------------------------------------------------------------
    // Invalidation
    // ------------------------------------------------------------------

    /// Recompute every derived view, e.g. right after opening.
    pub fn refresh_all(&mut self) {
        self.apply(Invalidation::ALL);
    }

    fn apply(&mut self, invalidation: Invalidation) {
        if invalidation.existence {
            self.has_repository = self.engine.exists();
            self.notify(StateChange::Existence);
        }
        if invalidation.status {
            let refreshed = self.refresh_status();
            self.settle(StateChange::Status, refreshed);
        }
        if invalidation.commit_graph {
            self.graph.mark_stale();
            self.notify(StateChange::CommitGraph);
        }
        if invalidation.reference_list {
            let refreshed = self.refresh_reference_list();
            self.settle(StateChange::ReferenceList, refreshed);
        }
        if invalidation.reference_targets {
            let refreshed = self.refresh_reference_targets();
            self.settle(StateChange::ReferenceTargets, refreshed);
        }
    }

    fn settle(&mut self, change: StateChange, refreshed: EngineResult<()>) {
        match refreshed {
            Ok(()) => self.notify(change),
            Err(e) => {
                tracing::warn!(?change, error = %e, "refresh failed, keeping previous view");
                self.errors.report(e.into());
            }
        }
    }

    fn notify(&mut self, change: StateChange) {
        self.versions.bump(change);
        let versions = self.versions;
        for observer in &mut self.observers {
            observer(change, &versions);
        }
    }

    fn refresh_status(&mut self) -> EngineResult<()> {
        let report = self.engine.status()?;
        let state = match RepositoryState::from_raw(report.state_code) {
            Some(state) => state,
            None => {
                tracing::warn!(
                    code = report.state_code,
                    kept = %self.status.state,
                    "unrecognized repository state"
                );
                self.status.state
            }
        };
        self.status = Status {
            current_branch: report.current_branch,
            staged: report.staged,
            unstaged: report.unstaged,
            state,
        };
        Ok(())
    }

    /// Re-enumerate references. Entries already listed keep their targets
    /// until the targets refresh; removed entries lose their annotations.
    fn refresh_reference_list(&mut self) -> EngineResult<()> {
        let fetched = self.engine.references()?;
        let mut previous: HashMap<RefName, ReferenceInfo> = std::mem::take(&mut self.references)
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();

        let mut references = Vec::with_capacity(fetched.len());
        for info in fetched {
            match previous.remove(&info.name) {
                Some(kept) => references.push(kept),
                None => {
                    if let Some(target) = &info.target {
                        self.annotations.insert(target.clone(), info.name.clone());
                    }
                    references.push(info);
                }
            }
        }
        self.annotations.retain(|name| !previous.contains_key(name));
        self.references = references;
        Ok(())
    }

    /// Re-resolve the targets of listed references.
    fn refresh_reference_targets(&mut self) -> EngineResult<()> {
        let targets: HashMap<RefName, Option<Oid>> = self
            .engine
            .references()?
            .into_iter()
            .map(|r| (r.name, r.target))
            .collect();

        for entry in &mut self.references {
            if let Some(target) = targets.get(&entry.name) {
                entry.target = target.clone();
            }
        }
        self.annotations = ReferenceAnnotations::from_references(&self.references);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::{MockCall, MockEngine};
    use std::sync::Mutex;

    fn repo(engine: &MockEngine) -> Repository {
        let worker = Worker::owned(1).unwrap();
        let mut repo = Repository::with_worker(
            Arc::new(engine.clone()),
            CredentialStore::in_memory(),
            worker,
        );
        repo.refresh_all();
        repo
    }

    #[test]
    fn refresh_all_populates_every_view() {
        let engine = MockEngine::with_initial_commit();
        let mut repo = repo(&engine);

        assert!(repo.has_repository());
        assert_eq!(repo.status().current_branch, "main");
        assert!(repo.reference("refs/heads/main").is_some());
        assert_eq!(repo.commit_graph().unwrap().len(), 1);
        assert_eq!(
            repo.versions(),
            StateVersions {
                existence: 1,
                status: 1,
                commit_graph: 1,
                reference_list: 1,
                reference_targets: 1,
            }
        );
    }

    #[test]
    fn observers_see_each_change() {
        let engine = MockEngine::with_initial_commit();
        let mut repo = repo(&engine);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        repo.subscribe(move |change, versions| {
            sink.lock().unwrap().push((change, versions.status));
        });

        engine.add_worktree_change("a");
        repo.stage("a").unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(StateChange::Status, 2)]);
    }

    #[test]
    fn unknown_state_code_keeps_previous() {
        let engine = MockEngine::with_initial_commit();
        engine.set_state_code(1);
        let mut repo = repo(&engine);
        assert_eq!(repo.status().state, RepositoryState::Merge);

        engine.set_state_code(99);
        engine.add_worktree_change("a");
        repo.stage("a").unwrap();

        assert_eq!(repo.status().state, RepositoryState::Merge);
        assert!(repo.error().is_none());
    }

    #[test]
    fn failed_refresh_keeps_view_and_version() {
        let engine = MockEngine::with_initial_commit();
        let mut repo = repo(&engine);
        let before = repo.versions();

        let engine = engine.fail_on(MockCall::Status, EngineError::generic("index locked"));
        engine.add_worktree_change("a");
        repo.stage("a").unwrap();

        assert_eq!(repo.versions().status, before.status);
        assert_eq!(repo.error().unwrap().message(), "index locked");
    }

    #[test]
    fn reference_list_refresh_keeps_old_targets() {
        let engine = MockEngine::with_initial_commit();
        let first = engine.head_commit().unwrap();
        let tag = RefName::for_tag("v1").unwrap();
        engine.insert_reference(&tag, first.clone());
        let mut repo = repo(&engine);

        // Move main behind the controller's back
        engine.add_worktree_change("a");
        engine.stage("a").unwrap();
        let second = engine.commit("moved").unwrap();

        repo.remove_reference(&tag).unwrap();

        assert!(repo.reference("refs/tags/v1").is_none());
        let main = repo.reference("refs/heads/main").unwrap();
        assert_eq!(main.target.as_ref(), Some(&first));
        let names: Vec<_> = repo.references_of(&first).iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["HEAD", "refs/heads/main"]);

        repo.refresh_all();
        assert_eq!(repo.reference("refs/heads/main").unwrap().target, Some(second.clone()));
        assert!(repo.references_of(&first).is_empty());
        assert_eq!(repo.references_of(&second).len(), 2);
    }
}
