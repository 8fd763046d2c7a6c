//! engine::mock
//!
//! Mock engine implementation for deterministic testing.
//!
//! # Design
//!
//! The mock engine keeps a tiny repository model in memory: a list of
//! commits, a list of references, a staged/unstaged change set and the
//! configured remotes. Mutations update that model the way a real engine
//! would, so the controller's derived state can be checked end to end.
//!
//! Tests script the parts a real engine decides on its own:
//!
//! - the raw merge analysis value delivered before merge progress
//! - the raw operation-state code reported by `status`
//! - the paths streamed as checkout progress
//! - the callback sequence of the next network operation ([`RemoteStep`])
//! - failures for any call ([`MockEngine::fail_on`])
//!
//! # Example
//!
//! ```
//! use repoview::engine::mock::{MockCall, MockEngine};
//! use repoview::engine::{Engine, EngineError};
//!
//! let engine = MockEngine::new();
//! engine.create().unwrap();
//! engine.add_worktree_change("README.md");
//! engine.stage("README.md").unwrap();
//! let id = engine.commit("Initial commit").unwrap();
//!
//! assert_eq!(engine.log().unwrap()[0].id, id);
//!
//! let engine = engine.fail_on(MockCall::Stage, EngineError::not_found("no such path"));
//! assert!(engine.stage("missing.txt").is_err());
//! ```

use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::model::{
    ChangeKind, CheckoutPerf, CommitRecord, Diff, DiffDelta, PushUpdate, ReferenceInfo,
    ReferenceKind, Remote, Signature, StatusReport, TransferProgress,
};
use super::traits::{
    CheckoutObserver, Engine, EngineError, EngineResult, MergeObserver, RemoteObserver,
};
use crate::core::types::{Oid, RefName};

/// Mock engine for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping. Clones share state,
/// so a test keeps one handle while the controller owns another.
#[derive(Debug, Clone)]
pub struct MockEngine {
    inner: Arc<Mutex<MockEngineInner>>,
}

#[derive(Debug)]
struct MockEngineInner {
    exists: bool,
    /// Branch `HEAD` points at (shorthand)
    head: String,
    /// Newest first
    commits: Vec<CommitRecord>,
    /// Direct references; `HEAD` is synthesized on read
    references: Vec<ReferenceInfo>,
    remotes: Vec<Remote>,
    signature: Option<Signature>,
    staged: Vec<String>,
    unstaged: Vec<String>,
    state_code: i32,
    merge_analysis: i32,
    checkout_paths: Vec<String>,
    remote_script: Vec<RemoteStep>,
    next_commit: u64,
    fail_on: HashMap<MockCall, EngineError>,
    operations: Vec<MockOperation>,
}

/// Engine calls that can be configured to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockCall {
    Open,
    Create,
    Status,
    Log,
    References,
    Diff,
    Remotes,
    AddRemote,
    RemoveRemote,
    Signature,
    SetSignature,
    Stage,
    Unstage,
    Commit,
    CreateBranch,
    CreateLocalTrackingBranch,
    CreateLightweightTag,
    RemoveReference,
    Reset,
    Checkout,
    Merge,
    Clone,
    Push,
    Fetch,
}

/// Recorded mutating call for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    Open,
    Create,
    AddRemote { name: String, url: String },
    RemoveRemote { name: String },
    SetSignature { name: String, email: String },
    Stage { path: String },
    Unstage { path: String },
    Commit { message: String },
    CreateBranch { name: String, from: Oid },
    CreateLocalTrackingBranch { remote_ref: RefName },
    CreateLightweightTag { name: String, from: Oid },
    RemoveReference { reference: RefName },
    Reset { commit: Oid },
    Checkout { reference: RefName },
    Merge { references: Vec<RefName> },
    Clone { url: String },
    Push { remote: String, force: bool },
    Fetch { remote: String },
}

/// One step of a scripted network operation.
#[derive(Debug)]
pub enum RemoteStep {
    Sideband(String),
    Transfer(TransferProgress),
    Pack { stage: i32, current: u32, total: u32 },
    PushTransfer { current: u32, total: u32, bytes: usize },
    /// Also moves (or creates) the reference in the mock model
    UpdateTip { refname: String, old: Oid, new: Oid },
    Negotiation(Vec<PushUpdate>),
    PushUpdateReference { refname: String, status: Option<String> },
    /// Authenticate: without a resolved credential the observer is told and
    /// the operation fails with an authentication error.
    RequireCredential,
    /// Block the worker until the paired sender fires or is dropped.
    Pause(Receiver<()>),
    /// Fail the operation with this error.
    Fail(EngineError),
    /// Panic on the worker with this message.
    Panic(String),
}

impl MockEngine {
    /// Create a mock with no repository at the bound location.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockEngineInner {
                exists: false,
                head: "main".to_string(),
                commits: Vec::new(),
                references: Vec::new(),
                remotes: Vec::new(),
                signature: None,
                staged: Vec::new(),
                unstaged: Vec::new(),
                state_code: 0,
                merge_analysis: 1,
                checkout_paths: Vec::new(),
                remote_script: Vec::new(),
                next_commit: 1,
                fail_on: HashMap::new(),
                operations: Vec::new(),
            })),
        }
    }

    /// Create a mock with an existing repository holding one commit on `main`.
    pub fn with_initial_commit() -> Self {
        let engine = Self::new();
        {
            let mut inner = engine.lock();
            inner.exists = true;
            inner.signature = Some(Signature {
                name: "Mock Author".into(),
                email: "mock@example.com".into(),
            });
        }
        // Infallible for a fresh model: commit ids are generated hex
        let _ = engine.commit_locked("Initial commit");
        engine
    }

    /// Configure the mock to fail on a specific call.
    pub fn fail_on(self, call: MockCall, error: EngineError) -> Self {
        self.lock().fail_on.insert(call, error);
        self
    }

    /// Clear every failure configuration.
    pub fn clear_fail_on(&self) {
        self.lock().fail_on.clear();
    }

    /// Get all recorded mutating operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.lock().operations.clone()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        self.lock().operations.clear();
    }

    /// Add an unstaged modification for `path`.
    pub fn add_worktree_change(&self, path: impl Into<String>) {
        let path = path.into();
        let mut inner = self.lock();
        if !inner.unstaged.contains(&path) {
            inner.unstaged.push(path);
        }
    }

    /// Raw operation-state code the next `status` reports.
    pub fn set_state_code(&self, code: i32) {
        self.lock().state_code = code;
    }

    /// Raw analysis value delivered by the next merge.
    pub fn set_merge_analysis(&self, raw: i32) {
        self.lock().merge_analysis = raw;
    }

    /// Paths streamed as progress by reset, checkout and merge.
    pub fn set_checkout_paths<I, S>(&self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().checkout_paths = paths.into_iter().map(Into::into).collect();
    }

    /// Callback sequence of the next network operation.
    pub fn script_remote(&self, steps: Vec<RemoteStep>) {
        self.lock().remote_script = steps;
    }

    /// Insert a reference directly into the model.
    pub fn insert_reference(&self, name: &RefName, target: Oid) {
        let mut inner = self.lock();
        inner.set_reference(name, target);
    }

    /// Target of `name` in the model (for test verification).
    pub fn reference_target(&self, name: &str) -> Option<Oid> {
        let inner = self.lock();
        inner
            .references
            .iter()
            .find(|r| r.name.as_str() == name)
            .and_then(|r| r.target.clone())
    }

    /// Current `HEAD` commit, if the branch is born.
    pub fn head_commit(&self) -> Option<Oid> {
        self.lock().head_target()
    }

    pub fn staged_paths(&self) -> Vec<String> {
        self.lock().staged.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockEngineInner> {
        // A poisoned lock only means another test thread panicked mid-call
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, op: MockOperation) {
        self.lock().operations.push(op);
    }

    fn check_fail(&self, call: MockCall) -> EngineResult<()> {
        match self.lock().fail_on.get(&call) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn require_repository(&self) -> EngineResult<()> {
        if self.lock().exists {
            Ok(())
        } else {
            Err(EngineError::not_found("could not find repository"))
        }
    }

    fn commit_locked(&self, message: &str) -> EngineResult<Oid> {
        let mut inner = self.lock();
        let id = Oid::new(format!("{:040x}", inner.next_commit))?;
        let time = DateTime::<Utc>::from_timestamp(1_700_000_000 + inner.next_commit as i64, 0)
            .unwrap_or_default();
        inner.next_commit += 1;

        let parents = inner.head_target().into_iter().collect();
        let author = inner.signature.clone().unwrap_or(Signature {
            name: "Mock Author".into(),
            email: "mock@example.com".into(),
        });
        inner.commits.insert(
            0,
            CommitRecord {
                id: id.clone(),
                parents,
                summary: message.lines().next().unwrap_or_default().to_string(),
                message: message.to_string(),
                author,
                time,
            },
        );
        inner.staged.clear();
        inner.state_code = 0;

        let head = RefName::new(format!("refs/heads/{}", inner.head))?;
        inner.set_reference(&head, id.clone());
        Ok(id)
    }

    /// Stream the configured checkout paths, then the final perf counters.
    fn stream_checkout(&self, observer: &mut dyn CheckoutObserver) {
        let paths = self.lock().checkout_paths.clone();
        let total = paths.len();
        for (index, path) in paths.iter().enumerate() {
            observer.on_checkout_progress(Some(path), index + 1, total);
        }
        observer.on_checkout_perf_data(CheckoutPerf {
            mkdir_calls: 1,
            stat_calls: total,
            chmod_calls: 0,
        });
    }

    /// Play the scripted network callbacks against `observer`.
    fn run_remote_script(&self, observer: &dyn RemoteObserver) -> EngineResult<()> {
        let steps = std::mem::take(&mut self.lock().remote_script);

        for step in steps {
            if observer.is_cancelled() {
                return Err(EngineError::cancelled());
            }
            match step {
                RemoteStep::Sideband(text) => observer.on_sideband_progress(&text),
                RemoteStep::Transfer(progress) => observer.on_transfer_progress(progress),
                RemoteStep::Pack {
                    stage,
                    current,
                    total,
                } => observer.on_pack_progress(stage, current, total),
                RemoteStep::PushTransfer {
                    current,
                    total,
                    bytes,
                } => observer.on_push_transfer_progress(current, total, bytes),
                RemoteStep::UpdateTip { refname, old, new } => {
                    let name = RefName::new(refname.as_str())?;
                    self.lock().set_reference(&name, new.clone());
                    observer.on_update_tips(&refname, old, new);
                }
                RemoteStep::Negotiation(updates) => observer.on_push_negotiation(updates),
                RemoteStep::PushUpdateReference { refname, status } => {
                    observer.on_push_update_reference(&refname, status.as_deref())
                }
                RemoteStep::RequireCredential => {
                    if observer.credential().is_none() {
                        observer.must_supply_credential();
                        return Err(EngineError::generic("authentication required but no callback set"));
                    }
                }
                RemoteStep::Pause(release) => {
                    // Either a send or a dropped sender releases the worker
                    let _ = release.recv();
                }
                RemoteStep::Fail(error) => return Err(error),
                RemoteStep::Panic(message) => panic!("{}", message),
            }
        }

        if observer.is_cancelled() {
            return Err(EngineError::cancelled());
        }
        Ok(())
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngineInner {
    fn head_target(&self) -> Option<Oid> {
        let head = format!("refs/heads/{}", self.head);
        self.references
            .iter()
            .find(|r| r.name.as_str() == head)
            .and_then(|r| r.target.clone())
    }

    fn set_reference(&mut self, name: &RefName, target: Oid) {
        if let Some(existing) = self.references.iter_mut().find(|r| &r.name == name) {
            existing.target = Some(target);
            return;
        }
        self.references.push(ReferenceInfo {
            name: name.clone(),
            shorthand: shorthand(name),
            target: Some(target),
            kind: ReferenceKind::of(name),
            symbolic: false,
        });
    }

    fn has_reference(&self, name: &RefName) -> bool {
        self.references.iter().any(|r| &r.name == name)
    }
}

fn shorthand(name: &RefName) -> String {
    ["refs/heads/", "refs/remotes/", "refs/tags/"]
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .unwrap_or(name.as_str())
        .to_string()
}

fn change_set(paths: &[String], kind: ChangeKind) -> Diff {
    Diff {
        deltas: paths
            .iter()
            .map(|path| DiffDelta {
                kind,
                old_path: Some(path.clone()),
                new_path: Some(path.clone()),
                hunks: Vec::new(),
            })
            .collect(),
    }
}

impl Engine for MockEngine {
    fn open(&self) -> EngineResult<()> {
        self.record(MockOperation::Open);
        self.check_fail(MockCall::Open)?;
        self.require_repository()
    }

    fn create(&self) -> EngineResult<()> {
        self.record(MockOperation::Create);
        self.check_fail(MockCall::Create)?;
        self.lock().exists = true;
        Ok(())
    }

    fn exists(&self) -> bool {
        self.lock().exists
    }

    fn status(&self) -> EngineResult<StatusReport> {
        self.check_fail(MockCall::Status)?;
        self.require_repository()?;
        let inner = self.lock();
        Ok(StatusReport {
            current_branch: inner.head.clone(),
            staged: change_set(&inner.staged, ChangeKind::Modified),
            unstaged: change_set(&inner.unstaged, ChangeKind::Modified),
            state_code: inner.state_code,
        })
    }

    fn log(&self) -> EngineResult<Vec<CommitRecord>> {
        self.check_fail(MockCall::Log)?;
        self.require_repository()?;
        Ok(self.lock().commits.clone())
    }

    fn references(&self) -> EngineResult<Vec<ReferenceInfo>> {
        self.check_fail(MockCall::References)?;
        self.require_repository()?;
        let inner = self.lock();

        let mut references = Vec::with_capacity(inner.references.len() + 1);
        references.push(ReferenceInfo {
            name: RefName::new("HEAD")?,
            shorthand: "HEAD".to_string(),
            target: inner.head_target(),
            kind: ReferenceKind::Other,
            symbolic: true,
        });
        references.extend(inner.references.iter().cloned());
        Ok(references)
    }

    fn diff(&self, _base: &Oid, _target: &Oid) -> EngineResult<Diff> {
        self.check_fail(MockCall::Diff)?;
        self.require_repository()?;
        Ok(Diff::default())
    }

    fn remotes(&self) -> EngineResult<Vec<Remote>> {
        self.check_fail(MockCall::Remotes)?;
        Ok(self.lock().remotes.clone())
    }

    fn add_remote(&self, name: &str, url: &str) -> EngineResult<Remote> {
        self.record(MockOperation::AddRemote {
            name: name.to_string(),
            url: url.to_string(),
        });
        self.check_fail(MockCall::AddRemote)?;

        let mut inner = self.lock();
        if inner.remotes.iter().any(|r| r.name == name) {
            return Err(EngineError::new(
                EngineError::EXISTS,
                format!("remote '{}' already exists", name),
            ));
        }
        let remote = Remote {
            name: name.to_string(),
            url: url.to_string(),
        };
        inner.remotes.push(remote.clone());
        Ok(remote)
    }

    fn remove_remote(&self, name: &str) -> EngineResult<()> {
        self.record(MockOperation::RemoveRemote {
            name: name.to_string(),
        });
        self.check_fail(MockCall::RemoveRemote)?;

        let mut inner = self.lock();
        let before = inner.remotes.len();
        inner.remotes.retain(|r| r.name != name);
        if inner.remotes.len() == before {
            return Err(EngineError::not_found(format!("remote '{}' does not exist", name)));
        }
        let prefix = format!("refs/remotes/{}/", name);
        inner.references.retain(|r| !r.name.as_str().starts_with(&prefix));
        Ok(())
    }

    fn signature(&self) -> EngineResult<Option<Signature>> {
        self.check_fail(MockCall::Signature)?;
        Ok(self.lock().signature.clone())
    }

    fn set_signature(&self, name: &str, email: &str) -> EngineResult<()> {
        self.record(MockOperation::SetSignature {
            name: name.to_string(),
            email: email.to_string(),
        });
        self.check_fail(MockCall::SetSignature)?;
        self.lock().signature = Some(Signature {
            name: name.to_string(),
            email: email.to_string(),
        });
        Ok(())
    }

    fn stage(&self, path: &str) -> EngineResult<()> {
        self.record(MockOperation::Stage {
            path: path.to_string(),
        });
        self.check_fail(MockCall::Stage)?;
        self.require_repository()?;

        let mut inner = self.lock();
        inner.unstaged.retain(|p| p != path);
        if !inner.staged.iter().any(|p| p == path) {
            inner.staged.push(path.to_string());
        }
        Ok(())
    }

    fn unstage(&self, path: &str) -> EngineResult<()> {
        self.record(MockOperation::Unstage {
            path: path.to_string(),
        });
        self.check_fail(MockCall::Unstage)?;
        self.require_repository()?;

        let mut inner = self.lock();
        inner.staged.retain(|p| p != path);
        if !inner.unstaged.iter().any(|p| p == path) {
            inner.unstaged.push(path.to_string());
        }
        Ok(())
    }

    fn commit(&self, message: &str) -> EngineResult<Oid> {
        self.record(MockOperation::Commit {
            message: message.to_string(),
        });
        self.check_fail(MockCall::Commit)?;
        self.require_repository()?;
        self.commit_locked(message)
    }

    fn create_branch(&self, name: &str, from: &Oid) -> EngineResult<()> {
        self.record(MockOperation::CreateBranch {
            name: name.to_string(),
            from: from.clone(),
        });
        self.check_fail(MockCall::CreateBranch)?;
        self.require_repository()?;

        let refname = RefName::new(format!("refs/heads/{}", name))?;
        let mut inner = self.lock();
        if inner.has_reference(&refname) {
            return Err(EngineError::new(
                EngineError::EXISTS,
                format!("a reference with name '{}' already exists", refname),
            ));
        }
        inner.set_reference(&refname, from.clone());
        Ok(())
    }

    fn create_local_tracking_branch(&self, remote_ref: &RefName) -> EngineResult<()> {
        self.record(MockOperation::CreateLocalTrackingBranch {
            remote_ref: remote_ref.clone(),
        });
        self.check_fail(MockCall::CreateLocalTrackingBranch)?;
        self.require_repository()?;

        let local = remote_ref
            .strip_prefix("refs/remotes/")
            .and_then(|rest| rest.split_once('/'))
            .map(|(_, branch)| branch.to_string())
            .ok_or_else(|| {
                EngineError::invalid(format!("'{}' is not a remote-tracking reference", remote_ref))
            })?;
        let local = RefName::new(format!("refs/heads/{}", local))?;

        let mut inner = self.lock();
        if inner.has_reference(&local) {
            return Ok(());
        }
        let target = inner
            .references
            .iter()
            .find(|r| &r.name == remote_ref)
            .and_then(|r| r.target.clone())
            .ok_or_else(|| EngineError::not_found(format!("reference '{}' not found", remote_ref)))?;
        inner.set_reference(&local, target);
        Ok(())
    }

    fn create_lightweight_tag(&self, name: &str, from: &Oid) -> EngineResult<()> {
        self.record(MockOperation::CreateLightweightTag {
            name: name.to_string(),
            from: from.clone(),
        });
        self.check_fail(MockCall::CreateLightweightTag)?;
        self.require_repository()?;

        let refname = RefName::for_tag(name)?;
        let mut inner = self.lock();
        if inner.has_reference(&refname) {
            return Err(EngineError::new(
                EngineError::EXISTS,
                format!("tag '{}' already exists", name),
            ));
        }
        inner.set_reference(&refname, from.clone());
        Ok(())
    }

    fn remove_reference(&self, reference: &RefName) -> EngineResult<()> {
        self.record(MockOperation::RemoveReference {
            reference: reference.clone(),
        });
        self.check_fail(MockCall::RemoveReference)?;
        self.require_repository()?;

        let mut inner = self.lock();
        if !inner.has_reference(reference) {
            return Err(EngineError::not_found(format!(
                "reference '{}' not found",
                reference
            )));
        }
        inner.references.retain(|r| &r.name != reference);
        Ok(())
    }

    fn reset(&self, commit: &Oid, progress: &mut dyn CheckoutObserver) -> EngineResult<()> {
        self.record(MockOperation::Reset {
            commit: commit.clone(),
        });
        self.check_fail(MockCall::Reset)?;
        self.require_repository()?;

        {
            let mut inner = self.lock();
            let head = RefName::new(format!("refs/heads/{}", inner.head))?;
            inner.set_reference(&head, commit.clone());
            inner.staged.clear();
            inner.unstaged.clear();
        }
        self.stream_checkout(progress);
        Ok(())
    }

    fn checkout(
        &self,
        reference: &RefName,
        progress: &mut dyn CheckoutObserver,
    ) -> EngineResult<()> {
        self.record(MockOperation::Checkout {
            reference: reference.clone(),
        });
        self.check_fail(MockCall::Checkout)?;
        self.require_repository()?;

        {
            let mut inner = self.lock();
            if !inner.has_reference(reference) {
                return Err(EngineError::not_found(format!(
                    "reference '{}' not found",
                    reference
                )));
            }
            inner.head = shorthand(reference);
        }
        self.stream_checkout(progress);
        Ok(())
    }

    fn merge(&self, references: &[RefName], progress: &mut dyn MergeObserver) -> EngineResult<()> {
        self.record(MockOperation::Merge {
            references: references.to_vec(),
        });
        self.check_fail(MockCall::Merge)?;
        self.require_repository()?;

        let analysis = self.lock().merge_analysis;
        progress.set_merge_analysis_result(analysis);
        // Up-to-date: nothing to check out
        if analysis == 2 {
            return Ok(());
        }

        self.lock().state_code = 1;
        self.stream_checkout(progress);
        Ok(())
    }

    fn clone_repository(&self, url: &str, progress: &dyn RemoteObserver) -> EngineResult<()> {
        self.record(MockOperation::Clone {
            url: url.to_string(),
        });
        self.check_fail(MockCall::Clone)?;

        self.run_remote_script(progress)?;

        let mut inner = self.lock();
        inner.exists = true;
        if !inner.remotes.iter().any(|r| r.name == "origin") {
            inner.remotes.push(Remote {
                name: "origin".to_string(),
                url: url.to_string(),
            });
        }
        Ok(())
    }

    fn push(&self, remote: &Remote, force: bool, progress: &dyn RemoteObserver) -> EngineResult<()> {
        self.record(MockOperation::Push {
            remote: remote.name.clone(),
            force,
        });
        self.check_fail(MockCall::Push)?;
        self.run_remote_script(progress)
    }

    fn fetch(&self, remote: &Remote, progress: &dyn RemoteObserver) -> EngineResult<()> {
        self.record(MockOperation::Fetch {
            remote: remote.name.clone(),
        });
        self.check_fail(MockCall::Fetch)?;
        self.run_remote_script(progress)
    }
}
