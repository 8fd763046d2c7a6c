//! git::interface
//!
//! The libgit2-backed engine.
//!
//! # Handles
//!
//! `git2::Repository` is `Send` but not `Sync`. The engine keeps one handle
//! behind a mutex for consumer-side calls, and network operations open a
//! dedicated handle on the worker so a long fetch never blocks `status`.
//!
//! # Progress
//!
//! Checkout progress is forwarded from libgit2's checkout callback. The
//! bindings expose no checkout perf counters, so the final perf report is
//! all zeros; it still marks the operation finished. Network callbacks are
//! forwarded one-to-one, and every callback that can abort checks the
//! observer's cancellation flag.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::DateTime;
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{BranchType, Cred, CredentialType, ErrorCode, RemoteCallbacks};

use crate::core::types::{Oid, RefName};
use crate::credentials::{Credential, Secret};
use crate::engine::{
    ChangeKind, CheckoutObserver, CheckoutPerf, CommitRecord, Diff, DiffDelta, DiffHunk, DiffLine,
    Engine, EngineError, EngineResult, MergeObserver, PushUpdate, ReferenceInfo, ReferenceKind,
    Remote, RemoteObserver, Signature, StatusReport, TransferProgress,
};

impl From<git2::Error> for EngineError {
    fn from(err: git2::Error) -> Self {
        EngineError::new(err.raw_code(), err.message())
            .with_detail(err.raw_class() as i32, err.message())
    }
}

fn to_oid(id: git2::Oid) -> EngineResult<Oid> {
    Ok(Oid::new(id.to_string())?)
}

fn to_git2_oid(id: &Oid) -> EngineResult<git2::Oid> {
    Ok(git2::Oid::from_str(id.as_str())?)
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Engine bound to one on-disk location, backed by libgit2.
pub struct Git2Engine {
    path: PathBuf,
    repo: Mutex<Option<git2::Repository>>,
}

impl std::fmt::Debug for Git2Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git2Engine")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Git2Engine {
    /// Bind to `path`. Nothing is opened until `open`, `create` or `clone_repository`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            repo: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Option<git2::Repository>> {
        // libgit2 state is not left half-written by a panicking reader
        self.repo.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `f` against the consumer-side handle, opening it on first use.
    fn with_repo<T>(
        &self,
        f: impl FnOnce(&mut git2::Repository) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let mut guard = self.lock();
        if guard.is_none() {
            *guard = Some(git2::Repository::open(&self.path)?);
        }
        match guard.as_mut() {
            Some(repo) => f(repo),
            None => Err(EngineError::not_found(format!(
                "no repository at '{}'",
                self.path.display()
            ))),
        }
    }

    /// A separate handle for the worker thread.
    fn network_handle(&self) -> EngineResult<git2::Repository> {
        Ok(git2::Repository::open(&self.path)?)
    }
}

fn head_commit(repo: &git2::Repository) -> EngineResult<Option<git2::Commit<'_>>> {
    match repo.head() {
        Ok(head) => Ok(Some(head.peel_to_commit()?)),
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn current_branch(repo: &git2::Repository) -> EngineResult<String> {
    match repo.head() {
        Ok(head) => Ok(head.shorthand().unwrap_or("HEAD").to_string()),
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
            // Unborn: HEAD still names the branch it will create
            let head = repo.find_reference("HEAD")?;
            Ok(head
                .symbolic_target()
                .and_then(|t| t.strip_prefix("refs/heads/"))
                .unwrap_or("HEAD")
                .to_string())
        }
        Err(e) => Err(e.into()),
    }
}

fn state_code(state: git2::RepositoryState) -> i32 {
    use git2::RepositoryState as S;
    match state {
        S::Clean => 0,
        S::Merge => 1,
        S::Revert => 2,
        S::RevertSequence => 3,
        S::CherryPick => 4,
        S::CherryPickSequence => 5,
        S::Bisect => 6,
        S::Rebase => 7,
        S::RebaseInteractive => 8,
        S::RebaseMerge => 9,
        S::ApplyMailbox => 10,
        S::ApplyMailboxOrRebase => 11,
    }
}

fn change_kind(delta: git2::Delta) -> ChangeKind {
    use git2::Delta as D;
    match delta {
        D::Unmodified => ChangeKind::Unmodified,
        D::Added => ChangeKind::Added,
        D::Deleted => ChangeKind::Deleted,
        D::Modified => ChangeKind::Modified,
        D::Renamed => ChangeKind::Renamed,
        D::Copied => ChangeKind::Copied,
        D::Ignored => ChangeKind::Ignored,
        D::Untracked => ChangeKind::Untracked,
        D::Typechange => ChangeKind::TypeChange,
        D::Unreadable => ChangeKind::Unreadable,
        D::Conflicted => ChangeKind::Conflicted,
    }
}

fn file_path(file: &git2::DiffFile<'_>) -> Option<String> {
    if !file.exists() {
        return None;
    }
    file.path().map(|p| p.to_string_lossy().into_owned())
}

fn convert_diff(diff: &git2::Diff<'_>) -> EngineResult<Diff> {
    let mut deltas = Vec::with_capacity(diff.deltas().len());

    for index in 0..diff.deltas().len() {
        let Some(delta) = diff.get_delta(index) else {
            continue;
        };

        let mut hunks = Vec::new();
        if let Some(patch) = git2::Patch::from_diff(diff, index)? {
            for hunk_index in 0..patch.num_hunks() {
                let (hunk, line_count) = patch.hunk(hunk_index)?;
                let mut lines = Vec::with_capacity(line_count);
                for line_index in 0..line_count {
                    let line = patch.line_in_hunk(hunk_index, line_index)?;
                    lines.push(DiffLine {
                        origin: line.origin(),
                        text: String::from_utf8_lossy(line.content()).into_owned(),
                    });
                }
                hunks.push(DiffHunk {
                    header: String::from_utf8_lossy(hunk.header()).into_owned(),
                    lines,
                });
            }
        }

        deltas.push(DiffDelta {
            kind: change_kind(delta.status()),
            old_path: file_path(&delta.old_file()),
            new_path: file_path(&delta.new_file()),
            hunks,
        });
    }

    Ok(Diff { deltas })
}

fn commit_record(commit: &git2::Commit<'_>) -> EngineResult<CommitRecord> {
    let author = commit.author();
    let time = DateTime::from_timestamp(author.when().seconds(), 0).unwrap_or(DateTime::UNIX_EPOCH);

    Ok(CommitRecord {
        id: to_oid(commit.id())?,
        parents: commit
            .parent_ids()
            .map(to_oid)
            .collect::<EngineResult<Vec<_>>>()?,
        summary: commit.summary().unwrap_or("").to_string(),
        message: commit.message().unwrap_or("").to_string(),
        author: Signature {
            name: author.name().unwrap_or("").to_string(),
            email: author.email().unwrap_or("").to_string(),
        },
        time,
    })
}

/// Collapse libgit2's analysis bit set to the single most specific value.
fn classify_merge(analysis: git2::MergeAnalysis) -> i32 {
    if analysis.is_up_to_date() {
        git2::MergeAnalysis::ANALYSIS_UP_TO_DATE.bits() as i32
    } else if analysis.is_unborn() {
        git2::MergeAnalysis::ANALYSIS_UNBORN.bits() as i32
    } else if analysis.is_fast_forward() {
        git2::MergeAnalysis::ANALYSIS_FASTFORWARD.bits() as i32
    } else if analysis.is_normal() {
        git2::MergeAnalysis::ANALYSIS_NORMAL.bits() as i32
    } else {
        0
    }
}

/// Checkout options that stream progress into `observer`.
fn checkout_progress<'a, O>(observer: &'a mut O) -> CheckoutBuilder<'a>
where
    O: CheckoutObserver + ?Sized,
{
    let mut builder = CheckoutBuilder::new();
    builder.progress(move |path, completed, total| {
        observer.on_checkout_progress(path.and_then(Path::to_str), completed, total)
    });
    builder
}

fn credential_for(
    credential: &Credential,
    username_from_url: Option<&str>,
    allowed: CredentialType,
) -> Result<Cred, git2::Error> {
    match &credential.secret {
        Secret::Password { username, password }
            if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) =>
        {
            Cred::userpass_plaintext(username, password)
        }
        Secret::Ssh {
            public_key,
            private_key,
        } if allowed.intersects(CredentialType::SSH_KEY | CredentialType::SSH_MEMORY) => {
            Cred::ssh_key_from_memory(
                username_from_url.unwrap_or("git"),
                Some(public_key.as_str()),
                private_key,
                None,
            )
        }
        _ => Err(git2::Error::from_str(&format!(
            "credential '{}' ({}) does not fit the authentication the remote requested",
            credential.id,
            credential.kind()
        ))),
    }
}

/// Forward every libgit2 network callback to `observer`.
fn remote_callbacks(observer: &dyn RemoteObserver) -> RemoteCallbacks<'_> {
    let mut callbacks = RemoteCallbacks::new();

    let mut attempts = 0u32;
    callbacks.credentials(move |url, username_from_url, allowed| {
        attempts += 1;
        // libgit2 keeps asking while the remote rejects; one try per credential
        if attempts > 1 {
            return Err(git2::Error::from_str("the remote rejected the stored credential"));
        }
        match observer.credential() {
            Some(credential) => {
                tracing::debug!(url, id = %credential.id, "supplying stored credential");
                credential_for(&credential, username_from_url, allowed)
            }
            None => {
                observer.must_supply_credential();
                Err(git2::Error::from_str("authentication required but no credential matched"))
            }
        }
    });

    callbacks.transfer_progress(move |stats| {
        observer.on_transfer_progress(TransferProgress {
            total_objects: count(stats.total_objects()),
            indexed_objects: count(stats.indexed_objects()),
            received_objects: count(stats.received_objects()),
            local_objects: count(stats.local_objects()),
            total_deltas: count(stats.total_deltas()),
            indexed_deltas: count(stats.indexed_deltas()),
            received_bytes: stats.received_bytes(),
        });
        !observer.is_cancelled()
    });

    callbacks.sideband_progress(move |data| {
        observer.on_sideband_progress(&String::from_utf8_lossy(data));
        !observer.is_cancelled()
    });

    callbacks.update_tips(move |refname, old, new| {
        match (to_oid(old), to_oid(new)) {
            (Ok(old), Ok(new)) => observer.on_update_tips(refname, old, new),
            (Err(e), _) | (_, Err(e)) => observer.on_error(e),
        }
        true
    });

    callbacks.pack_progress(move |stage, current, total| {
        let stage = match stage {
            git2::PackBuilderStage::AddingObjects => 0,
            git2::PackBuilderStage::Deltafication => 1,
        };
        observer.on_pack_progress(stage, count(current), count(total));
    });

    callbacks.push_transfer_progress(move |current, total, bytes| {
        observer.on_push_transfer_progress(count(current), count(total), bytes);
    });

    callbacks.push_negotiation(move |updates| {
        let mut negotiated = Vec::with_capacity(updates.len());
        for update in updates {
            match (to_oid(update.src()), to_oid(update.dst())) {
                (Ok(src), Ok(dst)) => negotiated.push(PushUpdate {
                    src_refname: update.src_refname().unwrap_or_default().to_string(),
                    dst_refname: update.dst_refname().unwrap_or_default().to_string(),
                    src,
                    dst,
                }),
                (Err(e), _) | (_, Err(e)) => observer.on_error(e),
            }
        }
        observer.on_push_negotiation(negotiated);
        if observer.is_cancelled() {
            Err(git2::Error::from_str("push cancelled"))
        } else {
            Ok(())
        }
    });

    callbacks.push_update_reference(move |refname, status| {
        observer.on_push_update_reference(refname, status);
        Ok(())
    });

    callbacks
}

/// Map a network failure, reporting an abort requested by the caller as
/// cancellation.
fn network_result<T>(
    result: Result<T, git2::Error>,
    observer: &dyn RemoteObserver,
) -> EngineResult<T> {
    result.map_err(|e| {
        if observer.is_cancelled() {
            EngineError::cancelled()
        } else {
            e.into()
        }
    })
}

impl Engine for Git2Engine {
    fn open(&self) -> EngineResult<()> {
        let repo = git2::Repository::open(&self.path)?;
        *self.lock() = Some(repo);
        tracing::debug!(path = %self.path.display(), "opened repository");
        Ok(())
    }

    fn create(&self) -> EngineResult<()> {
        let repo = git2::Repository::init(&self.path)?;
        *self.lock() = Some(repo);
        tracing::info!(path = %self.path.display(), "created repository");
        Ok(())
    }

    fn exists(&self) -> bool {
        git2::Repository::open(&self.path).is_ok()
    }

    fn status(&self) -> EngineResult<StatusReport> {
        self.with_repo(|repo| {
            let head_tree = match head_commit(repo)? {
                Some(commit) => Some(commit.tree()?),
                None => None,
            };
            let staged = repo.diff_tree_to_index(head_tree.as_ref(), None, None)?;

            let mut options = git2::DiffOptions::new();
            options
                .include_untracked(true)
                .recurse_untracked_dirs(true)
                .show_untracked_content(true);
            let unstaged = repo.diff_index_to_workdir(None, Some(&mut options))?;

            Ok(StatusReport {
                current_branch: current_branch(repo)?,
                staged: convert_diff(&staged)?,
                unstaged: convert_diff(&unstaged)?,
                state_code: state_code(repo.state()),
            })
        })
    }

    fn log(&self) -> EngineResult<Vec<CommitRecord>> {
        self.with_repo(|repo| {
            let mut walk = repo.revwalk()?;
            walk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME)?;
            if head_commit(repo)?.is_some() {
                walk.push_head()?;
            }
            for glob in ["refs/heads/*", "refs/remotes/*", "refs/tags/*"] {
                walk.push_glob(glob)?;
            }

            let mut commits = Vec::new();
            for id in walk {
                let commit = repo.find_commit(id?)?;
                commits.push(commit_record(&commit)?);
            }
            Ok(commits)
        })
    }

    fn references(&self) -> EngineResult<Vec<ReferenceInfo>> {
        self.with_repo(|repo| {
            let mut references = Vec::new();

            if let Ok(head) = repo.find_reference("HEAD") {
                let target = match head_commit(repo)? {
                    Some(commit) => Some(to_oid(commit.id())?),
                    None => None,
                };
                references.push(ReferenceInfo {
                    name: RefName::new("HEAD")?,
                    shorthand: "HEAD".to_string(),
                    target,
                    kind: ReferenceKind::Other,
                    symbolic: head.kind() == Some(git2::ReferenceType::Symbolic),
                });
            }

            for reference in repo.references()? {
                let reference = reference?;
                let Some(raw_name) = reference.name() else {
                    continue;
                };
                let name = match RefName::new(raw_name) {
                    Ok(name) => name,
                    Err(e) => {
                        tracing::warn!(reference = raw_name, error = %e, "skipping reference");
                        continue;
                    }
                };
                let target = match reference.peel_to_commit() {
                    Ok(commit) => Some(to_oid(commit.id())?),
                    Err(_) => None,
                };
                references.push(ReferenceInfo {
                    shorthand: reference.shorthand().unwrap_or(raw_name).to_string(),
                    kind: ReferenceKind::of(&name),
                    symbolic: reference.kind() == Some(git2::ReferenceType::Symbolic),
                    name,
                    target,
                });
            }
            Ok(references)
        })
    }

    fn diff(&self, base: &Oid, target: &Oid) -> EngineResult<Diff> {
        self.with_repo(|repo| {
            let base_tree = repo.find_commit(to_git2_oid(base)?)?.tree()?;
            let target_tree = repo.find_commit(to_git2_oid(target)?)?.tree()?;
            let diff = repo.diff_tree_to_tree(Some(&base_tree), Some(&target_tree), None)?;
            convert_diff(&diff)
        })
    }

    fn remotes(&self) -> EngineResult<Vec<Remote>> {
        self.with_repo(|repo| {
            let names = repo.remotes()?;
            let mut remotes = Vec::with_capacity(names.len());
            for name in names.iter().flatten() {
                let remote = repo.find_remote(name)?;
                remotes.push(Remote {
                    name: name.to_string(),
                    url: remote.url().unwrap_or_default().to_string(),
                });
            }
            Ok(remotes)
        })
    }

    fn add_remote(&self, name: &str, url: &str) -> EngineResult<Remote> {
        self.with_repo(|repo| {
            repo.remote(name, url)?;
            Ok(Remote {
                name: name.to_string(),
                url: url.to_string(),
            })
        })
    }

    fn remove_remote(&self, name: &str) -> EngineResult<()> {
        self.with_repo(|repo| Ok(repo.remote_delete(name)?))
    }

    fn signature(&self) -> EngineResult<Option<Signature>> {
        self.with_repo(|repo| match repo.signature() {
            Ok(sig) => Ok(Some(Signature {
                name: sig.name().unwrap_or("").to_string(),
                email: sig.email().unwrap_or("").to_string(),
            })),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        })
    }

    fn set_signature(&self, name: &str, email: &str) -> EngineResult<()> {
        self.with_repo(|repo| {
            let mut config = repo.config()?.open_level(git2::ConfigLevel::Local)?;
            config.set_str("user.name", name)?;
            config.set_str("user.email", email)?;
            Ok(())
        })
    }

    fn stage(&self, path: &str) -> EngineResult<()> {
        self.with_repo(|repo| {
            let workdir = repo
                .workdir()
                .ok_or_else(|| EngineError::invalid("cannot stage in a bare repository"))?
                .to_path_buf();
            let mut index = repo.index()?;
            if workdir.join(path).exists() {
                index.add_path(Path::new(path))?;
            } else {
                index.remove_path(Path::new(path))?;
            }
            index.write()?;
            Ok(())
        })
    }

    fn unstage(&self, path: &str) -> EngineResult<()> {
        self.with_repo(|repo| {
            let head = head_commit(repo)?;
            repo.reset_default(head.as_ref().map(|c| c.as_object()), [path])?;
            Ok(())
        })
    }

    fn commit(&self, message: &str) -> EngineResult<Oid> {
        self.with_repo(|repo| {
            let merging = repo.state() == git2::RepositoryState::Merge;
            let mut merge_heads = Vec::new();
            if merging {
                repo.mergehead_foreach(|id| {
                    merge_heads.push(*id);
                    true
                })?;
            }

            let signature = repo.signature()?;
            let tree_id = repo.index()?.write_tree()?;
            let tree = repo.find_tree(tree_id)?;

            let mut parents: Vec<git2::Commit<'_>> = head_commit(repo)?.into_iter().collect();
            for id in merge_heads {
                parents.push(repo.find_commit(id)?);
            }
            let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();

            let id = repo.commit(
                Some("HEAD"),
                &signature,
                &signature,
                message,
                &tree,
                &parent_refs,
            )?;
            if merging {
                repo.cleanup_state()?;
            }
            tracing::debug!(id = %id, parents = parent_refs.len(), "committed");
            to_oid(id)
        })
    }

    fn create_branch(&self, name: &str, from: &Oid) -> EngineResult<()> {
        self.with_repo(|repo| {
            let commit = repo.find_commit(to_git2_oid(from)?)?;
            repo.branch(name, &commit, false)?;
            Ok(())
        })
    }

    fn create_local_tracking_branch(&self, remote_ref: &RefName) -> EngineResult<()> {
        let upstream = remote_ref.strip_prefix("refs/remotes/").ok_or_else(|| {
            EngineError::invalid(format!("'{}' is not a remote-tracking reference", remote_ref))
        })?;
        let (_, local) = upstream.split_once('/').ok_or_else(|| {
            EngineError::invalid(format!("'{}' names no branch", remote_ref))
        })?;

        self.with_repo(|repo| {
            if repo.find_branch(local, BranchType::Local).is_ok() {
                return Ok(());
            }
            let commit = repo.find_reference(remote_ref.as_str())?.peel_to_commit()?;
            let mut branch = repo.branch(local, &commit, false)?;
            branch.set_upstream(Some(upstream))?;
            Ok(())
        })
    }

    fn create_lightweight_tag(&self, name: &str, from: &Oid) -> EngineResult<()> {
        self.with_repo(|repo| {
            let object = repo.find_object(to_git2_oid(from)?, None)?;
            repo.tag_lightweight(name, &object, false)?;
            Ok(())
        })
    }

    fn remove_reference(&self, reference: &RefName) -> EngineResult<()> {
        self.with_repo(|repo| {
            repo.find_reference(reference.as_str())?.delete()?;
            Ok(())
        })
    }

    fn reset(&self, commit: &Oid, progress: &mut dyn CheckoutObserver) -> EngineResult<()> {
        self.with_repo(|repo| {
            let object = repo.find_object(to_git2_oid(commit)?, None)?;
            {
                let mut checkout = checkout_progress(&mut *progress);
                repo.reset(&object, git2::ResetType::Hard, Some(&mut checkout))?;
            }
            progress.on_checkout_perf_data(CheckoutPerf::default());
            Ok(())
        })
    }

    fn checkout(
        &self,
        reference: &RefName,
        progress: &mut dyn CheckoutObserver,
    ) -> EngineResult<()> {
        self.with_repo(|repo| {
            let commit = repo.find_reference(reference.as_str())?.peel_to_commit()?;
            {
                let mut checkout = checkout_progress(&mut *progress);
                repo.checkout_tree(commit.as_object(), Some(&mut checkout))?;
            }
            repo.set_head(reference.as_str())?;
            progress.on_checkout_perf_data(CheckoutPerf::default());
            Ok(())
        })
    }

    fn merge(&self, references: &[RefName], progress: &mut dyn MergeObserver) -> EngineResult<()> {
        self.with_repo(|repo| {
            let mut annotated = Vec::with_capacity(references.len());
            for name in references {
                let reference = repo.find_reference(name.as_str())?;
                annotated.push(repo.reference_to_annotated_commit(&reference)?);
            }
            let heads: Vec<&git2::AnnotatedCommit<'_>> = annotated.iter().collect();

            let (analysis, _) = repo.merge_analysis(&heads)?;
            progress.set_merge_analysis_result(classify_merge(analysis));

            if analysis.is_up_to_date() {
                return Ok(());
            }
            if analysis.is_unborn() {
                return Err(EngineError::invalid("cannot merge into an unborn branch"));
            }

            {
                let mut checkout = checkout_progress(&mut *progress);
                repo.merge(&heads, None, Some(&mut checkout))?;
            }
            progress.on_checkout_perf_data(CheckoutPerf::default());
            Ok(())
        })
    }

    fn clone_repository(&self, url: &str, progress: &dyn RemoteObserver) -> EngineResult<()> {
        let mut fetch = git2::FetchOptions::new();
        fetch.remote_callbacks(remote_callbacks(progress));

        let mut builder = RepoBuilder::new();
        builder.fetch_options(fetch);
        let repo = network_result(builder.clone(url, &self.path), progress)?;

        *self.lock() = Some(repo);
        tracing::info!(url, path = %self.path.display(), "cloned repository");
        Ok(())
    }

    fn push(&self, remote: &Remote, force: bool, progress: &dyn RemoteObserver) -> EngineResult<()> {
        let repo = self.network_handle()?;

        let mut refspecs = Vec::new();
        for branch in repo.branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            if let Some(name) = branch.get().name() {
                let prefix = if force { "+" } else { "" };
                refspecs.push(format!("{prefix}{name}:{name}"));
            }
        }

        let mut git_remote = match repo.find_remote(&remote.name) {
            Ok(found) => found,
            Err(e) if e.code() == ErrorCode::NotFound => repo.remote_anonymous(&remote.url)?,
            Err(e) => return Err(e.into()),
        };

        let mut options = git2::PushOptions::new();
        options.remote_callbacks(remote_callbacks(progress));
        network_result(git_remote.push(&refspecs, Some(&mut options)), progress)
    }

    fn fetch(&self, remote: &Remote, progress: &dyn RemoteObserver) -> EngineResult<()> {
        let repo = self.network_handle()?;
        let mut git_remote = match repo.find_remote(&remote.name) {
            Ok(found) => found,
            Err(e) if e.code() == ErrorCode::NotFound => repo.remote_anonymous(&remote.url)?,
            Err(e) => return Err(e.into()),
        };

        let mut options = git2::FetchOptions::new();
        options.remote_callbacks(remote_callbacks(progress));
        let refspecs: &[&str] = &[];
        network_result(git_remote.fetch(refspecs, Some(&mut options), None), progress)
    }
}
