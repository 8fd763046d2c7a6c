//! Integration tests for the libgit2 engine behind the controller.
//!
//! These tests use real repositories created in temp directories. Remotes
//! are local paths, which need no network transport.

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use repoview::core::types::{BranchName, Oid, RefName};
use repoview::credentials::CredentialStore;
use repoview::engine::{ChangeKind, Engine, MergeAnalysis};
use repoview::git::Git2Engine;
use repoview::state::{Repository, Worker};

/// A repository with one commit, driven through the controller.
struct TestRepo {
    dir: TempDir,
    repo: Repository,
}

impl TestRepo {
    fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let mut repo = controller(dir.path());
        repo.create().expect("init");
        repo.set_signature("Test User", "test@example.com")
            .expect("signature");

        let mut fixture = Self { dir, repo };
        fixture.commit_file("README.md", "# Test Repo\n", "Initial commit");
        fixture.repo.refresh_all();
        fixture
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn commit_file(&mut self, name: &str, content: &str, message: &str) -> Oid {
        std::fs::write(self.dir.path().join(name), content).expect("write file");
        self.repo.stage(name).expect("stage");
        self.repo.commit(message).expect("commit")
    }

    fn branch(&self) -> String {
        self.repo.status().current_branch.clone()
    }

    fn branch_ref(&self) -> RefName {
        RefName::new(format!("refs/heads/{}", self.branch())).unwrap()
    }
}

fn controller(path: &Path) -> Repository {
    Repository::with_worker(
        Arc::new(Git2Engine::new(path)),
        CredentialStore::in_memory(),
        Worker::owned(1).expect("worker runtime"),
    )
}

fn url(path: &Path) -> String {
    path.to_str().expect("utf-8 temp path").to_string()
}

#[test]
fn create_stage_commit() {
    let mut test = TestRepo::new();
    assert!(test.repo.has_repository());

    std::fs::write(test.path().join("notes.txt"), "a\n").unwrap();
    test.repo.refresh_all();
    assert_eq!(test.repo.status().unstaged.paths(), vec!["notes.txt"]);

    test.repo.stage("notes.txt").unwrap();
    let staged = &test.repo.status().staged;
    assert_eq!(staged.paths(), vec!["notes.txt"]);
    assert_eq!(staged.deltas[0].kind, ChangeKind::Added);

    let id = test.repo.commit("Add notes").unwrap();
    assert!(test.repo.status().is_clean());

    let graph = test.repo.commit_graph().unwrap();
    assert_eq!(graph.len(), 2);
    assert_eq!(graph.commits()[0].id, id);
    assert_eq!(graph.commits()[0].author.name, "Test User");
}

#[test]
fn branches_tags_and_annotations() {
    let mut test = TestRepo::new();
    let first = test.repo.reference(test.branch_ref().as_str()).unwrap().target.clone().unwrap();
    let second = test.commit_file("b.txt", "b\n", "Second");

    test.repo
        .create_branch(&BranchName::new("feature").unwrap(), &first)
        .unwrap();
    test.repo.create_lightweight_tag("v0.1", &first).unwrap();

    let mut names: Vec<&str> = test.repo.references_of(&first).iter().map(RefName::as_str).collect();
    names.sort();
    assert_eq!(names, vec!["refs/heads/feature", "refs/tags/v0.1"]);

    let tag = RefName::for_tag("v0.1").unwrap();
    test.repo.remove_reference(&tag).unwrap();
    assert!(test.repo.reference("refs/tags/v0.1").is_none());

    let diff = test.repo.diff(&first, &second).unwrap();
    assert_eq!(diff.paths(), vec!["b.txt"]);
}

#[test]
fn reset_moves_branch_target() {
    let mut test = TestRepo::new();
    let first = test.repo.reference(test.branch_ref().as_str()).unwrap().target.clone().unwrap();
    test.commit_file("b.txt", "b\n", "Second");
    test.repo.refresh_all();

    test.repo.reset(&first).unwrap();

    assert_eq!(
        test.repo.reference(test.branch_ref().as_str()).unwrap().target,
        Some(first)
    );
    assert!(!test.path().join("b.txt").exists());
    assert!(!test.repo.local_progress().in_progress);
}

#[test]
fn merge_then_commit_completes_merge() {
    let mut test = TestRepo::new();
    let base = test.branch_ref();
    let start = test.repo.reference(base.as_str()).unwrap().target.clone().unwrap();

    test.repo
        .create_branch(&BranchName::new("topic").unwrap(), &start)
        .unwrap();
    let topic = RefName::new("refs/heads/topic").unwrap();
    test.repo.checkout(&topic).unwrap();
    test.commit_file("topic.txt", "t\n", "Topic work");
    test.repo.checkout(&base).unwrap();

    test.repo.merge(&[topic]).unwrap();
    assert_eq!(test.repo.local_progress().merge_analysis, MergeAnalysis::FastForward);

    test.repo.commit("Merge topic").unwrap();
    assert!(!test.repo.status().state.is_in_progress());
    assert!(test.path().join("topic.txt").exists());
}

#[test]
fn clone_fetch_and_push_over_local_paths() {
    let mut upstream = TestRepo::new();
    let branch = upstream.branch();

    let workspace = TempDir::new().unwrap();
    let clone_path = workspace.path().join("clone");
    let mut local = controller(&clone_path);
    assert!(!local.has_repository());

    local.clone_from(&url(upstream.path())).unwrap();
    let done = local.wait_remote_blocking().expect("clone completion");
    assert!(done.result.is_ok(), "{:?}", done.result);
    assert!(local.has_repository());
    let tracking = format!("refs/remotes/origin/{}", branch);
    assert!(local.reference(&tracking).is_some());

    // Upstream moves; fetch picks it up
    let moved = upstream.commit_file("later.txt", "later\n", "Later");
    local.fetch(None).unwrap();
    let done = local.wait_remote_blocking().expect("fetch completion");
    assert!(done.result.is_ok(), "{:?}", done.result);
    assert_eq!(local.reference(&tracking).unwrap().target, Some(moved));
    assert!(!local.remote_progress().tip_updates.is_empty());

    // Push everything to a fresh bare remote
    let bare_path = workspace.path().join("bare.git");
    git2::Repository::init_bare(&bare_path).expect("init bare");
    local.add_remote("backup", &url(&bare_path)).unwrap();
    local.push(Some("backup"), false).unwrap();
    let done = local.wait_remote_blocking().expect("push completion");
    assert!(done.result.is_ok(), "{:?}", done.result);
    assert!(local.remote_progress().push_results.iter().all(|r| r.is_accepted()));

    let bare = Git2Engine::new(&bare_path);
    bare.open().unwrap();
    let pushed = bare
        .references()
        .unwrap()
        .into_iter()
        .find(|r| r.name.as_str() == format!("refs/heads/{}", branch));
    let local_head = local.reference(&format!("refs/heads/{}", branch)).unwrap().target.clone();
    assert_eq!(pushed.unwrap().target, local_head);
}

#[test]
fn clone_of_missing_path_reports_error() {
    let workspace = TempDir::new().unwrap();
    let mut local = controller(&workspace.path().join("clone"));

    local
        .clone_from(&url(&workspace.path().join("does-not-exist")))
        .unwrap();
    let done = local.wait_remote_blocking().expect("completion");

    assert!(done.result.is_err());
    assert!(local.remote_error().is_some());
    assert!(!local.has_repository());
}
