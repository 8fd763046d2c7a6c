//! Network operations through the controller: progress, credentials,
//! single-operation guard, cancellation and completion.

use std::sync::mpsc;
use std::sync::Arc;

use repoview::core::types::{Oid, RefName};
use repoview::credentials::{Credential, CredentialStore};
use repoview::engine::mock::{MockEngine, RemoteStep};
use repoview::engine::{Engine, EngineError, PushUpdate, TransferProgress};
use repoview::progress::{
    OperationError, RemoteError, RemoteOperationKind, ABORTED_MESSAGE, UP_TO_DATE_MESSAGE,
};
use repoview::state::{Repository, Worker};

const URL: &str = "https://git.example.com/team/project.git";

fn oid(n: u8) -> Oid {
    Oid::new(format!("{:040x}", n)).unwrap()
}

/// A cloned-looking repository with `origin` configured.
fn setup() -> (MockEngine, Repository) {
    let engine = MockEngine::with_initial_commit();
    engine.add_remote("origin", URL).unwrap();
    let worker = Worker::owned(2).expect("worker runtime");
    let mut repo = Repository::with_worker(
        Arc::new(engine.clone()),
        CredentialStore::in_memory(),
        worker,
    );
    repo.refresh_all();
    (engine, repo)
}

#[test]
fn fetch_moves_remote_tips() {
    let (engine, mut repo) = setup();
    let tip = oid(0x42);
    engine.script_remote(vec![
        RemoteStep::Sideband("Counting objects: 3, done.\n".into()),
        RemoteStep::Transfer(TransferProgress {
            total_objects: 3,
            received_objects: 3,
            indexed_objects: 3,
            received_bytes: 512,
            ..TransferProgress::default()
        }),
        RemoteStep::UpdateTip {
            refname: "refs/remotes/origin/main".into(),
            old: Oid::zero(),
            new: tip.clone(),
        },
    ]);

    repo.fetch(None).unwrap();
    assert!(repo.remote_progress().in_progress);
    assert_eq!(repo.remote_progress().label, "Fetching from origin");

    let done = repo.wait_remote_blocking().expect("completion");
    assert_eq!(done.kind, RemoteOperationKind::Fetch);
    assert!(done.result.is_ok());

    let progress = repo.remote_progress();
    assert!(!progress.in_progress);
    assert_eq!(progress.message.as_deref(), Some("Remote: Counting objects: 3, done."));
    assert_eq!(progress.transfer.received_objects, 3);
    assert!(progress.fetch_transfer_in_progress);
    assert_eq!(progress.tip_updates.len(), 1);

    let tracked = repo.reference("refs/remotes/origin/main").expect("new remote ref listed");
    assert_eq!(tracked.target, Some(tip.clone()));
    assert_eq!(repo.references_of(&tip).len(), 1);
    assert!(repo.remote_error().is_none());
}

#[test]
fn completion_is_delivered_once() {
    let (_engine, mut repo) = setup();
    let before = repo.versions();

    repo.fetch(None).unwrap();
    assert!(repo.wait_remote_blocking().is_some());
    assert!(repo.process_remote_events().is_none());
    assert!(repo.wait_remote_blocking().is_none());

    assert!(!repo.remote_progress().in_progress);
    let after = repo.versions();
    assert_eq!(after.reference_list, before.reference_list + 1);
    assert_eq!(after.reference_targets, before.reference_targets + 1);
    assert_eq!(after.existence, before.existence);
    assert_eq!(after.status, before.status);
}

#[test]
fn clone_completion_rechecks_existence_once() {
    let engine = MockEngine::new();
    let worker = Worker::owned(1).expect("worker runtime");
    let mut repo = Repository::with_worker(
        Arc::new(engine.clone()),
        CredentialStore::in_memory(),
        worker,
    );
    let before = repo.versions();

    repo.clone_from(URL).unwrap();
    assert!(repo.wait_remote_blocking().is_some());
    assert!(repo.process_remote_events().is_none());

    assert!(!repo.remote_progress().in_progress);
    let after = repo.versions();
    assert_eq!(after.existence, before.existence + 1);
    assert_eq!(after.reference_list, before.reference_list + 1);
    assert_eq!(after.reference_targets, before.reference_targets + 1);
}

#[test]
fn panicking_job_still_completes() {
    let engine = MockEngine::new();
    let worker = Worker::owned(1).expect("worker runtime");
    let mut repo = Repository::with_worker(
        Arc::new(engine.clone()),
        CredentialStore::in_memory(),
        worker,
    );
    engine.script_remote(vec![RemoteStep::Panic("transport blew up".into())]);

    repo.clone_from(URL).unwrap();
    let done = repo.wait_remote_blocking().expect("completion");

    assert_eq!(done.kind, RemoteOperationKind::Clone);
    assert_eq!(done.result.unwrap_err().message, ABORTED_MESSAGE);
    assert!(!repo.remote_progress().in_progress);
    assert_eq!(repo.remote_error().unwrap().message(), ABORTED_MESSAGE);

    // The coordinator is free for the next operation
    repo.clone_from(URL).unwrap();
    let done = repo.wait_remote_blocking().expect("completion");
    assert!(done.result.is_ok());
    assert!(repo.has_repository());
}

#[test]
fn empty_push_negotiation_reports_up_to_date() {
    let (engine, mut repo) = setup();
    engine.script_remote(vec![RemoteStep::Negotiation(Vec::new())]);

    repo.push(None, false).unwrap();
    repo.wait_remote_blocking().expect("completion");

    assert_eq!(repo.remote_progress().message.as_deref(), Some(UP_TO_DATE_MESSAGE));
}

#[test]
fn push_collects_per_reference_results() {
    let (engine, mut repo) = setup();
    let local = engine.head_commit().unwrap();
    engine.script_remote(vec![
        RemoteStep::Negotiation(vec![PushUpdate {
            src_refname: "refs/heads/main".into(),
            dst_refname: "refs/heads/main".into(),
            src: Oid::zero(),
            dst: local,
        }]),
        RemoteStep::Pack {
            stage: 1,
            current: 2,
            total: 2,
        },
        RemoteStep::PushTransfer {
            current: 2,
            total: 2,
            bytes: 300,
        },
        RemoteStep::PushUpdateReference {
            refname: "refs/heads/main".into(),
            status: None,
        },
        RemoteStep::PushUpdateReference {
            refname: "refs/heads/release".into(),
            status: Some("non-fast-forward".into()),
        },
    ]);

    repo.push(Some("origin"), false).unwrap();
    let done = repo.wait_remote_blocking().expect("completion");
    assert_eq!(done.kind, RemoteOperationKind::Push);

    let progress = repo.remote_progress();
    assert_eq!(progress.push_updates.len(), 1);
    assert!(progress.packing_in_progress);
    assert_eq!(progress.push_transfer.bytes, 300);
    let accepted: Vec<bool> = progress.push_results.iter().map(|r| r.is_accepted()).collect();
    assert_eq!(accepted, vec![true, false]);
}

#[test]
fn missing_credential_is_reported_first() {
    let (engine, mut repo) = setup();
    engine.script_remote(vec![RemoteStep::RequireCredential]);

    repo.fetch(None).unwrap();
    let done = repo.wait_remote_blocking().expect("completion");

    assert!(done.result.is_err());
    let error = repo.remote_error().expect("error recorded");
    assert_eq!(*error, OperationError::CredentialRequired);
    assert_eq!(error.code(), -1);
    assert_eq!(error.message(), "Credential is required!");
}

#[test]
fn stored_credential_matching_url_is_used() {
    let (engine, mut repo) = setup();
    repo.credentials_mut()
        .add_or_update(
            None,
            Credential::password("work", "https://git.example.com/", "me", "s3cret"),
        )
        .unwrap();
    engine.script_remote(vec![RemoteStep::RequireCredential]);

    repo.fetch(None).unwrap();
    let done = repo.wait_remote_blocking().expect("completion");

    assert!(done.result.is_ok());
    assert!(repo.remote_error().is_none());
}

#[test]
fn second_start_is_rejected_while_running() {
    let (engine, mut repo) = setup();
    let (release, paused) = mpsc::channel();
    engine.script_remote(vec![RemoteStep::Pause(paused)]);

    repo.fetch(None).unwrap();
    let err = repo.push(None, false).unwrap_err();
    assert!(matches!(err, RemoteError::OperationInProgress(RemoteOperationKind::Fetch)));
    // The running operation is untouched
    assert_eq!(repo.remote_progress().kind, Some(RemoteOperationKind::Fetch));

    release.send(()).unwrap();
    let done = repo.wait_remote_blocking().expect("completion");
    assert_eq!(done.kind, RemoteOperationKind::Fetch);

    // Free again
    repo.push(None, false).unwrap();
    repo.wait_remote_blocking().expect("completion");
}

#[test]
fn cancellation_aborts_at_next_callback() {
    let (engine, mut repo) = setup();
    let (release, paused) = mpsc::channel();
    engine.script_remote(vec![
        RemoteStep::Pause(paused),
        RemoteStep::UpdateTip {
            refname: "refs/remotes/origin/main".into(),
            old: Oid::zero(),
            new: oid(7),
        },
    ]);

    repo.fetch(None).unwrap();
    repo.cancel_remote();
    release.send(()).unwrap();

    let done = repo.wait_remote_blocking().expect("completion");
    let err = done.result.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(repo.remote_error().unwrap().code(), EngineError::USER);
    assert!(repo.reference("refs/remotes/origin/main").is_none());
}

#[test]
fn failed_fetch_still_refreshes_references() {
    let (engine, mut repo) = setup();
    let tip = oid(9);
    engine.script_remote(vec![
        RemoteStep::UpdateTip {
            refname: "refs/remotes/origin/main".into(),
            old: Oid::zero(),
            new: tip.clone(),
        },
        RemoteStep::Fail(EngineError::generic("connection reset")),
    ]);
    let before = repo.versions();

    repo.fetch(None).unwrap();
    let done = repo.wait_remote_blocking().expect("completion");

    assert!(done.result.is_err());
    assert_eq!(repo.remote_error().unwrap().message(), "connection reset");
    assert!(repo.versions().reference_list > before.reference_list);
    assert_eq!(repo.reference("refs/remotes/origin/main").unwrap().target, Some(tip));
}

#[test]
fn unknown_remote_is_rejected_up_front() {
    let (_engine, mut repo) = setup();

    let err = repo.fetch(Some("upstream")).unwrap_err();
    assert!(matches!(err, RemoteError::UnknownRemote(ref name) if name == "upstream"));
    assert!(!repo.remote_progress().in_progress);
}

#[test]
fn clone_then_track_remote_branch() {
    let engine = MockEngine::new();
    let worker = Worker::owned(1).expect("worker runtime");
    let mut repo = Repository::with_worker(
        Arc::new(engine.clone()),
        CredentialStore::in_memory(),
        worker,
    );
    assert!(!repo.has_repository());

    engine.script_remote(vec![RemoteStep::UpdateTip {
        refname: "refs/remotes/origin/dev".into(),
        old: Oid::zero(),
        new: oid(3),
    }]);
    repo.clone_from(URL).unwrap();
    assert_eq!(repo.remote_progress().label, format!("Cloning {}", URL));
    repo.wait_remote_blocking().expect("completion");

    assert!(repo.has_repository());
    assert_eq!(repo.remotes().unwrap()[0].url, URL);

    let dev = RefName::new("refs/remotes/origin/dev").unwrap();
    repo.create_local_tracking_branch(&dev).unwrap();
    assert_eq!(repo.reference("refs/heads/dev").unwrap().target, Some(oid(3)));
}

#[tokio::test]
async fn async_wait_inside_runtime() {
    let engine = MockEngine::with_initial_commit();
    engine.add_remote("origin", URL).unwrap();
    engine.script_remote(vec![RemoteStep::Sideband("done".into())]);
    let mut repo = Repository::new(Arc::new(engine), CredentialStore::in_memory()).unwrap();

    repo.fetch(None).unwrap();
    let done = repo.wait_remote().await.expect("completion");

    assert!(done.result.is_ok());
    assert_eq!(repo.remote_progress().message.as_deref(), Some("Remote: done"));
}
