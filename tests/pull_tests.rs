//! Integration tests for pulling upstream and published patches from a peer
use gitum::workflow::{OperationKind, Resumed, Signal};
use gitum::{Gitum, GitumError};
use std::path::PathBuf;
use tempfile::TempDir;

#[path = "integration/test_helpers.rs"]
mod test_helpers;

use test_helpers::*;

struct Peers {
    _tmp: TempDir,
    remote_path: PathBuf,
    remote: Gitum,
    local_path: PathBuf,
    local: Gitum,
}

/// A managed repository and a clone of it
fn setup_peers() -> Peers {
    let (tmp, remote_path, remote) = create_managed_repo();
    let local_path = tmp.path().join("local");
    let (local, _) = Gitum::clone_from(remote_path.to_str().unwrap(), &local_path).unwrap();
    git(&local_path, &["config", "user.name", "Local User"]);
    git(&local_path, &["config", "user.email", "local@example.com"]);

    Peers {
        _tmp: tmp,
        remote_path,
        remote,
        local_path,
        local,
    }
}

/// The remote publishes a patch and advances upstream; the local dev branch
/// has its own change to the same file
fn setup_conflicting_pull() -> Peers {
    let peers = setup_peers();

    commit_file(&peers.remote_path, "testfile", "a\nremote", "remote: add line");
    peers.remote.update(1).unwrap();
    git(&peers.remote_path, &["checkout", "master"]);
    commit_file(&peers.remote_path, "upstream.txt", "upstream", "upstream: add file");
    git(&peers.remote_path, &["checkout", "dev"]);

    commit_file(&peers.local_path, "testfile", "a\nlocal", "local: add line");
    peers
}

#[test]
fn test_pull_with_nothing_new() {
    let peers = setup_peers();
    let before = tips(&peers.local_path);

    let report = peers.local.pull("origin").unwrap();
    assert!(!report.upstream_advanced);
    assert_eq!(report.applied, 0);
    assert_eq!(tips(&peers.local_path), before);
    assert!(!state_file(&peers.local_path).exists());
}

#[test]
fn test_pull_applies_new_patches_and_fast_forwards_upstream() {
    let peers = setup_peers();
    commit_file(&peers.remote_path, "feature.txt", "feature", "remote: feature");
    peers.remote.update(1).unwrap();
    git(&peers.remote_path, &["checkout", "master"]);
    commit_file(&peers.remote_path, "upstream.txt", "upstream", "upstream: add file");
    git(&peers.remote_path, &["checkout", "dev"]);

    let report = peers.local.pull("origin").unwrap();
    assert!(report.upstream_advanced);
    assert_eq!(report.applied, 1);

    assert_eq!(
        rev(&peers.local_path, "master"),
        rev(&peers.remote_path, "master")
    );
    assert_eq!(read_file(&peers.local_path, "feature.txt"), "feature");
    assert_eq!(current_branch(&peers.local_path), "dev");

    // Pulling again finds the patch already on dev
    let again = peers.local.pull("origin").unwrap();
    assert_eq!(again.applied, 0);
}

#[test]
fn test_conflicting_pull_resumes_after_resolution() {
    let peers = setup_conflicting_pull();

    match peers.local.pull("origin").unwrap_err() {
        GitumError::Conflict {
            operation,
            step,
            files,
        } => {
            assert_eq!(operation, OperationKind::Pull);
            assert_eq!(step, 0);
            assert_eq!(files, vec!["testfile".to_string()]);
        }
        other => panic!("expected a conflict, got {other:?}"),
    }
    assert!(lock_file(&peers.local_path).exists());

    resolve(&peers.local_path, "testfile", "a\nlocal\nremote");
    let report = match peers.local.continue_pull(Signal::Continue).unwrap() {
        Resumed::Completed(report) => report,
        Resumed::Aborted => panic!("pull should complete"),
    };
    assert!(report.upstream_advanced);
    assert_eq!(report.applied, 1);

    assert_eq!(
        rev(&peers.local_path, "master"),
        rev(&peers.remote_path, "master")
    );
    assert_eq!(read_file(&peers.local_path, "testfile"), "a\nlocal\nremote");
    let message = git(&peers.local_path, &["log", "-1", "--format=%B", "dev"]);
    assert!(message.starts_with("remote: add line"));
    assert!(message.contains("Gitum-Origin:"));

    assert!(peers.local.operation().unwrap().is_none());
    assert!(!lock_file(&peers.local_path).exists());
    assert_eq!(git(&peers.local_path, &["status", "--porcelain"]), "");
}

#[test]
fn test_pull_conflict_on_later_patch_advances_cursor() {
    let peers = setup_peers();
    commit_file(&peers.remote_path, "testfile", "a\nremote1", "remote: first line");
    commit_file(
        &peers.remote_path,
        "testfile",
        "a\nremote1\nremote2",
        "remote: second line",
    );
    peers.remote.update(2).unwrap();
    commit_file(&peers.local_path, "testfile", "a\nlocal", "local: add line");

    let err = peers.local.pull("origin").unwrap_err();
    assert!(
        matches!(err, GitumError::Conflict { operation: OperationKind::Pull, step: 0, .. }),
        "got {err:?}"
    );

    resolve(&peers.local_path, "testfile", "a\nlocal remote1");
    match peers.local.continue_pull(Signal::Continue).unwrap_err() {
        GitumError::Conflict {
            operation,
            step,
            files,
        } => {
            assert_eq!(operation, OperationKind::Pull);
            assert_eq!(step, 1);
            assert_eq!(files, vec!["testfile".to_string()]);
        }
        other => panic!("expected a conflict, got {other:?}"),
    }
    assert_eq!(peers.local.operation().unwrap().unwrap().cursor, 1);

    resolve(&peers.local_path, "testfile", "a\nlocal remote1\nremote2");
    let report = match peers.local.continue_pull(Signal::Continue).unwrap() {
        Resumed::Completed(report) => report,
        Resumed::Aborted => panic!("pull should complete"),
    };
    assert_eq!(report.applied, 2);
    assert!(!report.upstream_advanced);

    assert_eq!(read_file(&peers.local_path, "testfile"), "a\nlocal remote1\nremote2");
    let message = git(&peers.local_path, &["log", "-1", "--format=%B", "dev"]);
    assert!(message.starts_with("remote: second line"));
    assert_eq!(commit_count(&peers.local_path, "merge..dev"), 3);
    assert!(peers.local.operation().unwrap().is_none());
    assert!(!lock_file(&peers.local_path).exists());
}

#[test]
fn test_pull_failure_after_fast_forward_restores_upstream() {
    let peers = setup_peers();
    commit_file(&peers.remote_path, "feature.txt", "feature", "remote: feature");
    peers.remote.update(1).unwrap();
    // The published queue names a patch the remote rebased branch no longer carries
    git(&peers.remote_path, &["branch", "-f", "rebased", "merge"]);
    git(&peers.remote_path, &["checkout", "master"]);
    commit_file(&peers.remote_path, "upstream.txt", "upstream", "upstream: add file");
    git(&peers.remote_path, &["checkout", "dev"]);
    let before = tips(&peers.local_path);

    let err = peers.local.pull("origin").unwrap_err();
    assert!(matches!(err, GitumError::Backend(_)), "got {err:?}");

    assert_eq!(tips(&peers.local_path), before);
    assert_eq!(current_branch(&peers.local_path), "dev");
    assert!(!state_file(&peers.local_path).exists());
    assert!(!lock_file(&peers.local_path).exists());
}

#[test]
fn test_pull_abort_restores_upstream_and_dev() {
    let peers = setup_conflicting_pull();
    let before = tips(&peers.local_path);

    assert!(peers.local.pull("origin").unwrap_err().is_conflict());
    assert_ne!(rev(&peers.local_path, "master"), before[0]);

    assert_eq!(
        peers.local.continue_pull(Signal::Abort).unwrap(),
        Resumed::Aborted
    );
    assert_eq!(tips(&peers.local_path), before);
    assert_eq!(read_file(&peers.local_path, "testfile"), "a\nlocal");
    assert!(peers.local.operation().unwrap().is_none());
}

#[test]
fn test_pull_refuses_diverged_upstream() {
    let peers = setup_peers();
    git(&peers.remote_path, &["checkout", "master"]);
    commit_file(&peers.remote_path, "upstream.txt", "theirs", "upstream: theirs");
    git(&peers.remote_path, &["checkout", "dev"]);

    git(&peers.local_path, &["checkout", "master"]);
    commit_file(&peers.local_path, "upstream.txt", "ours", "upstream: ours");
    git(&peers.local_path, &["checkout", "dev"]);
    let before = tips(&peers.local_path);

    let err = peers.local.pull("origin").unwrap_err();
    assert!(matches!(err, GitumError::Backend(_)), "got {err:?}");
    assert_eq!(err.exit_code(), 3);
    assert_eq!(tips(&peers.local_path), before);
    assert!(!state_file(&peers.local_path).exists());
    assert!(!lock_file(&peers.local_path).exists());
}

#[test]
fn test_pull_from_unknown_remote_is_backend_error() {
    let peers = setup_peers();
    let err = peers.local.pull("nowhere").unwrap_err();
    assert!(matches!(err, GitumError::Backend(_)));
}
