//! Integration tests for the `gitum` binary: verbs and exit statuses
use std::path::Path;
use std::process::{Command, Output, Stdio};

#[path = "integration/test_helpers.rs"]
mod test_helpers;

use test_helpers::*;

/// Helper to run gitum and capture its output
fn run_gitum(args: &[&str], cwd: &Path) -> Output {
    Command::new(get_binary_path())
        .args(args)
        .arg("--no-color")
        .current_dir(cwd)
        .stdin(Stdio::null())
        .output()
        .expect("Failed to execute gitum")
}

fn exit_code(output: &Output) -> i32 {
    output.status.code().expect("gitum should exit normally")
}

#[test]
fn test_create_update_status_succeed() {
    let (_tmp, repo_path) = create_test_git_repo();

    let output = run_gitum(
        &["create", "merge", "dev", "master", "rebased", "patches"],
        &repo_path,
    );
    assert_eq!(exit_code(&output), 0, "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(current_branch(&repo_path), "dev");

    commit_file(&repo_path, "testfile", "ab", "local: b");
    let output = run_gitum(&["update", "1"], &repo_path);
    assert_eq!(exit_code(&output), 0);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Captured 1 patches"));

    let output = run_gitum(&["status"], &repo_path);
    assert_eq!(exit_code(&output), 0);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("rebased"));
    assert!(stdout.contains("No operation in progress"));
}

#[test]
fn test_unmanaged_repository_exits_with_config_status() {
    let (_tmp, repo_path) = create_test_git_repo();
    let output = run_gitum(&["update", "1"], &repo_path);
    assert_eq!(exit_code(&output), 2);
}

#[test]
fn test_continue_without_operation_exits_with_invalid_state_status() {
    let (_tmp, repo_path, _gitum) = create_managed_repo();
    let output = run_gitum(&["continue_merge", "--continue"], &repo_path);
    assert_eq!(exit_code(&output), 2);
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid state"));
}

#[test]
fn test_conflict_exit_status_and_abort() {
    let (_tmp, repo_path, gitum) = create_managed_repo();
    commit_file(&repo_path, "testfile", "ab", "local: b");
    gitum.update(1).unwrap();
    git(&repo_path, &["checkout", "master"]);
    commit_file(&repo_path, "testfile", "a\nd", "upstream: add d");
    git(&repo_path, &["checkout", "dev"]);
    let before = tips(&repo_path);

    let output = run_gitum(&["merge"], &repo_path);
    assert_eq!(exit_code(&output), 1);
    assert!(String::from_utf8_lossy(&output.stdout).contains("continue_merge"));

    // Status describes the suspended merge
    let output = run_gitum(&["status"], &repo_path);
    assert_eq!(exit_code(&output), 0);
    assert!(String::from_utf8_lossy(&output.stdout).contains("conflict: testfile"));

    // A new operation is refused while the merge is suspended
    let output = run_gitum(&["update", "1"], &repo_path);
    assert_eq!(exit_code(&output), 2);

    let output = run_gitum(&["continue-merge", "--abort"], &repo_path);
    assert_eq!(exit_code(&output), 0);
    assert_eq!(tips(&repo_path), before);
}

#[test]
fn test_pull_from_missing_remote_exits_with_backend_status() {
    let (_tmp, repo_path, _gitum) = create_managed_repo();
    let output = run_gitum(&["pull", "nowhere"], &repo_path);
    assert_eq!(exit_code(&output), 3);
}

#[test]
fn test_remove_all_with_yes_skips_prompt() {
    let (_tmp, repo_path, _gitum) = create_managed_repo();
    let output = run_gitum(&["remove_all", "--yes"], &repo_path);
    assert_eq!(exit_code(&output), 0);
    assert!(!branch_exists(&repo_path, "rebased"));
    assert!(!branch_exists(&repo_path, "patches"));
}

#[test]
fn test_continue_requires_exactly_one_flag() {
    let (_tmp, repo_path, _gitum) = create_managed_repo();
    let output = run_gitum(&["continue_pull"], &repo_path);
    assert_eq!(exit_code(&output), 2);
    let output = run_gitum(&["continue_pull", "--resolved", "--abort"], &repo_path);
    assert_eq!(exit_code(&output), 2);
}
