#![allow(dead_code)]

use gitum::Gitum;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Test helpers shared by the integration tests.
///
/// Repository history is set up with the git CLI so that the library only
/// ever sees repositories the way a user would leave them.
pub const BRANCHES: [&str; 5] = ["master", "merge", "dev", "rebased", "patches"];

/// Run git in `repo_path`, panicking with stderr on failure; returns trimmed stdout
pub fn git(repo_path: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_path)
        .output()
        .expect("Git command should run");

    if !output.status.success() {
        panic!(
            "Git command failed: git {}\nStderr: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Initialize a repository on `master` whose only commit holds `testfile` = "a"
pub fn init_repo(repo_path: &Path) {
    let git_commands: [&[&str]; 6] = [
        &["init"],
        &["symbolic-ref", "HEAD", "refs/heads/master"],
        &["config", "user.name", "Test User"],
        &["config", "user.email", "test@example.com"],
        &["config", "core.autocrlf", "false"],
        &["config", "commit.gpgsign", "false"],
    ];
    for args in git_commands {
        git(repo_path, args);
    }

    commit_file(repo_path, "testfile", "a", "Initial commit");
}

/// Create a test git repository with the standard initial commit
pub fn create_test_git_repo() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let repo_path = temp_dir.path().join("repo");
    std::fs::create_dir(&repo_path).unwrap();
    init_repo(&repo_path);
    (temp_dir, repo_path)
}

/// A repository managed by gitum with upstream = master and the other roles
/// named after themselves; dev is checked out
pub fn create_managed_repo() -> (TempDir, PathBuf, Gitum) {
    let (temp_dir, repo_path) = create_test_git_repo();
    let gitum = Gitum::new(&repo_path);
    gitum
        .create("merge", "dev", "master", "rebased", "patches")
        .unwrap();
    (temp_dir, repo_path, gitum)
}

pub fn write_file(repo_path: &Path, file: &str, content: &str) {
    std::fs::write(repo_path.join(file), content).unwrap();
}

pub fn read_file(repo_path: &Path, file: &str) -> String {
    std::fs::read_to_string(repo_path.join(file)).unwrap()
}

/// Write `file` and commit it on the current branch
pub fn commit_file(repo_path: &Path, file: &str, content: &str, message: &str) {
    write_file(repo_path, file, content);
    git(repo_path, &["add", file]);
    git(repo_path, &["commit", "-m", message]);
}

/// Stage a conflict resolution for `file`
pub fn resolve(repo_path: &Path, file: &str, content: &str) {
    write_file(repo_path, file, content);
    git(repo_path, &["add", file]);
}

pub fn rev(repo_path: &Path, revision: &str) -> String {
    git(repo_path, &["rev-parse", revision])
}

/// Tips of the five managed branches, in `BRANCHES` order
pub fn tips(repo_path: &Path) -> Vec<String> {
    BRANCHES.iter().map(|branch| rev(repo_path, branch)).collect()
}

pub fn current_branch(repo_path: &Path) -> String {
    git(repo_path, &["rev-parse", "--abbrev-ref", "HEAD"])
}

pub fn branch_exists(repo_path: &Path, branch: &str) -> bool {
    Command::new("git")
        .args(["rev-parse", "--verify", "--quiet", &format!("refs/heads/{branch}")])
        .current_dir(repo_path)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Content of `file` at `revision`
pub fn show(repo_path: &Path, revision: &str, file: &str) -> String {
    git(repo_path, &["show", &format!("{revision}:{file}")])
}

pub fn commit_count(repo_path: &Path, range: &str) -> usize {
    git(repo_path, &["rev-list", "--count", range]).parse().unwrap()
}

pub fn state_file(repo_path: &Path) -> PathBuf {
    repo_path.join(".git").join("gitum").join("state.json")
}

pub fn lock_file(repo_path: &Path) -> PathBuf {
    repo_path.join(".git").join("gitum").join("lock")
}

/// Path to the gitum binary built for this test run
pub fn get_binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_gitum"))
}
