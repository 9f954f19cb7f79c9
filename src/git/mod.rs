pub mod patches;
pub mod repository;

pub use patches::{PatchEntry, PatchSeries};
pub use repository::{short_id, CommitInfo, FastForward, GitRepository, PickOutcome};

use crate::errors::{GitumError, Result};
use std::path::{Path, PathBuf};

/// Find the root of the Git repository
pub fn find_repository_root(start_path: &Path) -> Result<PathBuf> {
    let repo = git2::Repository::discover(start_path)
        .map_err(|e| GitumError::config(format!("Not a git repository: {e}")))?;

    let workdir = repo
        .workdir()
        .ok_or_else(|| GitumError::config("Repository has no working directory (bare repo?)"))?;

    Ok(workdir.to_path_buf())
}
