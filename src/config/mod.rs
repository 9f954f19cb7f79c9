pub mod roles;

pub use roles::{Role, RoleMapping, ROLE_MAPPING_VERSION};

use crate::errors::{GitumError, Result};
use crate::utils::atomic_file;
use std::fs;
use std::path::{Path, PathBuf};

/// File carrying the role mapping inside the patches branch
pub const TRACKED_CONFIG_FILE: &str = ".gitum-config";

const METADATA_DIR: &str = "gitum";
const LOCAL_CONFIG_FILE: &str = "config.json";

/// Repository-local (untracked) gitum metadata directory: `<git-dir>/gitum`
pub fn metadata_dir(git_dir: &Path) -> PathBuf {
    git_dir.join(METADATA_DIR)
}

/// Ensure the metadata directory exists
pub fn ensure_metadata_dir(git_dir: &Path) -> Result<PathBuf> {
    let dir = metadata_dir(git_dir);
    if !dir.exists() {
        fs::create_dir_all(&dir).map_err(|e| {
            GitumError::config(format!("Failed to create metadata directory: {e}"))
        })?;
    }
    Ok(dir)
}

/// Check if a repository carries a gitum role mapping
pub fn is_repo_initialized(git_dir: &Path) -> bool {
    metadata_dir(git_dir).join(LOCAL_CONFIG_FILE).exists()
}

/// Load the local role mapping written by `create` or `clone`
pub fn load_mapping(git_dir: &Path) -> Result<RoleMapping> {
    let path = metadata_dir(git_dir).join(LOCAL_CONFIG_FILE);
    if !path.exists() {
        return Err(GitumError::config(
            "No gitum role mapping found. Run 'gitum create' or 'gitum clone' first.",
        ));
    }

    let content = fs::read_to_string(&path)
        .map_err(|e| GitumError::config(format!("Failed to read role mapping: {e}")))?;
    RoleMapping::from_json(&content)
}

/// Persist the local copy of the role mapping
pub fn save_mapping(git_dir: &Path, mapping: &RoleMapping) -> Result<()> {
    let dir = ensure_metadata_dir(git_dir)?;
    atomic_file::write_string(&dir.join(LOCAL_CONFIG_FILE), &mapping.to_json()?)?;
    tracing::debug!("Saved role mapping to {}", dir.display());
    Ok(())
}

/// Remove the local role mapping; a missing file is not an error
pub fn remove_mapping(git_dir: &Path) -> Result<()> {
    let path = metadata_dir(git_dir).join(LOCAL_CONFIG_FILE);
    if path.exists() {
        fs::remove_file(&path)
            .map_err(|e| GitumError::config(format!("Failed to remove role mapping: {e}")))?;
    }
    Ok(())
}
