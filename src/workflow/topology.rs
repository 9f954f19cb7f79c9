use super::lock::RepoLock;
use super::state::{OperationState, StateStore};
use crate::config::{self, Role, RoleMapping, TRACKED_CONFIG_FILE};
use crate::errors::{GitumError, Result};
use crate::git::{short_id, GitRepository, PatchSeries};
use git2::Oid;
use std::path::Path;
use tracing::{debug, info, warn};

const ORIGIN: &str = "origin";

/// Branches removed by `remove_all`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoveReport {
    pub deleted: Vec<String>,
    /// No role mapping was found; nothing was done
    pub unmanaged: bool,
}

#[derive(Debug, Clone)]
pub struct RoleStatus {
    pub role: Role,
    pub branch: String,
    pub tip: Option<Oid>,
}

/// Snapshot of a managed repository
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub mapping: RoleMapping,
    pub current_branch: Option<String>,
    pub roles: Vec<RoleStatus>,
    /// Patches published on the patches branch
    pub patches: usize,
    pub operation: Option<OperationState>,
    pub conflicted_files: Vec<String>,
}

/// Start managing a repository.
///
/// The upstream branch may already exist, in which case it is adopted as is
/// and the merge, rebased and dev branches start at its tip; otherwise it is
/// created at HEAD along with them. The patches branch is an orphan.
pub fn create(path: &Path, mapping: RoleMapping) -> Result<RoleMapping> {
    let repo = GitRepository::open(path)?;
    let git_dir = repo.git_dir().to_path_buf();
    let metadata_dir = config::ensure_metadata_dir(&git_dir)?;
    let _lock = RepoLock::acquire(&metadata_dir)?;

    if StateStore::new(&metadata_dir).exists() {
        return Err(GitumError::precondition(
            "An operation is in progress; finish or abort it first",
        ));
    }
    if config::is_repo_initialized(&git_dir) {
        return Err(GitumError::precondition(
            "Repository is already managed by gitum; run 'gitum remove_all' first",
        ));
    }
    if repo.is_dirty()? {
        return Err(GitumError::precondition(
            "Working tree has uncommitted changes; commit or stash them first",
        ));
    }
    for (role, name) in mapping.iter() {
        if role != Role::Upstream && repo.branch_exists(name) {
            return Err(GitumError::precondition(format!(
                "Branch '{name}' already exists; choose another name for the {role} branch"
            )));
        }
    }

    let base = if repo.branch_exists(&mapping.upstream) {
        let tip = repo.get_branch_head(&mapping.upstream)?;
        info!("Adopting existing branch '{}' as upstream", mapping.upstream);
        tip
    } else {
        let head = repo.get_head_commit()?.id();
        repo.create_branch(&mapping.upstream, head)?;
        head
    };
    for role in [Role::Merge, Role::Rebased, Role::Dev] {
        repo.create_branch(mapping.branch(role), base)?;
    }

    let files = PatchSeries::default().tree_files(&mapping.to_json()?);
    let patches_ref = format!("refs/heads/{}", mapping.patches);
    repo.commit_files(
        Some(&patches_ref),
        &files,
        &[],
        "Start gitum patch queue",
    )?;

    config::save_mapping(&git_dir, &mapping)?;
    repo.switch_hard(&mapping.dev)?;

    info!("Created gitum branches at {}", short_id(base));
    Ok(mapping)
}

/// Clone a gitum-managed repository and recreate its role branches locally
pub fn clone(source: &str, dest: &Path) -> Result<RoleMapping> {
    if dest.exists() && dest.read_dir()?.next().is_some() {
        return Err(GitumError::precondition(format!(
            "Destination '{}' already exists and is not empty",
            dest.display()
        )));
    }

    let repo = GitRepository::clone(source, dest)?;
    let git_dir = repo.git_dir().to_path_buf();
    let metadata_dir = config::ensure_metadata_dir(&git_dir)?;
    let _lock = RepoLock::acquire(&metadata_dir)?;

    let mut found = None;
    for (name, tip) in repo.remote_branches(ORIGIN)? {
        if let Some(content) = repo.read_file_at(tip, TRACKED_CONFIG_FILE)? {
            debug!("Found role mapping on '{}/{}'", ORIGIN, name);
            found = Some(RoleMapping::from_json(&String::from_utf8_lossy(&content))?);
            break;
        }
    }
    let mapping = found.ok_or_else(|| {
        GitumError::config(format!("'{source}' does not carry a gitum role mapping"))
    })?;

    for (role, name) in mapping.iter() {
        let tip = repo.remote_branch_head(ORIGIN, name).ok_or_else(|| {
            GitumError::config(format!("'{source}' has no '{name}' branch for role {role}"))
        })?;
        if repo.branch_exists(name) {
            repo.set_branch_target(name, tip, "gitum: clone")?;
        } else {
            repo.create_branch(name, tip)?;
        }
    }

    config::save_mapping(&git_dir, &mapping)?;
    repo.switch_hard(&mapping.dev)?;

    info!("Cloned gitum repository into {}", dest.display());
    Ok(mapping)
}

/// Delete every role branch and the local mapping
pub fn remove_all(path: &Path) -> Result<RemoveReport> {
    let repo = GitRepository::open(path)?;
    let git_dir = repo.git_dir().to_path_buf();
    let metadata_dir = config::ensure_metadata_dir(&git_dir)?;
    let _lock = RepoLock::acquire(&metadata_dir)?;

    let store = StateStore::new(&metadata_dir);
    if let Some(state) = store.load()? {
        return Err(GitumError::precondition(format!(
            "A {kind} operation is in progress; run 'gitum continue_{kind} --abort' first",
            kind = state.kind
        )));
    }

    if !config::is_repo_initialized(&git_dir) {
        warn!("Repository is not managed by gitum; nothing to remove");
        return Ok(RemoveReport {
            deleted: Vec::new(),
            unmanaged: true,
        });
    }
    let mapping = config::load_mapping(&git_dir)?;

    let current = repo.get_current_branch()?;
    if current.as_deref().and_then(|name| mapping.role_of(name)).is_some() {
        repo.detach_head()?;
        warn!("HEAD was on a gitum branch and is now detached");
    }

    let mut deleted = Vec::new();
    for (_, name) in mapping.iter() {
        if repo.delete_branch(name)? {
            deleted.push(name.to_string());
        }
    }
    config::remove_mapping(&git_dir)?;

    info!("Removed {} gitum branches", deleted.len());
    Ok(RemoveReport {
        deleted,
        unmanaged: false,
    })
}

pub fn status(path: &Path) -> Result<StatusReport> {
    let repo = GitRepository::open(path)?;
    let git_dir = repo.git_dir();
    let mapping = config::load_mapping(git_dir)?;
    let operation = StateStore::new(&config::metadata_dir(git_dir)).load()?;

    let roles = mapping
        .iter()
        .map(|(role, name)| RoleStatus {
            role,
            branch: name.to_string(),
            tip: repo.get_branch_head(name).ok(),
        })
        .collect::<Vec<_>>();

    let patches = match roles.iter().find(|status| status.role == Role::Patches) {
        Some(RoleStatus { tip: Some(tip), .. }) => PatchSeries::load(&repo, *tip)?.len(),
        _ => 0,
    };
    let conflicted_files = if operation.is_some() {
        repo.get_conflicted_files()?
    } else {
        Vec::new()
    };

    Ok(StatusReport {
        current_branch: repo.get_current_branch()?,
        mapping,
        roles,
        patches,
        operation,
        conflicted_files,
    })
}
