//! Branch-role workflows.
//!
//! Every mutating operation runs inside a [`Session`]: the repository lock is
//! held, the role mapping is loaded, and at most one suspended operation
//! record exists. Update, merge and pull are step machines whose cursor is
//! persisted before each step and advanced only after the step commits, so a
//! conflict leaves a record that `continue_*` can resume or abort.

pub mod lock;
pub mod merge;
pub mod pull;
pub mod state;
pub mod topology;
pub mod update;

pub use lock::RepoLock;
pub use merge::MergeReport;
pub use pull::PullReport;
pub use state::{OperationKind, OperationState, StateStore};
pub use topology::{RemoveReport, RoleStatus, StatusReport};
pub use update::UpdateReport;

use crate::config::{self, Role, RoleMapping};
use crate::errors::{GitumError, Result};
use crate::git::{short_id, GitRepository, PatchSeries};
use git2::Oid;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What to do with a suspended operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Conflicts are resolved and staged; commit the step and go on
    Continue,
    /// Restore every role branch to its pre-operation tip
    Abort,
}

/// Result of a `continue_*` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resumed<T> {
    Completed(T),
    Aborted,
}

/// Locked, mapped repository for the duration of one operation
pub struct Session {
    pub(crate) repo: GitRepository,
    pub(crate) mapping: RoleMapping,
    pub(crate) store: StateStore,
    lock: RepoLock,
}

impl Session {
    /// Open a session for a new operation
    pub fn begin(path: &Path) -> Result<Self> {
        let repo = GitRepository::open(path)?;
        let metadata_dir = config::ensure_metadata_dir(repo.git_dir())?;
        let store = StateStore::new(&metadata_dir);
        if let Some(state) = store.load()? {
            return Err(GitumError::precondition(format!(
                "A {kind} operation is in progress; run 'gitum continue_{kind}' first",
                kind = state.kind
            )));
        }

        let lock = RepoLock::acquire(&metadata_dir)?;
        let mapping = config::load_mapping(repo.git_dir())?;
        Ok(Self {
            repo,
            mapping,
            store,
            lock,
        })
    }

    /// Reopen a session suspended by a conflict in a `kind` operation
    pub fn resume(path: &Path, kind: OperationKind) -> Result<(Self, OperationState)> {
        let repo = GitRepository::open(path)?;
        let metadata_dir = config::ensure_metadata_dir(repo.git_dir())?;
        let store = StateStore::new(&metadata_dir);

        let state = store.load()?.ok_or_else(|| {
            GitumError::invalid_state(format!("No {kind} operation is in progress"))
        })?;
        if state.kind != kind {
            return Err(GitumError::invalid_state(format!(
                "The operation in progress is a {}, not a {kind}; use 'gitum continue_{}'",
                state.kind, state.kind
            )));
        }

        let mapping = config::load_mapping(repo.git_dir())?;
        let lock = RepoLock::reclaim(&metadata_dir)?;
        debug!("Resuming {} operation {} at step {}", kind, state.id, state.cursor);

        Ok((
            Self {
                repo,
                mapping,
                store,
                lock,
            },
            state,
        ))
    }

    pub fn branch(&self, role: Role) -> &str {
        self.mapping.branch(role)
    }

    /// Current tip of a role branch
    pub fn tip(&self, role: Role) -> Result<Oid> {
        self.repo.get_branch_head(self.branch(role)).map_err(|_| {
            GitumError::config(format!(
                "The {role} branch '{}' does not exist",
                self.branch(role)
            ))
        })
    }

    /// Tips of all five role branches
    pub fn snapshot(&self) -> Result<BTreeMap<Role, Oid>> {
        Role::ALL
            .into_iter()
            .map(|role| Ok((role, self.tip(role)?)))
            .collect()
    }

    pub fn require_clean(&self) -> Result<()> {
        if self.repo.is_dirty()? {
            return Err(GitumError::precondition(
                "Working tree has uncommitted changes; commit or stash them first",
            ));
        }
        Ok(())
    }

    /// Persist `state`, keep the lock and report the conflict
    pub fn suspend(&mut self, state: &OperationState, files: Vec<String>) -> GitumError {
        if let Err(e) = self.store.save(state) {
            return e;
        }
        self.lock.suspend();
        info!(
            "{} suspended at step {} with {} conflicted files",
            state.kind,
            state.cursor,
            files.len()
        );
        GitumError::conflict(state.kind, state.cursor, files)
    }

    /// Check out the branch the operation started on and drop the record
    pub fn finish(&self, state: &OperationState) -> Result<()> {
        self.return_to(state.head.as_deref())?;
        self.store.clear()?;
        info!("{} operation {} completed", state.kind, state.id);
        Ok(())
    }

    /// Put every role branch back where the snapshot found it
    pub fn abort(&self, state: &OperationState) -> Result<()> {
        let mut tips = Vec::new();
        for role in Role::ALL {
            tips.push((self.branch(role).to_string(), state.snapshot_tip(role)?));
        }
        self.repo
            .restore_branches(&tips, &format!("gitum: abort {}", state.kind))?;
        self.return_to(state.head.as_deref())?;
        self.store.clear()?;
        info!("{} operation {} aborted", state.kind, state.id);
        Ok(())
    }

    fn return_to(&self, head: Option<&str>) -> Result<()> {
        match head {
            Some(name) if self.repo.branch_exists(name) => self.repo.switch_hard(name),
            _ => self.repo.switch_hard(self.branch(Role::Dev)),
        }
    }

    /// Regenerate the patch queue from the rebased commits above `base`.
    ///
    /// Appends a commit to the patches branch only when the queue content
    /// changed. Returns the number of patches in the queue.
    pub fn publish_patches(&self, base: Oid, reason: &str) -> Result<usize> {
        let rebased_tip = self.tip(Role::Rebased)?;
        let commits = self.repo.first_parent_range(base, rebased_tip)?;
        let series = PatchSeries::from_commits(&self.repo, &commits)?;

        let tree = self
            .repo
            .build_flat_tree(&series.tree_files(&self.mapping.to_json()?))?;
        let patches_tip = self.tip(Role::Patches)?;
        if self.repo.tree_of(patches_tip)? == tree {
            debug!("Patch queue unchanged ({} patches)", series.len());
            return Ok(series.len());
        }

        let message = format!(
            "{reason}\n\nQueue of {} patches on {} {}",
            series.len(),
            self.branch(Role::Upstream),
            short_id(base)
        );
        let refname = format!("refs/heads/{}", self.branch(Role::Patches));
        self.repo
            .commit_tree(Some(&refname), tree, &[patches_tip], &message)?;
        info!("Published {} patches", series.len());
        Ok(series.len())
    }
}

/// Entry point for all gitum operations on one repository
#[derive(Debug, Clone)]
pub struct Gitum {
    path: PathBuf,
}

impl Gitum {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start managing the repository with the given branch names
    pub fn create(
        &self,
        merge: &str,
        dev: &str,
        upstream: &str,
        rebased: &str,
        patches: &str,
    ) -> Result<RoleMapping> {
        let mapping = RoleMapping::new(merge, dev, upstream, rebased, patches)?;
        topology::create(&self.path, mapping)
    }

    /// Clone a managed repository and recreate its role branches
    pub fn clone_from(source: &str, dest: &Path) -> Result<(Self, RoleMapping)> {
        let mapping = topology::clone(source, dest)?;
        Ok((Self::new(dest), mapping))
    }

    pub fn remove_all(&self) -> Result<RemoveReport> {
        topology::remove_all(&self.path)
    }

    pub fn status(&self) -> Result<StatusReport> {
        topology::status(&self.path)
    }

    /// Capture the last `count` dev commits as the patch set
    pub fn update(&self, count: usize) -> Result<UpdateReport> {
        update::UpdateEngine::begin(&self.path)?.run(count)
    }

    pub fn continue_update(&self, signal: Signal) -> Result<Resumed<UpdateReport>> {
        update::UpdateEngine::resume(&self.path, signal)
    }

    /// Integrate new upstream commits
    pub fn merge(&self) -> Result<MergeReport> {
        merge::MergeEngine::begin(&self.path)?.run()
    }

    pub fn continue_merge(&self, signal: Signal) -> Result<Resumed<MergeReport>> {
        merge::MergeEngine::resume(&self.path, signal)
    }

    /// Bring in upstream and patches published by `remote`
    pub fn pull(&self, remote: &str) -> Result<PullReport> {
        pull::PullEngine::begin(&self.path)?.run(remote)
    }

    pub fn continue_pull(&self, signal: Signal) -> Result<Resumed<PullReport>> {
        pull::PullEngine::resume(&self.path, signal)
    }

    /// The role mapping, or `None` when the repository is not managed
    pub fn mapping(&self) -> Result<Option<RoleMapping>> {
        let repo = GitRepository::open(&self.path)?;
        if !config::is_repo_initialized(repo.git_dir()) {
            return Ok(None);
        }
        config::load_mapping(repo.git_dir()).map(Some)
    }

    /// The suspended operation, if any
    pub fn operation(&self) -> Result<Option<OperationState>> {
        let repo = GitRepository::open(&self.path)?;
        StateStore::new(&config::metadata_dir(repo.git_dir())).load()
    }
}
