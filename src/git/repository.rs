use crate::errors::{GitumError, Result};
use git2::build::CheckoutBuilder;
use git2::{
    BranchType, CherrypickOptions, DiffFormat, Oid, Repository, ResetType, Signature, Sort,
    StatusOptions,
};
use std::path::Path;
use tracing::{debug, info};

/// Abbreviated commit id for messages
pub fn short_id(oid: Oid) -> String {
    let full = oid.to_string();
    full[..full.len().min(8)].to_string()
}

/// Result of replaying one commit onto HEAD
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    /// The change was committed on HEAD
    Committed(Oid),
    /// The change was already present; nothing was committed
    Empty,
    /// Conflict markers were left in the working tree for these paths
    Conflicted(Vec<String>),
}

/// Result of a fast-forward request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastForward {
    UpToDate,
    Advanced,
    /// The local branch already contains the remote tip
    LocalAhead,
}

/// Commit metadata needed by the workflows
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub id: Oid,
    pub summary: String,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub parent_count: usize,
}

/// Wrapper around git2::Repository with the primitives gitum builds on
pub struct GitRepository {
    repo: Repository,
}

impl GitRepository {
    /// Open a Git repository at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .map_err(|e| GitumError::config(format!("Not a git repository: {e}")))?;
        Self::from_repository(repo)
    }

    /// Clone `source` into `dest`
    pub fn clone(source: &str, dest: &Path) -> Result<Self> {
        info!("Cloning {} into {}", source, dest.display());
        let repo = Repository::clone(source, dest)
            .map_err(|e| GitumError::backend(format!("Could not clone '{source}': {e}")))?;
        Self::from_repository(repo)
    }

    fn from_repository(repo: Repository) -> Result<Self> {
        if repo.is_bare() {
            return Err(GitumError::config(
                "Repository has no working directory (bare repo?)",
            ));
        }
        Ok(Self { repo })
    }

    /// The `.git` directory (or the per-worktree git dir)
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    /// Get the current branch name; `None` on a detached or unborn HEAD
    pub fn get_current_branch(&self) -> Result<Option<String>> {
        let head = match self.repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !head.is_branch() {
            return Ok(None);
        }
        Ok(head.shorthand().map(str::to_string))
    }

    /// Get the HEAD commit object
    pub fn get_head_commit(&self) -> Result<git2::Commit<'_>> {
        let head = self
            .repo
            .head()
            .map_err(|e| GitumError::precondition(format!("Could not get HEAD: {e}")))?;
        head.peel_to_commit()
            .map_err(|e| GitumError::precondition(format!("Could not get HEAD commit: {e}")))
    }

    /// Check if the working directory has uncommitted changes to tracked files
    pub fn is_dirty(&self) -> Result<bool> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(false).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut opts))?;

        for status in statuses.iter() {
            if status.status().intersects(
                git2::Status::INDEX_MODIFIED
                    | git2::Status::INDEX_NEW
                    | git2::Status::INDEX_DELETED
                    | git2::Status::INDEX_RENAMED
                    | git2::Status::INDEX_TYPECHANGE
                    | git2::Status::WT_MODIFIED
                    | git2::Status::WT_DELETED
                    | git2::Status::WT_RENAMED
                    | git2::Status::WT_TYPECHANGE
                    | git2::Status::CONFLICTED,
            ) {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Check if a branch exists
    pub fn branch_exists(&self, name: &str) -> bool {
        self.repo.find_branch(name, BranchType::Local).is_ok()
    }

    /// Get the commit at the head of a local branch
    pub fn get_branch_head(&self, name: &str) -> Result<Oid> {
        let branch = self
            .repo
            .find_branch(name, BranchType::Local)
            .map_err(|e| GitumError::config(format!("Could not find branch '{name}': {e}")))?;

        let commit = branch.get().peel_to_commit().map_err(|e| {
            GitumError::backend(format!("Could not get commit for branch '{name}': {e}"))
        })?;

        Ok(commit.id())
    }

    /// Create a new branch at `target`
    pub fn create_branch(&self, name: &str, target: Oid) -> Result<()> {
        let commit = self.repo.find_commit(target)?;
        self.repo.branch(name, &commit, false).map_err(|e| {
            GitumError::precondition(format!("Could not create branch '{name}': {e}"))
        })?;

        info!("Created branch '{}' at {}", name, short_id(target));
        Ok(())
    }

    /// Delete a local branch; returns false when it does not exist
    pub fn delete_branch(&self, name: &str) -> Result<bool> {
        let mut branch = match self.repo.find_branch(name, BranchType::Local) {
            Ok(branch) => branch,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        branch.delete().map_err(|e| {
            GitumError::backend(format!("Could not delete branch '{name}': {e}"))
        })?;

        info!("Deleted branch '{}'", name);
        Ok(true)
    }

    /// Point a branch at `target` without touching the working tree
    pub fn set_branch_target(&self, name: &str, target: Oid, log_message: &str) -> Result<()> {
        self.repo
            .reference(&format!("refs/heads/{name}"), target, true, log_message)?;
        debug!("Moved '{}' to {}", name, short_id(target));
        Ok(())
    }

    /// Check out a branch, discarding any working tree and index changes
    pub fn switch_hard(&self, name: &str) -> Result<()> {
        let target = self.get_branch_head(name)?;
        self.repo.set_head(&format!("refs/heads/{name}"))?;

        let commit = self.repo.find_commit(target)?;
        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        self.repo
            .reset(commit.as_object(), ResetType::Hard, Some(&mut checkout))?;
        self.repo.cleanup_state()?;

        debug!("Switched to branch '{}' at {}", name, short_id(target));
        Ok(())
    }

    /// Move a branch to `target` and check it out
    pub fn reset_branch(&self, name: &str, target: Oid) -> Result<()> {
        self.set_branch_target(name, target, "gitum: reset")?;
        self.switch_hard(name)
    }

    /// Detach HEAD at its current commit
    pub fn detach_head(&self) -> Result<()> {
        let oid = self.get_head_commit()?.id();
        self.repo.set_head_detached(oid)?;
        Ok(())
    }

    /// Restore several branch tips in one ref transaction: all or nothing
    pub fn restore_branches(&self, tips: &[(String, Oid)], log_message: &str) -> Result<()> {
        let mut tx = self.repo.transaction()?;
        for (name, _) in tips {
            tx.lock_ref(&format!("refs/heads/{name}"))?;
        }
        for (name, oid) in tips {
            tx.set_target(&format!("refs/heads/{name}"), *oid, None, log_message)?;
        }
        tx.commit()
            .map_err(|e| GitumError::backend(format!("Could not restore branches: {e}")))?;

        info!("Restored {} branch tips", tips.len());
        Ok(())
    }

    /// `ancestor` is `descendant` or reachable from it
    pub fn is_ancestor(&self, ancestor: Oid, descendant: Oid) -> Result<bool> {
        if ancestor == descendant {
            return Ok(true);
        }
        Ok(self.repo.graph_descendant_of(descendant, ancestor)?)
    }

    /// Commits reachable from `tip` but not from `base`, following first
    /// parents, oldest first
    pub fn first_parent_range(&self, base: Oid, tip: Oid) -> Result<Vec<Oid>> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.push(tip)?;
        revwalk.hide(base)?;
        revwalk.simplify_first_parent()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;

        let mut commits = Vec::new();
        for oid in revwalk {
            commits.push(oid?);
        }
        Ok(commits)
    }

    /// The first parent of a commit, if any
    pub fn first_parent(&self, oid: Oid) -> Result<Option<Oid>> {
        let commit = self.repo.find_commit(oid)?;
        Ok(commit.parent_ids().next())
    }

    pub fn commit_info(&self, oid: Oid) -> Result<CommitInfo> {
        let commit = self.repo.find_commit(oid)?;
        let author = commit.author();
        Ok(CommitInfo {
            id: oid,
            summary: commit.summary().unwrap_or("").to_string(),
            message: commit.message().unwrap_or("").to_string(),
            author_name: author.name().unwrap_or("").to_string(),
            author_email: author.email().unwrap_or("").to_string(),
            parent_count: commit.parent_count(),
        })
    }

    /// Tree id of a commit
    pub fn tree_of(&self, oid: Oid) -> Result<Oid> {
        Ok(self.repo.find_commit(oid)?.tree_id())
    }

    /// Cherry-pick `commit` onto HEAD and commit it with `message`.
    ///
    /// Content conflicts are not errors: the working tree keeps the conflict
    /// markers and the index keeps the conflict entries until
    /// [`finish_pick`](Self::finish_pick) finds them resolved.
    pub fn pick(&self, commit_id: Oid, message: &str) -> Result<PickOutcome> {
        let commit = self.repo.find_commit(commit_id)?;
        debug!("Replaying {} onto HEAD", short_id(commit_id));

        let mut checkout = CheckoutBuilder::new();
        checkout.allow_conflicts(true).conflict_style_merge(true);
        let mut opts = CherrypickOptions::new();
        opts.checkout_builder(checkout);

        self.repo
            .cherrypick(&commit, Some(&mut opts))
            .map_err(|e| {
                GitumError::backend(format!("Could not replay {}: {e}", short_id(commit_id)))
            })?;

        self.finish_pick(commit_id, message)
    }

    /// Commit the staged result of a replayed `commit_id` once its conflicts are resolved
    pub fn finish_pick(&self, commit_id: Oid, message: &str) -> Result<PickOutcome> {
        let mut index = self.repo.index()?;
        index.read(true)?;

        if index.has_conflicts() {
            let files = Self::conflicted_paths(&index)?;
            debug!("Replay of {} has {} conflicted paths", short_id(commit_id), files.len());
            return Ok(PickOutcome::Conflicted(files));
        }

        let tree_id = index.write_tree()?;
        let head = self.get_head_commit()?;
        if head.tree_id() == tree_id {
            self.repo.cleanup_state()?;
            debug!("Replay of {} is empty, dropping it", short_id(commit_id));
            return Ok(PickOutcome::Empty);
        }

        let original = self.repo.find_commit(commit_id)?;
        let tree = self.repo.find_tree(tree_id)?;
        let committer = self.get_signature()?;
        let new_id = self.repo.commit(
            Some("HEAD"),
            &original.author(),
            &committer,
            message,
            &tree,
            &[&head],
        )?;
        self.repo.cleanup_state()?;

        debug!("Replayed {} -> {}", short_id(commit_id), short_id(new_id));
        Ok(PickOutcome::Committed(new_id))
    }

    /// Get list of conflicted files
    pub fn get_conflicted_files(&self) -> Result<Vec<String>> {
        let mut index = self.repo.index()?;
        index.read(true)?;
        Self::conflicted_paths(&index)
    }

    fn conflicted_paths(index: &git2::Index) -> Result<Vec<String>> {
        let mut conflicts = Vec::new();
        for conflict in index.conflicts()? {
            let conflict = conflict?;
            let entry = conflict.our.or(conflict.their).or(conflict.ancestor);
            if let Some(entry) = entry {
                let path = String::from_utf8_lossy(&entry.path).into_owned();
                if !conflicts.contains(&path) {
                    conflicts.push(path);
                }
            }
        }
        Ok(conflicts)
    }

    /// Write a commit with the given tree content and parents, optionally
    /// advancing `refname` to it
    pub fn commit_files(
        &self,
        refname: Option<&str>,
        files: &[(String, Vec<u8>)],
        parents: &[Oid],
        message: &str,
    ) -> Result<Oid> {
        let tree_id = self.build_flat_tree(files)?;
        self.commit_tree(refname, tree_id, parents, message)
    }

    /// Write a tree holding `files` at its top level
    pub fn build_flat_tree(&self, files: &[(String, Vec<u8>)]) -> Result<Oid> {
        let mut builder = self.repo.treebuilder(None)?;
        for (name, content) in files {
            let blob = self.repo.blob(content)?;
            builder.insert(name.as_str(), blob, 0o100644)?;
        }
        Ok(builder.write()?)
    }

    /// Create a commit for an existing tree
    pub fn commit_tree(
        &self,
        refname: Option<&str>,
        tree_id: Oid,
        parents: &[Oid],
        message: &str,
    ) -> Result<Oid> {
        let tree = self.repo.find_tree(tree_id)?;
        let parent_commits = parents
            .iter()
            .map(|oid| self.repo.find_commit(*oid))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let parent_refs: Vec<&git2::Commit<'_>> = parent_commits.iter().collect();

        let signature = self.get_signature()?;
        let commit_id = self.repo.commit(
            refname,
            &signature,
            &signature,
            message,
            &tree,
            &parent_refs,
        )?;

        debug!("Created commit {} - {}", short_id(commit_id), message.lines().next().unwrap_or(""));
        Ok(commit_id)
    }

    /// Read a top-level file from the tree of `commit`
    pub fn read_file_at(&self, commit: Oid, path: &str) -> Result<Option<Vec<u8>>> {
        let tree = self.repo.find_commit(commit)?.tree()?;
        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let blob = entry.to_object(&self.repo)?.peel_to_blob()?;
        Ok(Some(blob.content().to_vec()))
    }

    /// Unified diff of a commit against its first parent
    pub fn patch_text(&self, oid: Oid) -> Result<String> {
        let commit = self.repo.find_commit(oid)?;
        let parent_tree = match commit.parent_ids().next() {
            Some(parent) => Some(self.repo.find_commit(parent)?.tree()?),
            None => None,
        };
        let tree = commit.tree()?;
        let diff = self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;

        let mut out = Vec::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            if matches!(line.origin(), '+' | '-' | ' ') {
                out.push(line.origin() as u8);
            }
            out.extend_from_slice(line.content());
            true
        })?;

        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Fetch from a remote using its configured refspecs
    pub fn fetch(&self, remote_name: &str) -> Result<()> {
        info!("Fetching from {}", remote_name);

        let mut remote = self.repo.find_remote(remote_name).map_err(|e| {
            GitumError::backend(format!("No remote '{remote_name}' found: {e}"))
        })?;

        remote
            .fetch::<&str>(&[], None, None)
            .map_err(|e| GitumError::backend(format!("Fetch from '{remote_name}' failed: {e}")))?;

        debug!("Fetch completed successfully");
        Ok(())
    }

    /// Tip of `refs/remotes/<remote>/<branch>`, if fetched
    pub fn remote_branch_head(&self, remote: &str, branch: &str) -> Option<Oid> {
        self.repo
            .refname_to_id(&format!("refs/remotes/{remote}/{branch}"))
            .ok()
    }

    /// Remote-tracking branches of `remote` as (branch name, tip) pairs
    pub fn remote_branches(&self, remote: &str) -> Result<Vec<(String, Oid)>> {
        let prefix = format!("{remote}/");
        let mut branches = Vec::new();
        for branch in self.repo.branches(Some(BranchType::Remote))? {
            let (branch, _) = branch?;
            let Some(name) = branch.name()? else { continue };
            let Some(short) = name.strip_prefix(&prefix) else { continue };
            if short == "HEAD" {
                continue;
            }
            if let Ok(commit) = branch.get().peel_to_commit() {
                branches.push((short.to_string(), commit.id()));
            }
        }
        Ok(branches)
    }

    /// Fast-forward a local branch that is not checked out to `target`
    pub fn fast_forward(&self, name: &str, target: Oid) -> Result<FastForward> {
        let local = self.get_branch_head(name)?;
        if local == target {
            return Ok(FastForward::UpToDate);
        }

        if self.repo.graph_descendant_of(target, local)? {
            self.set_branch_target(name, target, "gitum: fast-forward")?;
            info!("Fast-forwarded '{}' to {}", name, short_id(target));
            return Ok(FastForward::Advanced);
        }

        if self.repo.graph_descendant_of(local, target)? {
            return Ok(FastForward::LocalAhead);
        }

        Err(GitumError::backend(format!(
            "Cannot fast-forward '{name}' from {} to {}: histories have diverged",
            short_id(local),
            short_id(target)
        )))
    }

    /// Get a signature for commits
    fn get_signature(&self) -> Result<Signature<'static>> {
        if let Ok(config) = self.repo.config() {
            if let (Ok(name), Ok(email)) = (
                config.get_string("user.name"),
                config.get_string("user.email"),
            ) {
                return Ok(Signature::now(&name, &email)?);
            }
        }

        // Fallback to default signature
        Ok(Signature::now("gitum", "gitum@localhost")?)
    }
}
