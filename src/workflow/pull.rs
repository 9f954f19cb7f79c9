use super::state::{parse_oids, to_strings, OperationKind, OperationState, Plan, PullPlan};
use super::{Resumed, Session, Signal};
use crate::config::Role;
use crate::errors::{GitumError, Result};
use crate::git::patches::origin_of;
use crate::git::{short_id, FastForward, PatchSeries, PickOutcome};
use git2::Oid;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// Outcome of a completed pull
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullReport {
    /// The upstream branch moved forward
    pub upstream_advanced: bool,
    /// Remote patches replayed onto dev
    pub applied: usize,
}

/// Fast-forwards upstream from a remote and replays the patches the remote
/// published that dev does not carry yet
pub struct PullEngine {
    session: Session,
}

impl PullEngine {
    pub fn begin(path: &Path) -> Result<Self> {
        Ok(Self {
            session: Session::begin(path)?,
        })
    }

    pub fn run(self, remote: &str) -> Result<PullReport> {
        self.session.require_clean()?;

        let head = self.session.repo.get_current_branch()?;
        let snapshot = self.session.snapshot()?;
        let mut state = OperationState::new(
            head,
            &snapshot,
            Plan::Pull(PullPlan {
                remote: remote.to_string(),
                picks: Vec::new(),
            }),
        );
        self.session.store.save(&state)?;

        let picks = match self.prepare(remote) {
            Ok(picks) => picks,
            Err(err) => {
                warn!("Pull from '{remote}' failed before applying patches; restoring branches");
                if let Err(rollback) = self.session.abort(&state) {
                    warn!("Could not restore branches: {rollback}");
                }
                return Err(err);
            }
        };
        state.plan = Plan::Pull(PullPlan {
            remote: remote.to_string(),
            picks: to_strings(&picks),
        });

        if picks.is_empty() {
            info!("No new patches on '{remote}'");
            return self.complete(state);
        }

        info!(
            "Applying {} new patches from '{remote}' onto '{}'",
            picks.len(),
            self.session.branch(Role::Dev)
        );
        self.session.store.save(&state)?;
        self.drive(state)
    }

    /// Check out dev, fetch, fast-forward upstream and list the patches to apply
    fn prepare(&self, remote: &str) -> Result<Vec<Oid>> {
        self.session.repo.switch_hard(self.session.branch(Role::Dev))?;
        self.session.repo.fetch(remote)?;

        let upstream = self.session.branch(Role::Upstream);
        let remote_upstream = self
            .session
            .repo
            .remote_branch_head(remote, upstream)
            .ok_or_else(|| {
                GitumError::config(format!("Remote '{remote}' has no '{upstream}' branch"))
            })?;
        match self.session.repo.fast_forward(upstream, remote_upstream)? {
            FastForward::UpToDate => debug!("'{}' is up to date", upstream),
            FastForward::Advanced => {}
            FastForward::LocalAhead => {
                info!("'{}' is ahead of {}/{}; keeping it", upstream, remote, upstream)
            }
        }

        self.new_patches(remote)
    }

    pub fn resume(path: &Path, signal: Signal) -> Result<Resumed<PullReport>> {
        let (session, state) = Session::resume(path, OperationKind::Pull)?;
        let engine = Self { session };
        match signal {
            Signal::Abort => {
                engine.session.abort(&state)?;
                Ok(Resumed::Aborted)
            }
            Signal::Continue => engine.continue_step(state).map(Resumed::Completed),
        }
    }

    /// Commits on the remote rebased branch for patches dev lacks, in queue order
    fn new_patches(&self, remote: &str) -> Result<Vec<Oid>> {
        let repo = &self.session.repo;
        let patches = self.session.branch(Role::Patches);

        let Some(remote_patches) = repo.remote_branch_head(remote, patches) else {
            warn!("Remote '{remote}' publishes no '{patches}' branch");
            return Ok(Vec::new());
        };
        let local_patches = self.session.tip(Role::Patches)?;
        if repo.is_ancestor(remote_patches, local_patches)? {
            debug!("Remote patch queue is already known locally");
            return Ok(Vec::new());
        }

        let remote_series = PatchSeries::load(repo, remote_patches)?;
        let local_series = PatchSeries::load(repo, local_patches)?;
        let mut known: HashSet<String> = local_series.origins().map(str::to_string).collect();

        let merge_tip = self.session.tip(Role::Merge)?;
        let dev_tip = self.session.tip(Role::Dev)?;
        for oid in repo.first_parent_range(merge_tip, dev_tip)? {
            let info = repo.commit_info(oid)?;
            known.insert(origin_of(&info.message).unwrap_or_else(|| oid.to_string()));
        }

        let wanted: Vec<&str> = remote_series
            .origins()
            .filter(|origin| !known.contains(*origin))
            .collect();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let rebased = self.session.branch(Role::Rebased);
        let merge = self.session.branch(Role::Merge);
        let remote_rebased = repo.remote_branch_head(remote, rebased).ok_or_else(|| {
            GitumError::config(format!("Remote '{remote}' has no '{rebased}' branch"))
        })?;
        let remote_merge = repo.remote_branch_head(remote, merge).ok_or_else(|| {
            GitumError::config(format!("Remote '{remote}' has no '{merge}' branch"))
        })?;

        let mut by_origin = HashMap::new();
        for oid in repo.first_parent_range(remote_merge, remote_rebased)? {
            if let Some(origin) = origin_of(&repo.commit_info(oid)?.message) {
                by_origin.insert(origin, oid);
            }
        }

        wanted
            .into_iter()
            .map(|origin| {
                by_origin.get(origin).copied().ok_or_else(|| {
                    GitumError::backend(format!(
                        "'{remote}/{rebased}' has no commit for published patch {origin}"
                    ))
                })
            })
            .collect()
    }

    fn continue_step(mut self, mut state: OperationState) -> Result<PullReport> {
        let picks = parse_oids(&plan(&state)?.picks)?;
        let dev = self.session.branch(Role::Dev);
        if self.session.repo.get_current_branch()?.as_deref() != Some(dev) {
            return Err(GitumError::invalid_state(format!(
                "The suspended pull expects '{dev}' to be checked out"
            )));
        }

        if let Some(oid) = picks.get(state.cursor).copied() {
            let message = self.session.repo.commit_info(oid)?.message;
            if let PickOutcome::Conflicted(files) = self.session.repo.finish_pick(oid, &message)? {
                return Err(self.session.suspend(&state, files));
            }
            state.cursor += 1;
            self.session.store.save(&state)?;
        }

        self.drive(state)
    }

    fn drive(mut self, mut state: OperationState) -> Result<PullReport> {
        let picks = parse_oids(&plan(&state)?.picks)?;

        while let Some(oid) = picks.get(state.cursor).copied() {
            let message = self.session.repo.commit_info(oid)?.message;
            match self.session.repo.pick(oid, &message)? {
                PickOutcome::Committed(new_id) => {
                    debug!("Pulled patch {} as {}", short_id(oid), short_id(new_id));
                }
                PickOutcome::Empty => debug!("Patch {} changes nothing on dev", short_id(oid)),
                PickOutcome::Conflicted(files) => {
                    return Err(self.session.suspend(&state, files));
                }
            }
            state.cursor += 1;
            self.session.store.save(&state)?;
        }

        self.complete(state)
    }

    fn complete(self, state: OperationState) -> Result<PullReport> {
        let upstream_advanced =
            self.session.tip(Role::Upstream)? != state.snapshot_tip(Role::Upstream)?;
        let applied = plan(&state)?.picks.len();
        self.session.finish(&state)?;

        Ok(PullReport {
            upstream_advanced,
            applied,
        })
    }
}

fn plan(state: &OperationState) -> Result<&PullPlan> {
    match &state.plan {
        Plan::Pull(plan) => Ok(plan),
        _ => Err(GitumError::config("Operation record does not hold a pull plan")),
    }
}
