use super::state::{parse_oid, parse_oids, to_strings, MergePlan, OperationKind, OperationState, Plan};
use super::{Resumed, Session, Signal};
use crate::config::Role;
use crate::errors::{GitumError, Result};
use crate::git::{short_id, PickOutcome};
use std::path::Path;
use tracing::{debug, info};

/// Outcome of a completed merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    /// Upstream commits integrated; zero when already up to date
    pub upstream_commits: usize,
    /// Patches in the published queue
    pub patches: usize,
    /// Dev carried changes that were never captured as patches
    pub carried_local_edits: bool,
}

/// Walks upstream one commit at a time, replaying the patch set onto each
/// upstream commit, then moves dev onto the new rebased tip
pub struct MergeEngine {
    session: Session,
}

impl MergeEngine {
    pub fn begin(path: &Path) -> Result<Self> {
        Ok(Self {
            session: Session::begin(path)?,
        })
    }

    pub fn run(self) -> Result<MergeReport> {
        self.session.require_clean()?;

        let merge_tip = self.session.tip(Role::Merge)?;
        let upstream_tip = self.session.tip(Role::Upstream)?;
        let rebased_tip = self.session.tip(Role::Rebased)?;
        let repo = &self.session.repo;

        if merge_tip == upstream_tip || repo.is_ancestor(upstream_tip, merge_tip)? {
            info!(
                "'{}' is already up to date with '{}'",
                self.session.branch(Role::Merge),
                self.session.branch(Role::Upstream)
            );
            return Ok(MergeReport {
                upstream_commits: 0,
                patches: self
                    .session
                    .publish_patches(merge_tip, "Refresh patch queue")?,
                carried_local_edits: false,
            });
        }
        if !repo.is_ancestor(merge_tip, upstream_tip)? {
            return Err(GitumError::precondition(format!(
                "'{}' is not an ancestor of '{}'; upstream history was rewritten",
                self.session.branch(Role::Merge),
                self.session.branch(Role::Upstream)
            )));
        }
        if !repo.is_ancestor(merge_tip, rebased_tip)? {
            return Err(GitumError::config(format!(
                "'{}' is not based on '{}'; run 'gitum update' to rebuild it",
                self.session.branch(Role::Rebased),
                self.session.branch(Role::Merge)
            )));
        }

        let upstream = repo.first_parent_range(merge_tip, upstream_tip)?;
        let carried = repo.first_parent_range(merge_tip, rebased_tip)?;
        info!(
            "Merging {} upstream commits with {} patches",
            upstream.len(),
            carried.len()
        );

        let head = repo.get_current_branch()?;
        let snapshot = self.session.snapshot()?;
        let state = OperationState::new(
            head,
            &snapshot,
            Plan::Merge(MergePlan {
                upstream: to_strings(&upstream),
                round: 0,
                carried: to_strings(&carried),
                rebuilt: Vec::new(),
                local_edits: None,
            }),
        );
        self.session.store.save(&state)?;

        let rebased = self.session.branch(Role::Rebased).to_string();
        self.session.repo.reset_branch(&rebased, upstream[0])?;
        self.drive(state)
    }

    pub fn resume(path: &Path, signal: Signal) -> Result<Resumed<MergeReport>> {
        let (session, state) = Session::resume(path, OperationKind::Merge)?;
        let engine = Self { session };
        match signal {
            Signal::Abort => {
                engine.session.abort(&state)?;
                Ok(Resumed::Aborted)
            }
            Signal::Continue => engine.continue_step(state).map(Resumed::Completed),
        }
    }

    fn continue_step(mut self, mut state: OperationState) -> Result<MergeReport> {
        let mut plan = plan(&state)?.clone();
        let upstream = parse_oids(&plan.upstream)?;

        if plan.round >= upstream.len() {
            self.expect_on(Role::Dev)?;
            let Some(local_edits) = plan.local_edits.as_deref() else {
                return self.reconcile(state);
            };
            let local_edits = parse_oid(local_edits)?;
            if let PickOutcome::Conflicted(files) = self
                .session
                .repo
                .finish_pick(local_edits, &self.local_edits_message())?
            {
                return Err(self.session.suspend(&state, files));
            }
            return self.complete(state);
        }

        self.expect_on(Role::Rebased)?;
        let carried = parse_oids(&plan.carried)?;
        if let Some(oid) = carried.get(state.cursor).copied() {
            let message = self.session.repo.commit_info(oid)?.message;
            match self.session.repo.finish_pick(oid, &message)? {
                PickOutcome::Committed(new_id) => plan.rebuilt.push(new_id.to_string()),
                PickOutcome::Empty => {}
                PickOutcome::Conflicted(files) => {
                    return Err(self.session.suspend(&state, files));
                }
            }
            state.cursor += 1;
            state.plan = Plan::Merge(plan);
            self.session.store.save(&state)?;
        }

        self.drive(state)
    }

    /// Run the remaining upstream rounds, then reconcile dev
    fn drive(mut self, mut state: OperationState) -> Result<MergeReport> {
        let mut plan = plan(&state)?.clone();
        let upstream = parse_oids(&plan.upstream)?;

        while plan.round < upstream.len() {
            let carried = parse_oids(&plan.carried)?;
            while let Some(oid) = carried.get(state.cursor).copied() {
                let message = self.session.repo.commit_info(oid)?.message;
                match self.session.repo.pick(oid, &message)? {
                    PickOutcome::Committed(new_id) => plan.rebuilt.push(new_id.to_string()),
                    PickOutcome::Empty => {
                        info!(
                            "Patch {} is part of upstream {}; dropped",
                            short_id(oid),
                            short_id(upstream[plan.round])
                        );
                    }
                    PickOutcome::Conflicted(files) => {
                        state.plan = Plan::Merge(plan);
                        return Err(self.session.suspend(&state, files));
                    }
                }
                state.cursor += 1;
                state.plan = Plan::Merge(plan.clone());
                self.session.store.save(&state)?;
            }

            debug!(
                "Round {} done: patches replayed onto upstream {}",
                plan.round + 1,
                short_id(upstream[plan.round])
            );

            plan.carried = std::mem::take(&mut plan.rebuilt);
            plan.round += 1;
            state.cursor = 0;
            if let Some(next) = upstream.get(plan.round).copied() {
                let rebased = self.session.branch(Role::Rebased).to_string();
                self.session.repo.reset_branch(&rebased, next)?;
            }
            state.plan = Plan::Merge(plan.clone());
            self.session.store.save(&state)?;
        }

        self.reconcile(state)
    }

    /// Move dev onto the rebuilt rebased tip, carrying over dev changes that
    /// were never captured as patches
    fn reconcile(mut self, mut state: OperationState) -> Result<MergeReport> {
        let mut plan = plan(&state)?.clone();
        let repo = &self.session.repo;

        let dev_start = state.snapshot_tip(Role::Dev)?;
        let rebased_start = state.snapshot_tip(Role::Rebased)?;
        let dev_tree = repo.tree_of(dev_start)?;

        let local_edits = if dev_tree != repo.tree_of(rebased_start)? {
            let message = self.local_edits_message();
            Some(repo.commit_tree(None, dev_tree, &[rebased_start], &message)?)
        } else {
            None
        };
        plan.local_edits = local_edits.map(|oid| oid.to_string());
        state.plan = Plan::Merge(plan);
        self.session.store.save(&state)?;

        let dev = self.session.branch(Role::Dev).to_string();
        let rebased_tip = self.session.tip(Role::Rebased)?;
        self.session.repo.reset_branch(&dev, rebased_tip)?;

        if let Some(oid) = local_edits {
            info!("Carrying uncaptured changes of '{dev}' forward");
            let message = self.local_edits_message();
            if let PickOutcome::Conflicted(files) = self.session.repo.pick(oid, &message)? {
                return Err(self.session.suspend(&state, files));
            }
        }

        self.complete(state)
    }

    /// Advance the merge branch to the last upstream commit walked and
    /// publish the rebuilt queue on top of it
    fn complete(self, state: OperationState) -> Result<MergeReport> {
        let plan = plan(&state)?;
        let reached = plan
            .upstream
            .last()
            .map(|oid| parse_oid(oid))
            .transpose()?
            .ok_or_else(|| GitumError::config("Merge record walks no upstream commits"))?;

        self.session.repo.set_branch_target(
            self.session.branch(Role::Merge),
            reached,
            "gitum: merge upstream",
        )?;
        let reason = format!(
            "Rebase patches onto {} {}",
            self.session.branch(Role::Upstream),
            short_id(reached)
        );
        let patches = self.session.publish_patches(reached, &reason)?;
        self.session.finish(&state)?;

        Ok(MergeReport {
            upstream_commits: plan.upstream.len(),
            patches,
            carried_local_edits: plan.local_edits.is_some(),
        })
    }

    fn local_edits_message(&self) -> String {
        format!(
            "Carry forward local changes on {}",
            self.session.branch(Role::Dev)
        )
    }

    fn expect_on(&self, role: Role) -> Result<()> {
        let branch = self.session.branch(role);
        if self.session.repo.get_current_branch()?.as_deref() != Some(branch) {
            return Err(GitumError::invalid_state(format!(
                "The suspended merge expects '{branch}' to be checked out"
            )));
        }
        Ok(())
    }
}

fn plan(state: &OperationState) -> Result<&MergePlan> {
    match &state.plan {
        Plan::Merge(plan) => Ok(plan),
        _ => Err(GitumError::config("Operation record does not hold a merge plan")),
    }
}
