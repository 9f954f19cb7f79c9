use super::state::{parse_oids, to_strings, OperationKind, OperationState, Plan, UpdatePlan};
use super::{Resumed, Session, Signal};
use crate::config::Role;
use crate::errors::{GitumError, Result};
use crate::git::patches::{origin_of, with_origin};
use crate::git::{short_id, PickOutcome};
use git2::Oid;
use tracing::{debug, info, warn};

/// Outcome of a completed update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    /// Patches in the published queue
    pub patches: usize,
    /// False when the rebased branch already carried exactly these patches
    pub rebuilt: bool,
}

/// Captures dev commits as the patch set: rebuilds the rebased branch on the
/// merge tip and republishes the queue.
///
/// The rebuild base is the merge tip rather than the upstream tip. Upstream
/// commits not yet merged are walked one at a time by `merge`, so capturing
/// never skips those rounds; when merge equals upstream the two bases are the
/// same commit.
pub struct UpdateEngine {
    session: Session,
}

impl UpdateEngine {
    pub fn begin(path: &std::path::Path) -> Result<Self> {
        Ok(Self {
            session: Session::begin(path)?,
        })
    }

    pub fn run(self, count: usize) -> Result<UpdateReport> {
        if count == 0 {
            return Err(GitumError::precondition(
                "Nothing to capture: the commit count must be at least 1",
            ));
        }
        self.session.require_clean()?;

        let dev_tip = self.session.tip(Role::Dev)?;
        let merge_tip = self.session.tip(Role::Merge)?;
        let rebased_tip = self.session.tip(Role::Rebased)?;

        let picks = self.capture(dev_tip, merge_tip, count)?;
        let origins = picks
            .iter()
            .map(|oid| self.origin_for(*oid))
            .collect::<Result<Vec<_>>>()?;

        if self.already_applied(rebased_tip, merge_tip, &origins)? {
            info!(
                "'{}' already carries these {} patches",
                self.session.branch(Role::Rebased),
                origins.len()
            );
            let patches = self
                .session
                .publish_patches(merge_tip, "Refresh patch queue")?;
            return Ok(UpdateReport {
                patches,
                rebuilt: false,
            });
        }

        let head = self.session.repo.get_current_branch()?;
        let snapshot = self.session.snapshot()?;
        let state = OperationState::new(
            head,
            &snapshot,
            Plan::Update(UpdatePlan {
                picks: to_strings(&picks),
            }),
        );
        self.session.store.save(&state)?;

        info!(
            "Rebuilding '{}' on {} with {} patches",
            self.session.branch(Role::Rebased),
            short_id(merge_tip),
            picks.len()
        );
        let rebased = self.session.branch(Role::Rebased).to_string();
        self.session.repo.reset_branch(&rebased, merge_tip)?;
        self.drive(state)
    }

    pub fn resume(path: &std::path::Path, signal: Signal) -> Result<Resumed<UpdateReport>> {
        let (session, state) = Session::resume(path, OperationKind::Update)?;
        let engine = Self { session };
        match signal {
            Signal::Abort => {
                engine.session.abort(&state)?;
                Ok(Resumed::Aborted)
            }
            Signal::Continue => engine.continue_step(state).map(Resumed::Completed),
        }
    }

    /// The last `count` first-parent commits of dev, oldest first
    fn capture(&self, dev_tip: Oid, merge_tip: Oid, count: usize) -> Result<Vec<Oid>> {
        let repo = &self.session.repo;
        let mut picks = Vec::with_capacity(count);
        let mut current = dev_tip;

        for taken in 0..count {
            if repo.is_ancestor(current, merge_tip)? {
                return Err(GitumError::precondition(format!(
                    "'{}' has only {taken} commits on top of '{}'; cannot capture {count}",
                    self.session.branch(Role::Dev),
                    self.session.branch(Role::Merge)
                )));
            }

            let info = repo.commit_info(current)?;
            if info.parent_count > 1 {
                return Err(GitumError::precondition(format!(
                    "Commit {} is a merge commit and cannot be captured as a patch",
                    short_id(current)
                )));
            }
            picks.push(current);

            current = match repo.first_parent(current)? {
                Some(parent) => parent,
                None if taken + 1 == count => break,
                None => {
                    return Err(GitumError::precondition(format!(
                        "Reached the root commit after {} commits; cannot capture {count}",
                        taken + 1
                    )))
                }
            };
        }

        picks.reverse();
        Ok(picks)
    }

    /// Stable identity of a captured commit: its recorded origin, or its own id
    fn origin_for(&self, oid: Oid) -> Result<String> {
        let info = self.session.repo.commit_info(oid)?;
        Ok(origin_of(&info.message).unwrap_or_else(|| oid.to_string()))
    }

    fn message_for(&self, oid: Oid) -> Result<String> {
        let info = self.session.repo.commit_info(oid)?;
        Ok(with_origin(&info.message, &self.origin_for(oid)?))
    }

    /// The rebased chain above the merge tip carries exactly `origins`, in order
    fn already_applied(&self, rebased_tip: Oid, merge_tip: Oid, origins: &[String]) -> Result<bool> {
        let repo = &self.session.repo;
        let mut found = Vec::new();
        let mut current = rebased_tip;

        while current != merge_tip {
            if found.len() >= origins.len() {
                return Ok(false);
            }
            let info = repo.commit_info(current)?;
            let Some(origin) = origin_of(&info.message) else {
                return Ok(false);
            };
            found.push(origin);
            current = match repo.first_parent(current)? {
                Some(parent) => parent,
                None => return Ok(false),
            };
        }

        found.reverse();
        Ok(found == origins)
    }

    fn continue_step(mut self, mut state: OperationState) -> Result<UpdateReport> {
        let picks = parse_oids(&plan(&state)?.picks)?;
        self.expect_on_rebased()?;

        if let Some(oid) = picks.get(state.cursor).copied() {
            let message = self.message_for(oid)?;
            if let PickOutcome::Conflicted(files) = self.session.repo.finish_pick(oid, &message)? {
                return Err(self.session.suspend(&state, files));
            }
            state.cursor += 1;
            self.session.store.save(&state)?;
        }

        self.drive(state)
    }

    fn drive(mut self, mut state: OperationState) -> Result<UpdateReport> {
        let picks = parse_oids(&plan(&state)?.picks)?;

        while let Some(oid) = picks.get(state.cursor).copied() {
            let message = self.message_for(oid)?;
            match self.session.repo.pick(oid, &message)? {
                PickOutcome::Committed(new_id) => {
                    debug!("Captured {} as {}", short_id(oid), short_id(new_id));
                }
                PickOutcome::Empty => {
                    warn!("{} is already part of the merge branch; dropped", short_id(oid));
                }
                PickOutcome::Conflicted(files) => {
                    return Err(self.session.suspend(&state, files));
                }
            }
            state.cursor += 1;
            self.session.store.save(&state)?;
        }

        let reason = format!(
            "Capture {} patches from {}",
            picks.len(),
            self.session.branch(Role::Dev)
        );
        let merge_tip = self.session.tip(Role::Merge)?;
        let patches = self.session.publish_patches(merge_tip, &reason)?;
        self.session.finish(&state)?;

        Ok(UpdateReport {
            patches,
            rebuilt: true,
        })
    }

    fn expect_on_rebased(&self) -> Result<()> {
        let rebased = self.session.branch(Role::Rebased);
        if self.session.repo.get_current_branch()?.as_deref() != Some(rebased) {
            return Err(GitumError::invalid_state(format!(
                "The suspended update expects '{rebased}' to be checked out"
            )));
        }
        Ok(())
    }
}

fn plan(state: &OperationState) -> Result<&UpdatePlan> {
    match &state.plan {
        Plan::Update(plan) => Ok(plan),
        _ => Err(GitumError::config("Operation record does not hold an update plan")),
    }
}
