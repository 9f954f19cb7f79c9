use crate::config::Role;
use crate::errors::{GitumError, Result};
use crate::utils::atomic_file;
use chrono::{DateTime, Utc};
use git2::Oid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Current on-disk format of the operation record
pub const STATE_VERSION: u32 = 1;

const STATE_FILE: &str = "state.json";

/// Long-running workflow that may be suspended on a conflict
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Update,
    Merge,
    Pull,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationKind::Update => "update",
            OperationKind::Merge => "merge",
            OperationKind::Pull => "pull",
        })
    }
}

/// Dev commits replayed onto the merge tip, oldest first
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan {
    pub picks: Vec<String>,
}

/// Upstream walk state of a merge.
///
/// Each round replays `carried` onto `upstream[round]`; commits produced by
/// the round collect in `rebuilt` and become the next round's `carried`.
/// Once `round == upstream.len()` the merge is reconciling dev, with
/// `local_edits` holding the synthetic commit of uncaptured dev changes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    pub upstream: Vec<String>,
    pub round: usize,
    pub carried: Vec<String>,
    pub rebuilt: Vec<String>,
    pub local_edits: Option<String>,
}

/// Remote patch commits replayed onto dev
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PullPlan {
    pub remote: String,
    pub picks: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Plan {
    Update(UpdatePlan),
    Merge(MergePlan),
    Pull(PullPlan),
}

impl Plan {
    pub fn kind(&self) -> OperationKind {
        match self {
            Plan::Update(_) => OperationKind::Update,
            Plan::Merge(_) => OperationKind::Merge,
            Plan::Pull(_) => OperationKind::Pull,
        }
    }
}

/// Durable record of an in-progress operation
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OperationState {
    pub version: u32,
    pub id: Uuid,
    pub kind: OperationKind,
    /// Index of the next step to apply within the current plan stage
    pub cursor: usize,
    pub started_at: DateTime<Utc>,
    /// Branch checked out when the operation started
    pub head: Option<String>,
    /// Tips of every role branch before the first mutation
    pub snapshot: BTreeMap<Role, String>,
    pub plan: Plan,
}

impl OperationState {
    pub fn new(head: Option<String>, snapshot: &BTreeMap<Role, Oid>, plan: Plan) -> Self {
        Self {
            version: STATE_VERSION,
            id: Uuid::new_v4(),
            kind: plan.kind(),
            cursor: 0,
            started_at: Utc::now(),
            head,
            snapshot: snapshot
                .iter()
                .map(|(role, oid)| (*role, oid.to_string()))
                .collect(),
            plan,
        }
    }

    /// Tip of `role` recorded before the operation started
    pub fn snapshot_tip(&self, role: Role) -> Result<Oid> {
        let value = self.snapshot.get(&role).ok_or_else(|| {
            GitumError::config(format!("Operation record has no snapshot for '{role}'"))
        })?;
        parse_oid(value)
    }

    fn validate(&self) -> Result<()> {
        if self.version != STATE_VERSION {
            return Err(GitumError::config(format!(
                "Unsupported operation record version {}",
                self.version
            )));
        }
        if self.plan.kind() != self.kind {
            return Err(GitumError::config(format!(
                "Operation record for {} carries a {} plan",
                self.kind,
                self.plan.kind()
            )));
        }
        for role in Role::ALL {
            self.snapshot_tip(role)?;
        }
        Ok(())
    }
}

/// Parse a commit id persisted in the operation record
pub fn parse_oid(value: &str) -> Result<Oid> {
    Oid::from_str(value)
        .map_err(|e| GitumError::config(format!("Corrupt commit id '{value}' in operation record: {e}")))
}

pub fn parse_oids(values: &[String]) -> Result<Vec<Oid>> {
    values.iter().map(|value| parse_oid(value)).collect()
}

pub fn to_strings(oids: &[Oid]) -> Vec<String> {
    oids.iter().map(Oid::to_string).collect()
}

/// `state.json` in the gitum metadata directory
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(metadata_dir: &Path) -> Self {
        Self {
            path: metadata_dir.join(STATE_FILE),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the operation record, if one exists
    pub fn load(&self) -> Result<Option<OperationState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path)
            .map_err(|e| GitumError::config(format!("Failed to read operation record: {e}")))?;
        let state: OperationState = serde_json::from_str(&json)
            .map_err(|e| GitumError::config(format!("Failed to parse operation record: {e}")))?;
        state.validate()?;

        tracing::debug!("Loaded {} operation record from {:?}", state.kind, self.path);
        Ok(Some(state))
    }

    pub fn save(&self, state: &OperationState) -> Result<()> {
        atomic_file::write_json(&self.path, state)?;
        tracing::debug!(
            "Saved {} operation record (cursor {}) to {:?}",
            state.kind,
            state.cursor,
            self.path
        );
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                GitumError::config(format!("Failed to delete operation record: {e}"))
            })?;
            tracing::debug!("Deleted operation record");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn snapshot() -> BTreeMap<Role, Oid> {
        Role::ALL
            .into_iter()
            .map(|role| (role, Oid::from_str("0123456789abcdef0123456789abcdef01234567").unwrap()))
            .collect()
    }

    #[test]
    fn test_state_save_load_clear() {
        let tmp = TempDir::new().unwrap();
        let store = StateStore::new(tmp.path());
        assert!(store.load().unwrap().is_none());

        let mut state = OperationState::new(
            Some("dev".to_string()),
            &snapshot(),
            Plan::Merge(MergePlan {
                upstream: vec!["a".repeat(40)],
                round: 0,
                carried: vec![],
                rebuilt: vec![],
                local_edits: None,
            }),
        );
        state.cursor = 3;
        store.save(&state).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.kind, OperationKind::Merge);
        assert_eq!(loaded.cursor, 3);
        assert_eq!(loaded.id, state.id);
        assert_eq!(loaded.plan, state.plan);
        assert_eq!(loaded.snapshot_tip(Role::Dev).unwrap(), snapshot()[&Role::Dev]);

        store.clear().unwrap();
        store.clear().unwrap();
        assert!(!store.exists());
    }

    #[test]
    fn test_corrupt_record_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let store = StateStore::new(tmp.path());
        fs::write(tmp.path().join(STATE_FILE), "{ not json").unwrap();
        assert!(matches!(store.load(), Err(GitumError::Config(_))));
    }

    #[test]
    fn test_mismatched_plan_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = StateStore::new(tmp.path());
        let mut state = OperationState::new(
            None,
            &snapshot(),
            Plan::Update(UpdatePlan { picks: vec![] }),
        );
        state.kind = OperationKind::Pull;
        store.save(&state).unwrap();
        assert!(matches!(store.load(), Err(GitumError::Config(_))));
    }

    #[test]
    fn test_kind_display_is_lowercase() {
        assert_eq!(OperationKind::Update.to_string(), "update");
        assert_eq!(OperationKind::Merge.to_string(), "merge");
        assert_eq!(OperationKind::Pull.to_string(), "pull");
    }
}
