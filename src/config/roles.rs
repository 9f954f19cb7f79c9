use crate::errors::{GitumError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Current on-disk format of the role mapping
pub const ROLE_MAPPING_VERSION: u32 = 1;

/// Logical role of a managed branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Externally evolving history the local work is based on
    Upstream,
    /// Last upstream point reconciled with dev
    Merge,
    /// The user's working branch
    Dev,
    /// Merge tip plus the patch set
    Rebased,
    /// Published log of the patch series
    Patches,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Upstream,
        Role::Merge,
        Role::Dev,
        Role::Rebased,
        Role::Patches,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Upstream => "upstream",
            Role::Merge => "merge",
            Role::Dev => "dev",
            Role::Rebased => "rebased",
            Role::Patches => "patches",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Association between branch roles and the actual branch names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMapping {
    #[serde(default = "default_version")]
    pub version: u32,
    pub upstream: String,
    pub merge: String,
    pub dev: String,
    pub rebased: String,
    pub patches: String,
}

fn default_version() -> u32 {
    ROLE_MAPPING_VERSION
}

impl RoleMapping {
    /// Build a mapping, rejecting invalid or repeated branch names
    pub fn new(
        merge: &str,
        dev: &str,
        upstream: &str,
        rebased: &str,
        patches: &str,
    ) -> Result<Self> {
        let mapping = Self {
            version: ROLE_MAPPING_VERSION,
            upstream: upstream.to_string(),
            merge: merge.to_string(),
            dev: dev.to_string(),
            rebased: rebased.to_string(),
            patches: patches.to_string(),
        };
        mapping.validate()?;
        Ok(mapping)
    }

    pub fn branch(&self, role: Role) -> &str {
        match role {
            Role::Upstream => &self.upstream,
            Role::Merge => &self.merge,
            Role::Dev => &self.dev,
            Role::Rebased => &self.rebased,
            Role::Patches => &self.patches,
        }
    }

    /// Role played by `branch`, if it is managed
    pub fn role_of(&self, branch: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|role| self.branch(*role) == branch)
    }

    /// (role, branch name) pairs in a stable order
    pub fn iter(&self) -> impl Iterator<Item = (Role, &str)> + '_ {
        Role::ALL.into_iter().map(move |role| (role, self.branch(role)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != ROLE_MAPPING_VERSION {
            return Err(GitumError::config(format!(
                "Unsupported role mapping version {}",
                self.version
            )));
        }

        let mut seen = HashSet::new();
        for (role, name) in self.iter() {
            if name.trim().is_empty() {
                return Err(GitumError::precondition(format!(
                    "Branch name for role '{role}' is empty"
                )));
            }
            if !git2::Branch::name_is_valid(name).unwrap_or(false) {
                return Err(GitumError::precondition(format!(
                    "'{name}' is not a valid branch name (role '{role}')"
                )));
            }
            if !seen.insert(name) {
                return Err(GitumError::precondition(format!(
                    "Branch name '{name}' is used for more than one role"
                )));
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let mapping: Self = serde_json::from_str(content)
            .map_err(|e| GitumError::config(format!("Corrupt role mapping: {e}")))?;
        mapping.validate()?;
        Ok(mapping)
    }
}
