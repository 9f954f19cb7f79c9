//! The published patch queue.
//!
//! The patches branch holds one flat tree per revision of the queue: the
//! tracked role mapping, a quilt-style `series` file listing patch files in
//! application order, and one `git format-patch` style file per patch.
//! Every patch carries a `Gitum-Origin` trailer naming the dev commit it was
//! first captured from, which stays stable across merges and clones.

use crate::config::TRACKED_CONFIG_FILE;
use crate::errors::{GitumError, Result};
use crate::git::repository::{CommitInfo, GitRepository};
use git2::Oid;

pub const ORIGIN_TRAILER: &str = "Gitum-Origin";
pub const SERIES_FILE: &str = "series";

const MAX_SLUG_LEN: usize = 52;

/// Origin recorded in a commit message, if any
pub fn origin_of(message: &str) -> Option<String> {
    let prefix = format!("{ORIGIN_TRAILER}:");
    message
        .lines()
        .rev()
        .find_map(|line| line.strip_prefix(&prefix))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `message` with an origin trailer, unless it already has one
pub fn with_origin(message: &str, origin: &str) -> String {
    if origin_of(message).is_some() {
        return message.to_string();
    }
    format!("{}\n\n{ORIGIN_TRAILER}: {origin}\n", message.trim_end())
}

/// File-name friendly form of a commit summary
pub fn slugify(summary: &str) -> String {
    let mut slug = String::new();
    for c in summary.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "patch".to_string()
    } else {
        slug.to_string()
    }
}

/// One patch of the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchEntry {
    pub file_name: String,
    pub origin: String,
    pub content: String,
}

impl PatchEntry {
    fn render(index: usize, total: usize, info: &CommitInfo, diff: &str) -> Result<Self> {
        let origin = origin_of(&info.message).ok_or_else(|| {
            GitumError::config(format!(
                "Commit {} on the rebased branch has no {ORIGIN_TRAILER} trailer",
                info.id
            ))
        })?;

        let body = info
            .message
            .split_once('\n')
            .map(|(_, rest)| rest.trim())
            .unwrap_or("");

        let mut content = String::new();
        content.push_str(&format!("From {} Mon Sep 17 00:00:00 2001\n", info.id));
        content.push_str(&format!(
            "From: {} <{}>\n",
            info.author_name, info.author_email
        ));
        content.push_str(&format!(
            "Subject: [PATCH {}/{}] {}\n\n",
            index + 1,
            total,
            info.summary
        ));
        if !body.is_empty() {
            content.push_str(body);
            content.push('\n');
        }
        content.push_str("---\n");
        content.push_str(diff);

        Ok(Self {
            file_name: format!("{:04}-{}.patch", index + 1, slugify(&info.summary)),
            origin,
            content,
        })
    }

    fn parse(file_name: &str, content: String) -> Result<Self> {
        let header: String = content
            .lines()
            .take_while(|line| *line != "---")
            .collect::<Vec<_>>()
            .join("\n");
        let origin = origin_of(&header).ok_or_else(|| {
            GitumError::config(format!("Patch '{file_name}' has no {ORIGIN_TRAILER} trailer"))
        })?;

        Ok(Self {
            file_name: file_name.to_string(),
            origin,
            content,
        })
    }
}

/// Ordered patch queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSeries {
    pub entries: Vec<PatchEntry>,
}

impl PatchSeries {
    /// Render the queue from the commits on the rebased branch, oldest first
    pub fn from_commits(repo: &GitRepository, commits: &[Oid]) -> Result<Self> {
        let total = commits.len();
        let mut entries = Vec::with_capacity(total);
        for (index, oid) in commits.iter().enumerate() {
            let info = repo.commit_info(*oid)?;
            let diff = repo.patch_text(*oid)?;
            entries.push(PatchEntry::render(index, total, &info, &diff)?);
        }
        Ok(Self { entries })
    }

    /// Read the queue stored in a patches branch commit
    pub fn load(repo: &GitRepository, commit: Oid) -> Result<Self> {
        let Some(series) = repo.read_file_at(commit, SERIES_FILE)? else {
            return Ok(Self::default());
        };
        let series = String::from_utf8_lossy(&series).into_owned();

        let mut entries = Vec::new();
        for file_name in series
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
        {
            let content = repo.read_file_at(commit, file_name)?.ok_or_else(|| {
                GitumError::config(format!("Series lists '{file_name}' but the file is missing"))
            })?;
            entries.push(PatchEntry::parse(
                file_name,
                String::from_utf8_lossy(&content).into_owned(),
            )?);
        }
        Ok(Self { entries })
    }

    pub fn origins(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.origin.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flat tree content for a patches branch revision
    pub fn tree_files(&self, mapping_json: &str) -> Vec<(String, Vec<u8>)> {
        let mut series = String::new();
        for entry in &self.entries {
            series.push_str(&entry.file_name);
            series.push('\n');
        }

        let mut files = vec![
            (TRACKED_CONFIG_FILE.to_string(), mapping_json.as_bytes().to_vec()),
            (SERIES_FILE.to_string(), series.into_bytes()),
        ];
        files.extend(
            self.entries
                .iter()
                .map(|entry| (entry.file_name.clone(), entry.content.as_bytes().to_vec())),
        );
        files
    }
}
