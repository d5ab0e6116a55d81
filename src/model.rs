//! Records produced by a digest run

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Branch value meaning "whatever the remote's default branch is"
pub const DEFAULT_BRANCH: &str = "HEAD";
pub const DEFAULT_MAX_COMMITS: usize = 10;
/// Number of tags reported per repository
pub const TAG_WINDOW: usize = 10;

/// A repository to poll, as loaded from configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoTarget {
    /// Remote URL; also the key of the persisted state
    pub url: String,
    pub branch: String,
    pub max_commits: usize,
    pub include_tags: bool,
}

impl RepoTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into().trim().to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            max_commits: DEFAULT_MAX_COMMITS,
            include_tags: true,
        }
    }

    pub fn display_name(&self) -> String {
        repo_name_from_url(&self.url)
    }

    pub fn cache_dir_name(&self) -> String {
        cache_dir_name(&self.url)
    }
}

/// Short `owner/repo` name derived from a remote URL
pub fn repo_name_from_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let trimmed = if trimmed.to_ascii_lowercase().ends_with(".git") {
        &trimmed[..trimmed.len() - 4]
    } else {
        trimmed
    };

    let normalized = trimmed.replace('\\', "/");
    let parts: Vec<&str> = normalized.split('/').filter(|p| !p.is_empty()).collect();

    match parts.as_slice() {
        [.., owner, repo] => format!("{}/{}", owner, repo),
        [only] => only.to_string(),
        [] => url.to_string(),
    }
}

/// Directory name for the local clone of a remote
pub fn cache_dir_name(url: &str) -> String {
    repo_name_from_url(url)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// One commit on the polled ref
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Full 40-character commit id
    pub id: String,
    pub short_id: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    /// First line of the commit message
    pub subject: String,
    /// Short names of refs pointing at this commit, space separated
    pub ref_labels: String,
}

/// One tag, resolved to the commit it points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    pub name: String,
    pub short_id: String,
    /// Commit time of the tagged commit; `None` when it could not be resolved
    pub timestamp: Option<DateTime<Utc>>,
    /// First line of the annotation, empty for lightweight tags
    pub message: String,
}

/// Result of polling one repository
#[derive(Debug, Clone, PartialEq)]
pub struct RepoSummary {
    pub target: RepoTarget,
    /// Newest first
    pub commits: Vec<CommitRecord>,
    /// Newest first by commit timestamp
    pub tags: Vec<TagRecord>,
    pub error: Option<String>,
    /// Commits were filtered against a previously seen commit
    pub is_incremental: bool,
    /// Tags were filtered against a previously recorded cutoff
    pub tags_incremental: bool,
    /// Head of the polled ref as of this run
    pub newest_commit_id: Option<String>,
    pub newest_tag_timestamp: Option<DateTime<Utc>>,
    /// Names of the tags in the observed window
    pub seen_tag_names: BTreeSet<String>,
}

impl RepoSummary {
    pub fn new(target: RepoTarget) -> Self {
        Self {
            target,
            commits: Vec::new(),
            tags: Vec::new(),
            error: None,
            is_incremental: false,
            tags_incremental: false,
            newest_commit_id: None,
            newest_tag_timestamp: None,
            seen_tag_names: BTreeSet::new(),
        }
    }

    pub fn failed(target: RepoTarget, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(target)
        }
    }

    pub fn display_name(&self) -> String {
        self.target.display_name()
    }
}

/// First line of a message, trimmed and cut to `max` characters
pub fn first_line(message: &str, max: usize) -> String {
    let line = message.lines().next().unwrap_or("").trim();
    truncate_chars(line, max)
}

pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

pub fn short_id(id: &str) -> String {
    id.chars().take(7).collect()
}
