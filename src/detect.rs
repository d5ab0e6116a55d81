//! Change detection against previously seen state
//!
//! Pure functions: given what the adapter listed and what was stored last
//! time, decide which commits and tags are new and what to store next.

use chrono::{DateTime, Timelike, Utc};
use std::collections::BTreeSet;

use crate::model::{CommitRecord, TagRecord};

/// How far past `max_commits` to look for the previously seen commit.
/// When it is not found within this bound the result degrades to the most
/// recent `max_commits` commits.
pub const RESCAN_FACTOR: usize = 2;

/// Commits new since the last run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitDiff {
    pub commits: Vec<CommitRecord>,
    /// Id to store as last seen
    pub newest_id: Option<String>,
}

/// Tags new since the last run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDiff {
    pub tags: Vec<TagRecord>,
    /// Cutoff to store for the next run; never moves backwards
    pub newest_timestamp: Option<DateTime<Utc>>,
    /// Names of the newest `max_tags` usable tags
    pub seen_names: BTreeSet<String>,
}

/// Number of commits to request from the adapter
pub fn commit_lookup_limit(max_commits: usize, previous: Option<&str>) -> usize {
    let limit = if previous.is_some() {
        max_commits.saturating_mul(RESCAN_FACTOR)
    } else {
        max_commits
    };
    // The head is needed even when no commits are reported.
    limit.max(1)
}

fn is_same_commit(id: &str, previous: &str) -> bool {
    id == previous || id.starts_with(previous)
}

/// Select commits newer than `previous` from a newest-first listing
pub fn diff_commits(
    listing: Vec<CommitRecord>,
    previous: Option<&str>,
    max_commits: usize,
) -> CommitDiff {
    let previous = previous.map(str::trim).filter(|p| !p.is_empty());
    let head = listing.first().map(|c| c.id.clone());

    let Some(previous) = previous else {
        let commits = listing.into_iter().take(max_commits).collect();
        return CommitDiff {
            commits,
            newest_id: head,
        };
    };

    let mut commits = Vec::new();
    for commit in listing
        .into_iter()
        .take(commit_lookup_limit(max_commits, Some(previous)))
    {
        if is_same_commit(&commit.id, previous) || commits.len() >= max_commits {
            break;
        }
        commits.push(commit);
    }

    CommitDiff {
        commits,
        newest_id: head.or_else(|| Some(previous.to_string())),
    }
}

fn to_seconds(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_nanosecond(0).unwrap_or(ts)
}

/// Select tags whose commit is newer than `cutoff`
pub fn diff_tags(
    listing: Vec<TagRecord>,
    cutoff: Option<DateTime<Utc>>,
    max_tags: usize,
) -> TagDiff {
    let cutoff = cutoff.map(to_seconds);

    let mut usable: Vec<(DateTime<Utc>, TagRecord)> = listing
        .into_iter()
        .filter_map(|tag| tag.timestamp.map(|ts| (to_seconds(ts), tag)))
        .collect();
    // Stable: ties keep listing order.
    usable.sort_by(|a, b| b.0.cmp(&a.0));

    let newest = usable.first().map(|(ts, _)| *ts);
    let newest_timestamp = match (newest, cutoff) {
        (Some(newest), Some(cutoff)) => Some(newest.max(cutoff)),
        (newest, cutoff) => newest.or(cutoff),
    };

    let seen_names = usable
        .iter()
        .take(max_tags)
        .map(|(_, tag)| tag.name.clone())
        .collect();

    let tags = match cutoff {
        None => usable.into_iter().take(max_tags).map(|(_, tag)| tag).collect(),
        Some(cutoff) => usable
            .into_iter()
            .take_while(|(ts, _)| *ts > cutoff)
            .take(max_tags)
            .map(|(_, tag)| tag)
            .collect(),
    };

    TagDiff {
        tags,
        newest_timestamp,
        seen_names,
    }
}
