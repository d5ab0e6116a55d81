//! Commit and tag listing

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use git2::{Oid, Repository, Sort};
use std::collections::HashMap;

use crate::model::{first_line, short_id, CommitRecord, TagRecord, DEFAULT_BRANCH};

fn commit_time(commit: &git2::Commit<'_>) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(commit.time().seconds(), 0).single()
}

/// Resolve a branch name (or `HEAD`) to the commit to report on.
/// Remote-tracking refs win over local branches so fetched work is seen.
pub fn resolve_target<'r>(repo: &'r Repository, reference: &str) -> Result<git2::Commit<'r>> {
    let mut candidates = Vec::new();

    if reference == DEFAULT_BRANCH {
        candidates.push("refs/remotes/origin/HEAD".to_string());
        if let Ok(head) = repo.head() {
            if let Some(name) = head.shorthand() {
                candidates.push(format!("refs/remotes/origin/{}", name));
            }
        }
        candidates.push(DEFAULT_BRANCH.to_string());
    } else {
        candidates.push(format!("refs/remotes/origin/{}", reference));
        candidates.push(format!("refs/heads/{}", reference));
        candidates.push(reference.to_string());
    }

    for spec in &candidates {
        if let Ok(commit) = repo.revparse_single(spec).and_then(|obj| obj.peel_to_commit()) {
            return Ok(commit);
        }
    }

    anyhow::bail!("Could not resolve ref '{}'", reference)
}

/// Short names of the refs pointing at each commit
fn ref_labels(repo: &Repository) -> Result<HashMap<Oid, Vec<String>>> {
    let mut labels: HashMap<Oid, Vec<String>> = HashMap::new();

    for reference in repo.references()? {
        let reference = reference?;
        let Some(name) = reference.shorthand() else {
            continue;
        };
        let name = name.to_string();
        if let Ok(commit) = reference.peel_to_commit() {
            labels.entry(commit.id()).or_default().push(name);
        }
    }

    for names in labels.values_mut() {
        names.sort();
        names.dedup();
    }

    Ok(labels)
}

/// Get up to `limit` commits reachable from `reference`, newest first
pub fn list_commits(repo: &Repository, reference: &str, limit: usize) -> Result<Vec<CommitRecord>> {
    let tip = resolve_target(repo, reference)?;
    let labels = ref_labels(repo)?;

    let mut revwalk = repo.revwalk()?;
    // Time order is produced lazily; topological order would read all history first.
    revwalk.set_sorting(Sort::TIME)?;
    revwalk.push(tip.id())?;

    let mut commits = Vec::new();
    for oid in revwalk.take(limit) {
        let oid = oid?;
        let commit = repo
            .find_commit(oid)
            .with_context(|| format!("Failed to read commit {}", oid))?;

        let id = oid.to_string();
        commits.push(CommitRecord {
            short_id: short_id(&id),
            author: commit.author().name().unwrap_or("Unknown").to_string(),
            timestamp: commit_time(&commit).unwrap_or_default(),
            subject: first_line(commit.message().unwrap_or(""), usize::MAX),
            ref_labels: labels.get(&oid).map(|names| names.join(" ")).unwrap_or_default(),
            id,
        });
    }

    Ok(commits)
}

/// Get all tags with the commit each one points at
pub fn list_tags(repo: &Repository) -> Result<Vec<TagRecord>> {
    let names = repo.tag_names(None)?;
    let mut tags = Vec::new();

    for name in names.iter().flatten() {
        let reference = match repo.find_reference(&format!("refs/tags/{}", name)) {
            Ok(reference) => reference,
            Err(e) => {
                tracing::debug!("Skipping tag {}: {}", name, e);
                continue;
            }
        };

        let commit = reference.peel_to_commit().ok();
        let message = reference
            .peel_to_tag()
            .ok()
            .and_then(|tag| tag.message().map(|m| first_line(m, usize::MAX)))
            .unwrap_or_default();

        tags.push(TagRecord {
            name: name.to_string(),
            short_id: commit
                .as_ref()
                .map(|c| short_id(&c.id().to_string()))
                .unwrap_or_default(),
            timestamp: commit.as_ref().and_then(commit_time),
            message,
        });
    }

    Ok(tags)
}
