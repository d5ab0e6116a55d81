//! Poll configured repositories and fold the results back into state

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::detect::{commit_lookup_limit, diff_commits, diff_tags};
use crate::git::RepoAccess;
use crate::model::{RepoSummary, RepoTarget, TAG_WINDOW};
use crate::state::{get_last_commit, get_last_tag_cutoff, LastSeenState, StateMap, TrackedState};

/// Runs the adapter and change detector for each target, in order
pub struct Collector<'a, A: RepoAccess> {
    access: &'a A,
}

impl<'a, A: RepoAccess> Collector<'a, A> {
    pub fn new(access: &'a A) -> Self {
        Self { access }
    }

    /// Poll every target. With `state`, only activity since the stored
    /// state is reported and the state is updated for each repo that
    /// succeeded.
    pub fn collect(&self, targets: &[RepoTarget], mut state: Option<&mut StateMap>) -> Vec<RepoSummary> {
        let mut summaries = Vec::with_capacity(targets.len());

        for target in targets {
            tracing::debug!("Fetching {} ...", target.url);

            let summary = match state.as_deref_mut() {
                Some(state) => {
                    let previous = get_last_commit(state, &target.url).map(str::to_string);
                    let cutoff = get_last_tag_cutoff(state, &target.url);
                    let summary = self.collect_repo(target, previous.as_deref(), cutoff);
                    record_summary(state, &summary);
                    summary
                }
                None => self.collect_repo(target, None, None),
            };

            if let Some(ref error) = summary.error {
                tracing::warn!("{}: {}", target.url, error);
            } else {
                tracing::debug!(
                    "{}: {} commits, {} tags",
                    target.url,
                    summary.commits.len(),
                    summary.tags.len()
                );
            }

            summaries.push(summary);
        }

        summaries
    }

    /// Poll one target; failures are captured on the summary
    pub fn collect_repo(
        &self,
        target: &RepoTarget,
        previous_commit: Option<&str>,
        tag_cutoff: Option<DateTime<Utc>>,
    ) -> RepoSummary {
        let previous_commit = previous_commit.map(str::trim).filter(|id| !id.is_empty());

        match self.poll(target, previous_commit, tag_cutoff) {
            Ok(summary) => summary,
            Err(e) => RepoSummary::failed(target.clone(), describe_error(&e)),
        }
    }

    fn poll(
        &self,
        target: &RepoTarget,
        previous_commit: Option<&str>,
        tag_cutoff: Option<DateTime<Utc>>,
    ) -> Result<RepoSummary> {
        let local = self.access.ensure_local_copy(&target.url, &target.branch)?;
        self.access.fetch_updates(&local)?;

        let limit = commit_lookup_limit(target.max_commits, previous_commit);
        let listing = self.access.list_commits(&local, &target.branch, limit)?;
        let commit_diff = diff_commits(listing, previous_commit, target.max_commits);

        let mut summary = RepoSummary::new(target.clone());
        summary.is_incremental = previous_commit.is_some();
        summary.commits = commit_diff.commits;
        summary.newest_commit_id = commit_diff.newest_id;

        if target.include_tags {
            let tags = self.access.list_tags(&local)?;
            let tag_diff = diff_tags(tags, tag_cutoff, TAG_WINDOW);
            summary.tags_incremental = tag_cutoff.is_some();
            summary.tags = tag_diff.tags;
            summary.newest_tag_timestamp = tag_diff.newest_timestamp;
            summary.seen_tag_names = tag_diff.seen_names;
        }

        Ok(summary)
    }
}

/// One-line description of an adapter failure
fn describe_error(error: &anyhow::Error) -> String {
    let text = format!("{:#}", error);
    text.lines().next().unwrap_or("").trim().to_string()
}

/// Store what a successful poll observed. Failed polls leave the previous
/// entry untouched.
pub fn record_summary(state: &mut StateMap, summary: &RepoSummary) {
    if summary.error.is_some() {
        return;
    }

    let url = &summary.target.url;
    let (tag_names, newest_tag_date) = if summary.target.include_tags {
        (summary.seen_tag_names.clone(), summary.newest_tag_timestamp)
    } else {
        match state.get(url) {
            Some(previous) => (previous.tag_names(), previous.tag_cutoff()),
            None => Default::default(),
        }
    };

    if summary.newest_commit_id.is_none() && tag_names.is_empty() && newest_tag_date.is_none() {
        return;
    }

    state.insert(
        url.clone(),
        LastSeenState::Tracked(TrackedState {
            commit_sha: summary.newest_commit_id.clone(),
            tag_names,
            newest_tag_date,
        }),
    );
}
