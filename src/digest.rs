//! One digest run: poll every configured repo and render the report

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::ai::{OllamaClient, Summarizer};
use crate::collector::Collector;
use crate::config::Settings;
use crate::git::GitRemote;
use crate::model::RepoSummary;
use crate::report::{render_report, RenderedReport};
use crate::state::StateStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DigestOptions {
    /// Only report what is new since the previous run, and record this run
    pub changes_only: bool,
    /// Condense the report with the configured Ollama model
    pub ai_summary: bool,
}

/// Poll every repo in `settings`. Blocks on network and disk.
pub fn collect_summaries(settings: &Settings, changes_only: bool) -> Vec<RepoSummary> {
    let remote = GitRemote::new(&settings.cache_dir, settings.clone_depth);
    let collector = Collector::new(&remote);

    if !changes_only {
        return collector.collect(&settings.repos, None);
    }

    let store = StateStore::new(&settings.cache_dir);
    let mut state = store.load();
    let summaries = collector.collect(&settings.repos, Some(&mut state));
    if let Err(e) = store.save(&state) {
        tracing::warn!("Could not save state to {}: {:#}", store.path().display(), e);
    }
    summaries
}

/// Collect and render a report
pub async fn build_report(
    settings: Settings,
    options: DigestOptions,
    generated_at: DateTime<Utc>,
) -> Result<RenderedReport> {
    let (settings, summaries) = tokio::task::spawn_blocking(move || {
        let summaries = collect_summaries(&settings, options.changes_only);
        (settings, summaries)
    })
    .await
    .context("Repository polling stopped unexpectedly")?;

    let ollama = options.ai_summary.then(|| {
        OllamaClient::new(
            &settings.ollama_url,
            &settings.ollama_model,
            Duration::from_secs(settings.ollama_timeout),
        )
    });
    let summarizer = ollama.as_ref().map(|client| client as &dyn Summarizer);

    Ok(render_report(&summaries, &settings.title, generated_at, summarizer).await)
}
