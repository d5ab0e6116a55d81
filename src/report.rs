//! Plain-text digest report
//!
//! The listing is deterministic for a given set of summaries and generation
//! time. The AI path sends the same per-repo content to a summarizer and
//! falls back to the listing on any failure.

use chrono::{DateTime, Utc};

use crate::ai::{Summarizer, SYSTEM_PROMPT};
use crate::model::{truncate_chars, CommitRecord, RepoSummary, TagRecord};

pub const SUBJECT_MAX_CHARS: usize = 80;
pub const TAG_MESSAGE_MAX_CHARS: usize = 60;
/// Tags listed per repository
pub const TAGS_SHOWN: usize = 5;

const TITLE_UNDERLINE_MAX: usize = 60;
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Which path produced the report text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedReport {
    /// Digest written by the summarization service
    Summarized(String),
    /// Deterministic commit and tag listing
    Listing(String),
}

impl RenderedReport {
    pub fn text(&self) -> &str {
        match self {
            RenderedReport::Summarized(text) | RenderedReport::Listing(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            RenderedReport::Summarized(text) | RenderedReport::Listing(text) => text,
        }
    }

    pub fn is_summarized(&self) -> bool {
        matches!(self, RenderedReport::Summarized(_))
    }
}

fn push_header(lines: &mut Vec<String>, title: &str, generated_at: DateTime<Utc>) {
    if !title.is_empty() {
        lines.push(title.to_string());
        lines.push("=".repeat(title.chars().count().min(TITLE_UNDERLINE_MAX)));
        lines.push(String::new());
    }
    // All report times are UTC, like the commit and tag lines.
    lines.push(format!("Generated: {} UTC", generated_at.format(DATE_FORMAT)));
    lines.push(String::new());
}

fn commit_line(commit: &CommitRecord) -> String {
    let ref_part = if commit.ref_labels.is_empty() {
        String::new()
    } else {
        format!(" [{}]", commit.ref_labels)
    };
    format!(
        "    - {}  {}{}  {}: {}",
        commit.timestamp.format(DATE_FORMAT),
        commit.short_id,
        ref_part,
        commit.author,
        truncate_chars(&commit.subject, SUBJECT_MAX_CHARS)
    )
}

fn tag_line(tag: &TagRecord) -> String {
    let date = tag
        .timestamp
        .map(|ts| ts.format(DATE_FORMAT).to_string())
        .unwrap_or_default();
    let message = truncate_chars(&tag.message, TAG_MESSAGE_MAX_CHARS);
    let msg_part = if message.is_empty() {
        String::new()
    } else {
        format!("  — {}", message)
    };
    format!("    - {}  {} ({}){}", date, tag.name, tag.short_id, msg_part)
}

/// Commits, tags or the error for one repo
fn push_activity(lines: &mut Vec<String>, summary: &RepoSummary) {
    lines.push(format!("  Branch: {}", summary.target.branch));

    if let Some(ref error) = summary.error {
        lines.push(format!("  Error: {}", error));
        return;
    }

    if !summary.commits.is_empty() {
        let header = if summary.is_incremental {
            "New commits since last run:"
        } else {
            "Recent commits:"
        };
        lines.push(format!("  {}", header));
        lines.extend(summary.commits.iter().map(commit_line));
    } else if summary.is_incremental {
        lines.push("  No new commits since last run.".to_string());
    }

    if summary.tags_incremental {
        if summary.tags.is_empty() {
            lines.push("  No new tags since last run.".to_string());
        } else {
            lines.push("  New tags/releases since last run:".to_string());
            lines.extend(summary.tags.iter().take(TAGS_SHOWN).map(tag_line));
        }
    } else if !summary.tags.is_empty() {
        lines.push("  Recent tags/releases:".to_string());
        lines.extend(summary.tags.iter().take(TAGS_SHOWN).map(tag_line));
    }
}

/// Deterministic report for cron output or email
pub fn format_report(summaries: &[RepoSummary], title: &str, generated_at: DateTime<Utc>) -> String {
    let mut lines = Vec::new();
    push_header(&mut lines, title, generated_at);

    for summary in summaries {
        lines.push(format!("## {}", summary.display_name()));
        lines.push(format!("  URL: {}", summary.target.url));
        push_activity(&mut lines, summary);
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Per-repo content handed to the summarizer, without title or date
pub fn raw_context(summaries: &[RepoSummary]) -> String {
    let mut lines = Vec::new();

    for summary in summaries {
        lines.push(format!("## {} ({})", summary.display_name(), summary.target.url));
        push_activity(&mut lines, summary);
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Report with an AI digest in place of the per-repo listing
pub fn format_summarized(digest: &str, title: &str, generated_at: DateTime<Utc>) -> String {
    let mut lines = Vec::new();
    push_header(&mut lines, title, generated_at);
    lines.push(digest.trim().to_string());
    lines.push(String::new());
    lines.join("\n")
}

/// Render with the summarizer when one is given, otherwise (or when it
/// fails) with the deterministic listing.
pub async fn render_report(
    summaries: &[RepoSummary],
    title: &str,
    generated_at: DateTime<Utc>,
    summarizer: Option<&dyn Summarizer>,
) -> RenderedReport {
    let listing = || RenderedReport::Listing(format_report(summaries, title, generated_at));

    let Some(summarizer) = summarizer else {
        return listing();
    };

    let context = raw_context(summaries);
    if context.trim().is_empty() {
        return listing();
    }

    let prompt = format!("Summarize these git updates into a short digest.\n\n{}", context);
    match summarizer.summarize(SYSTEM_PROMPT, &prompt).await {
        Ok(digest) if !digest.trim().is_empty() => {
            RenderedReport::Summarized(format_summarized(&digest, title, generated_at))
        }
        Ok(_) => {
            tracing::warn!("Summarization returned no text. Using plain report.");
            listing()
        }
        Err(e) => {
            match e.hint() {
                Some(hint) => tracing::warn!("Summarization failed ({}). {} Using plain report.", e, hint),
                None => tracing::warn!("Summarization failed ({}). Using plain report.", e),
            }
            listing()
        }
    }
}
