//! git-digest - incremental digests of git remotes
//!
//! A library for polling remote repositories and reporting what changed:
//! - Local clones kept up to date with libgit2
//! - Per-repo state so each run only reports new commits and tags
//! - Plain-text report, optionally condensed by a local Ollama model
//! - The same report served as MCP tools

pub mod ai;
pub mod collector;
pub mod config;
pub mod detect;
pub mod digest;
pub mod git;
pub mod mcp;
pub mod model;
pub mod report;
pub mod state;

pub use collector::Collector;
pub use config::{ConfigSource, Settings, SettingsLayer};
pub use digest::{build_report, DigestOptions};
pub use git::{GitRemote, RepoAccess};
pub use model::{CommitRecord, RepoSummary, RepoTarget, TagRecord};
pub use report::{render_report, RenderedReport};
pub use state::{LastSeenState, StateMap, StateStore};
