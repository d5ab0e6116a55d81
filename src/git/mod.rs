//! Git access
//!
//! Provides:
//! - The `RepoAccess` boundary used by the collector
//! - Local clone management and fetching (libgit2)
//! - Commit and tag listing

pub mod commits;
pub mod remote;

pub use commits::{list_commits, list_tags, resolve_target};
pub use remote::{GitRemote, DEFAULT_CLONE_DEPTH};

use anyhow::Result;
use std::path::PathBuf;

use crate::model::{CommitRecord, TagRecord};

/// A local copy of a remote repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRepo {
    pub url: String,
    pub path: PathBuf,
}

/// Operations the collector needs from a git backend
pub trait RepoAccess {
    /// Make sure a local copy of `url` exists and return a handle to it
    fn ensure_local_copy(&self, url: &str, branch: &str) -> Result<LocalRepo>;

    /// Bring the local copy up to date with the remote
    fn fetch_updates(&self, local: &LocalRepo) -> Result<()>;

    /// Up to `max_count` commits reachable from `reference`, newest first
    fn list_commits(
        &self,
        local: &LocalRepo,
        reference: &str,
        max_count: usize,
    ) -> Result<Vec<CommitRecord>>;

    /// Every tag, resolved to its commit
    fn list_tags(&self, local: &LocalRepo) -> Result<Vec<TagRecord>>;
}
