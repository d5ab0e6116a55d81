//! Local clones of remote repositories

use anyhow::{Context, Result};
use git2::build::RepoBuilder;
use git2::{AutotagOption, FetchOptions, Repository};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use super::{commits, LocalRepo, RepoAccess};
use crate::model::{cache_dir_name, CommitRecord, TagRecord, DEFAULT_BRANCH};

/// History depth for new clones
pub const DEFAULT_CLONE_DEPTH: u32 = 100;

/// libgit2-backed access, keeping one clone per remote under `cache_dir`
pub struct GitRemote {
    cache_dir: PathBuf,
    /// 0 means full history
    clone_depth: u32,
}

impl GitRemote {
    pub fn new(cache_dir: impl Into<PathBuf>, clone_depth: u32) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            clone_depth,
        }
    }

    /// Where the clone of `url` lives. Remotes sharing an `owner/repo` name
    /// get a suffixed directory when the plain one belongs to another remote.
    pub fn clone_path(&self, url: &str) -> PathBuf {
        let name = cache_dir_name(url);
        let primary = self.cache_dir.join(&name);

        match origin_url(&primary) {
            Some(existing) if existing != url => {
                self.cache_dir.join(format!("{}-{}", name, url_digest(url)))
            }
            _ => primary,
        }
    }

    fn fetch_options(&self, url: &str) -> FetchOptions<'static> {
        let mut options = FetchOptions::new();
        options.download_tags(AutotagOption::All);
        // libgit2's local transport rejects shallow fetches.
        if self.clone_depth > 0 && !is_local_url(url) {
            options.depth(self.clone_depth as i32);
        }
        options
    }

    fn open(local: &LocalRepo) -> Result<Repository> {
        Repository::open(&local.path)
            .with_context(|| format!("Failed to open local copy at {}", local.path.display()))
    }

    fn clone_into(&self, url: &str, branch: &str, path: &Path) -> Result<()> {
        if path.exists() {
            // Leftover from an interrupted clone.
            fs::remove_dir_all(path)
                .with_context(|| format!("Failed to clear {}", path.display()))?;
        }
        fs::create_dir_all(&self.cache_dir)
            .with_context(|| format!("Failed to create {}", self.cache_dir.display()))?;

        let mut builder = RepoBuilder::new();
        builder.fetch_options(self.fetch_options(url));
        if branch != DEFAULT_BRANCH {
            builder.branch(branch);
        }

        builder
            .clone(url, path)
            .with_context(|| format!("Failed to clone {}", url))?;
        Ok(())
    }
}

impl RepoAccess for GitRemote {
    fn ensure_local_copy(&self, url: &str, branch: &str) -> Result<LocalRepo> {
        let path = self.clone_path(url);

        if origin_url(&path).as_deref() != Some(url) {
            tracing::debug!("Cloning {} into {}", url, path.display());
            self.clone_into(url, branch, &path)?;
        }

        Ok(LocalRepo {
            url: url.to_string(),
            path,
        })
    }

    fn fetch_updates(&self, local: &LocalRepo) -> Result<()> {
        let repo = Self::open(local)?;
        let mut remote = repo
            .find_remote("origin")
            .with_context(|| format!("No origin remote in {}", local.path.display()))?;

        let mut options = self.fetch_options(&local.url);
        remote
            .fetch(&[] as &[&str], Some(&mut options), None)
            .with_context(|| format!("Failed to fetch {}", local.url))?;
        Ok(())
    }

    fn list_commits(
        &self,
        local: &LocalRepo,
        reference: &str,
        max_count: usize,
    ) -> Result<Vec<CommitRecord>> {
        let repo = Self::open(local)?;
        commits::list_commits(&repo, reference, max_count)
    }

    fn list_tags(&self, local: &LocalRepo) -> Result<Vec<TagRecord>> {
        let repo = Self::open(local)?;
        commits::list_tags(&repo)
    }
}

/// URL of the `origin` remote of the repository at `path`, if there is one
fn origin_url(path: &Path) -> Option<String> {
    let repo = Repository::open(path).ok()?;
    let remote = repo.find_remote("origin").ok()?;
    remote.url().map(str::to_string)
}

fn url_digest(url: &str) -> String {
    let hash = Sha256::digest(url.as_bytes());
    hex::encode(&hash[..4])
}

/// Local paths and `file://` URLs, as opposed to network remotes
pub fn is_local_url(url: &str) -> bool {
    if url.starts_with("file://") {
        return true;
    }
    if url.contains("://") {
        return false;
    }

    let bytes = url.as_bytes();
    let drive_letter = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    if drive_letter {
        return true;
    }

    // `host:path` is the scp-like ssh form.
    match (url.find(':'), url.find('/')) {
        (Some(colon), Some(slash)) => slash < colon,
        (Some(_), None) => false,
        _ => true,
    }
}
