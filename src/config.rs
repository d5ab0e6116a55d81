//! Configuration: repositories plus layered defaults
//!
//! Settings are resolved as built-in defaults, then the config file, then
//! environment variables, then command-line flags. Each layer only overrides
//! the values it actually sets. Variables from a `.env` file count as
//! environment variables but never shadow ones already set.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ai::{DEFAULT_MODEL, DEFAULT_OLLAMA_URL, DEFAULT_TIMEOUT_SECS};
use crate::git::DEFAULT_CLONE_DEPTH;
use crate::model::{RepoTarget, DEFAULT_BRANCH, DEFAULT_MAX_COMMITS};

pub const APP_NAME: &str = "git-digest";
pub const CONFIG_FILE_NAMES: [&str; 2] = ["repos.yaml", "repos.yml"];
pub const DEFAULT_TITLE: &str = "Git updates summary";
pub const DOTENV_FILE_NAME: &str = ".env";

pub const ENV_CACHE_DIR: &str = "GIT_DIGEST_CACHE_DIR";
pub const ENV_DEFAULT_TITLE: &str = "GIT_DIGEST_DEFAULT_TITLE";
pub const ENV_OLLAMA_MODEL: &str = "OLLAMA_MODEL";
pub const ENV_OLLAMA_BASE_URL: &str = "OLLAMA_BASE_URL";
pub const ENV_OLLAMA_TIMEOUT: &str = "OLLAMA_TIMEOUT";

/// The YAML config file
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub repos: Vec<RepoEntry>,
    pub cache_dir: Option<String>,
    /// Default commit count for repos that don't set one
    pub max_commits: Option<usize>,
    pub default_title: Option<String>,
    pub ollama_model: Option<String>,
    #[serde(alias = "ollama_base_url")]
    pub ollama_url: Option<String>,
    pub ollama_timeout: Option<u64>,
    pub clone_depth: Option<u32>,
}

/// A repo is either a bare URL or a map of options
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RepoEntry {
    Url(String),
    Detailed(RepoSpec),
}

#[derive(Debug, Deserialize)]
pub struct RepoSpec {
    #[serde(alias = "repo")]
    pub url: Option<String>,
    pub branch: Option<String>,
    pub max_commits: Option<usize>,
    pub include_tags: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content).with_context(|| format!("Invalid config: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Repository targets with file-level defaults applied
    pub fn targets(&self) -> Result<Vec<RepoTarget>> {
        let default_max = self.max_commits.unwrap_or(DEFAULT_MAX_COMMITS);

        self.repos
            .iter()
            .map(|entry| match entry {
                RepoEntry::Url(url) => {
                    let mut target = RepoTarget::new(url.as_str());
                    target.max_commits = default_max;
                    validate_url(target)
                }
                RepoEntry::Detailed(spec) => {
                    let url = spec
                        .url
                        .as_deref()
                        .context("Repository config must have 'url' or 'repo'")?;
                    let mut target = RepoTarget::new(url);
                    if let Some(ref branch) = spec.branch {
                        let branch = branch.trim();
                        target.branch = if branch.is_empty() {
                            DEFAULT_BRANCH.to_string()
                        } else {
                            branch.to_string()
                        };
                    }
                    target.max_commits = spec.max_commits.unwrap_or(default_max);
                    target.include_tags = spec.include_tags.unwrap_or(true);
                    validate_url(target)
                }
            })
            .collect()
    }

    /// The overridable settings this file sets
    pub fn layer(&self) -> SettingsLayer {
        SettingsLayer {
            cache_dir: self.cache_dir.as_deref().and_then(non_blank).map(expand_path),
            title: self.default_title.as_deref().and_then(non_blank),
            ollama_model: self.ollama_model.as_deref().and_then(non_blank),
            ollama_url: self.ollama_url.as_deref().and_then(non_blank),
            ollama_timeout: self.ollama_timeout,
            clone_depth: self.clone_depth,
        }
    }
}

fn validate_url(target: RepoTarget) -> Result<RepoTarget> {
    if target.url.is_empty() {
        anyhow::bail!("Repository URL must not be empty");
    }
    Ok(target)
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Expand `~` in a configured path
pub fn expand_path(raw: String) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}

/// Load repo URLs from plain text files, one per line. Blank lines and
/// `#` comments are ignored; missing files are skipped.
pub fn load_repo_lists(paths: &[PathBuf]) -> Result<Vec<RepoTarget>> {
    let mut targets = Vec::new();

    for path in paths {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Repo list not found: {}", path.display());
                continue;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        targets.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(RepoTarget::new),
        );
    }

    Ok(targets)
}

/// Places searched for a config file when none is given
pub fn default_config_paths(cwd: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = CONFIG_FILE_NAMES.iter().map(|name| cwd.join(name)).collect();
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join(APP_NAME).join(CONFIG_FILE_NAMES[0]));
    }
    paths
}

pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join(APP_NAME)
}

/// Optional overrides from one configuration source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsLayer {
    pub cache_dir: Option<PathBuf>,
    pub title: Option<String>,
    pub ollama_model: Option<String>,
    pub ollama_url: Option<String>,
    pub ollama_timeout: Option<u64>,
    pub clone_depth: Option<u32>,
}

impl SettingsLayer {
    /// Layer from environment variables, read through `lookup`
    pub fn from_env<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).as_deref().and_then(non_blank);

        let ollama_timeout = match get(ENV_OLLAMA_TIMEOUT) {
            Some(raw) => Some(
                raw.parse::<u64>()
                    .with_context(|| format!("{} must be a number of seconds, got '{}'", ENV_OLLAMA_TIMEOUT, raw))?,
            ),
            None => None,
        };

        Ok(Self {
            cache_dir: get(ENV_CACHE_DIR).map(expand_path),
            title: get(ENV_DEFAULT_TITLE),
            ollama_model: get(ENV_OLLAMA_MODEL),
            ollama_url: get(ENV_OLLAMA_BASE_URL),
            ollama_timeout,
            clone_depth: None,
        })
    }

    /// Layer from the process environment, falling back to `dotenv`
    pub fn from_process_env(dotenv: &HashMap<String, String>) -> Result<Self> {
        Self::from_env(|name| std::env::var(name).ok().or_else(|| dotenv.get(name).cloned()))
    }
}

/// `.env` locations, in search order
pub fn default_dotenv_paths(cwd: &Path) -> Vec<PathBuf> {
    let mut paths = vec![cwd.join(DOTENV_FILE_NAME)];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join(APP_NAME).join(DOTENV_FILE_NAME));
    }
    paths
}

/// Variables from the first existing `.env` file in `paths`; later files
/// are not read.
pub fn read_dotenv(paths: &[PathBuf]) -> Result<HashMap<String, String>> {
    let Some(path) = paths.iter().find(|p| p.is_file()) else {
        return Ok(HashMap::new());
    };
    tracing::debug!("Reading environment from {}", path.display());

    let mut vars = HashMap::new();
    let entries = dotenvy::from_path_iter(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    for entry in entries {
        let (key, value) = entry.with_context(|| format!("Invalid env file: {}", path.display()))?;
        vars.entry(key).or_insert(value);
    }

    Ok(vars)
}

/// Fully resolved settings for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub repos: Vec<RepoTarget>,
    pub cache_dir: PathBuf,
    pub title: String,
    pub ollama_model: String,
    pub ollama_url: String,
    pub ollama_timeout: u64,
    pub clone_depth: u32,
}

impl Settings {
    pub fn new(repos: Vec<RepoTarget>) -> Self {
        Self {
            repos,
            cache_dir: default_cache_dir(),
            title: DEFAULT_TITLE.to_string(),
            ollama_model: DEFAULT_MODEL.to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            ollama_timeout: DEFAULT_TIMEOUT_SECS,
            clone_depth: DEFAULT_CLONE_DEPTH,
        }
    }

    /// Override every value `layer` sets
    pub fn apply(mut self, layer: &SettingsLayer) -> Self {
        if let Some(ref cache_dir) = layer.cache_dir {
            self.cache_dir = cache_dir.clone();
        }
        if let Some(ref title) = layer.title {
            self.title = title.clone();
        }
        if let Some(ref model) = layer.ollama_model {
            self.ollama_model = model.clone();
        }
        if let Some(ref url) = layer.ollama_url {
            self.ollama_url = url.clone();
        }
        if let Some(timeout) = layer.ollama_timeout {
            self.ollama_timeout = timeout;
        }
        if let Some(depth) = layer.clone_depth {
            self.clone_depth = depth;
        }
        self
    }

    /// Apply layers in increasing precedence
    pub fn resolve(repos: Vec<RepoTarget>, layers: &[&SettingsLayer]) -> Self {
        layers
            .iter()
            .fold(Self::new(repos), |settings, layer| settings.apply(layer))
    }
}

/// Repositories and file-level settings, from wherever they were found
#[derive(Debug)]
pub struct LoadedConfig {
    pub repos: Vec<RepoTarget>,
    pub file_layer: SettingsLayer,
    /// Where the repositories came from, for messages
    pub source: String,
}

/// Find the repository list: an explicit config file, then repo-list files,
/// then the first existing default config path.
pub fn load_config(
    config: Option<&Path>,
    repo_lists: &[PathBuf],
    candidates: &[PathBuf],
) -> Result<LoadedConfig> {
    let loaded = if let Some(path) = config {
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        from_file(path)?
    } else if !repo_lists.is_empty() {
        let repos = load_repo_lists(repo_lists)?;
        if repos.is_empty() {
            anyhow::bail!("No repos found in given files.");
        }
        LoadedConfig {
            repos,
            file_layer: SettingsLayer::default(),
            source: repo_lists
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        }
    } else {
        let path = candidates.iter().find(|p| p.exists()).with_context(|| {
            format!(
                "No config found. Use --config FILE or --repos FILE, or create one of: {}",
                candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })?;
        from_file(path)?
    };

    if loaded.repos.is_empty() {
        anyhow::bail!("No repositories configured in {}", loaded.source);
    }

    Ok(loaded)
}

/// Where one invocation reads its settings from
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    pub config: Option<PathBuf>,
    pub repo_lists: Vec<PathBuf>,
    /// Base for the default config and `.env` search
    pub cwd: PathBuf,
}

impl ConfigSource {
    /// Load repositories and resolve settings; `overrides` apply after the
    /// environment, in order.
    pub fn load(&self, overrides: &[&SettingsLayer]) -> Result<Settings> {
        let candidates = default_config_paths(&self.cwd);
        let loaded = load_config(self.config.as_deref(), &self.repo_lists, &candidates)?;
        tracing::debug!("Loaded {} repos from {}", loaded.repos.len(), loaded.source);

        let dotenv = read_dotenv(&default_dotenv_paths(&self.cwd))?;
        let env_layer = SettingsLayer::from_process_env(&dotenv)?;

        let mut layers = vec![&loaded.file_layer, &env_layer];
        layers.extend_from_slice(overrides);
        Ok(Settings::resolve(loaded.repos, &layers))
    }
}

fn from_file(path: &Path) -> Result<LoadedConfig> {
    let file = FileConfig::load(path)?;
    let repos = file
        .targets()
        .with_context(|| format!("Invalid config: {}", path.display()))?;

    Ok(LoadedConfig {
        repos,
        file_layer: file.layer(),
        source: path.display().to_string(),
    })
}
