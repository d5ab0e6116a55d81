//! Last-seen commit and tag state per repository
//!
//! Persisted as one JSON object per cache directory, keyed by repository URL.
//! Each value is either a bare commit id (the legacy format) or a record with
//! the commit id, the recently seen tag names and the newest tag date.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const STATE_FILE_NAME: &str = "state.json";

/// Repository URL -> last-seen state
pub type StateMap = BTreeMap<String, LastSeenState>;

/// State recorded for one repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LastSeenState {
    /// Commit id only, written by older versions
    Legacy(String),
    Tracked(TrackedState),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tag_names: BTreeSet<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "utc_seconds"
    )]
    pub newest_tag_date: Option<DateTime<Utc>>,
}

impl LastSeenState {
    pub fn commit_id(&self) -> Option<&str> {
        let id = match self {
            LastSeenState::Legacy(id) => Some(id.as_str()),
            LastSeenState::Tracked(tracked) => tracked.commit_sha.as_deref(),
        };
        id.map(str::trim).filter(|id| !id.is_empty())
    }

    pub fn tag_names(&self) -> BTreeSet<String> {
        match self {
            LastSeenState::Legacy(_) => BTreeSet::new(),
            LastSeenState::Tracked(tracked) => tracked.tag_names.clone(),
        }
    }

    pub fn tag_cutoff(&self) -> Option<DateTime<Utc>> {
        match self {
            LastSeenState::Legacy(_) => None,
            LastSeenState::Tracked(tracked) => tracked.newest_tag_date,
        }
    }
}

pub fn get_last_commit<'a>(state: &'a StateMap, url: &str) -> Option<&'a str> {
    state.get(url).and_then(LastSeenState::commit_id)
}

pub fn get_last_tag_names(state: &StateMap, url: &str) -> BTreeSet<String> {
    state.get(url).map(LastSeenState::tag_names).unwrap_or_default()
}

pub fn get_last_tag_cutoff(state: &StateMap, url: &str) -> Option<DateTime<Utc>> {
    state.get(url).and_then(LastSeenState::tag_cutoff)
}

/// State file inside a cache directory
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            path: cache_dir.join(STATE_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the state file. Missing or unreadable content yields an empty map;
    /// entries matching neither shape are dropped.
    pub fn load(&self) -> StateMap {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Could not read {}: {}", self.path.display(), e);
                }
                return StateMap::new();
            }
        };

        let raw: BTreeMap<String, serde_json::Value> = match serde_json::from_str(&content) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(
                    "Ignoring malformed state file {}: {}",
                    self.path.display(),
                    e
                );
                return StateMap::new();
            }
        };

        raw.into_iter()
            .filter_map(|(url, value)| match serde_json::from_value(value) {
                Ok(entry) => Some((url, entry)),
                Err(e) => {
                    tracing::debug!("Dropping unreadable state for {}: {}", url, e);
                    None
                }
            })
            .collect()
    }

    /// Write the full map, replacing the previous file in one rename.
    pub fn save(&self, state: &StateMap) -> Result<()> {
        let dir = self
            .path
            .parent()
            .context("State file has no parent directory")?;
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create cache directory {}", dir.display()))?;

        let mut data = serde_json::to_string_pretty(state)?;
        data.push('\n');
        write_atomic(&self.path, data.as_bytes())
    }
}

/// Replace `path` with `data` in one rename; on failure `path` is untouched
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path.parent().context("Path has no parent directory")?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(())
}

/// UTC timestamps at seconds precision, stored as `YYYY-MM-DD HH:MM:SS`
mod utc_seconds {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&ts.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    /// Unparseable dates read as "no cutoff"
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
        Ok(raw.as_ref().and_then(serde_json::Value::as_str).and_then(parse))
    }

    fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        NaiveDateTime::parse_from_str(raw, FORMAT)
            .map(|naive| naive.and_utc())
            .ok()
            .or_else(|| {
                DateTime::parse_from_rfc3339(raw)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    const URL_A: &str = "https://github.com/a/b";
    const URL_B: &str = "https://gitlab.com/x/y";

    fn tracked(sha: &str, tags: &[&str], date: Option<DateTime<Utc>>) -> LastSeenState {
        LastSeenState::Tracked(TrackedState {
            commit_sha: Some(sha.to_string()),
            tag_names: tags.iter().map(|t| t.to_string()).collect(),
            newest_tag_date: date,
        })
    }

    #[test]
    fn test_load_missing_file_returns_empty() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path());
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_legacy_state_round_trips() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path());

        let mut state = StateMap::new();
        state.insert(URL_A.to_string(), LastSeenState::Legacy("abc123".to_string()));
        state.insert(URL_B.to_string(), LastSeenState::Legacy("def456".to_string()));

        store.save(&state).unwrap();
        assert!(dir.path().join(STATE_FILE_NAME).exists());
        assert_eq!(store.load(), state);
    }

    #[test]
    fn test_tracked_state_round_trips() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path());
        let date = Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 5).unwrap();

        let mut state = StateMap::new();
        state.insert(URL_A.to_string(), tracked("abc123", &["v1.0", "v0.9"], Some(date)));
        state.insert(URL_B.to_string(), LastSeenState::Legacy("def456".to_string()));

        store.save(&state).unwrap();
        assert_eq!(store.load(), state);
    }

    #[test]
    fn test_tag_date_stored_as_utc_seconds() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path());
        let date = Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 5).unwrap();

        let mut state = StateMap::new();
        state.insert(URL_A.to_string(), tracked("abc123", &[], Some(date)));
        store.save(&state).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json[URL_A]["newest_tag_date"], "2025-03-01 12:30:05");
        assert_eq!(json[URL_A]["commit_sha"], "abc123");
        assert!(json[URL_A].get("tag_names").is_none());
    }

    #[test]
    fn test_save_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("deep").join("cache");
        let store = StateStore::new(&nested);

        store.save(&StateMap::new()).unwrap();
        assert!(nested.join(STATE_FILE_NAME).exists());
    }

    #[test]
    fn test_malformed_file_returns_empty() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(STATE_FILE_NAME), "not json").unwrap();
        assert!(StateStore::new(dir.path()).load().is_empty());

        fs::write(dir.path().join(STATE_FILE_NAME), "[1, 2, 3]").unwrap();
        assert!(StateStore::new(dir.path()).load().is_empty());

        fs::write(dir.path().join(STATE_FILE_NAME), "{\"truncated\": ").unwrap();
        assert!(StateStore::new(dir.path()).load().is_empty());
    }

    #[test]
    fn test_failed_write_leaves_target_alone() {
        let dir = tempdir().unwrap();
        let target = dir.path().join(STATE_FILE_NAME);
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), "x").unwrap();

        assert!(write_atomic(&target, b"{}").is_err());
        assert_eq!(fs::read_to_string(target.join("keep")).unwrap(), "x");

        // The temporary file is cleaned up.
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_save_keeps_previous_state() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path());
        let mut state = StateMap::new();
        state.insert(URL_A.to_string(), tracked("abc123", &["v1"], None));
        store.save(&state).unwrap();

        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o555)).unwrap();
        // Permission bits are not enforced for a privileged user.
        let writable = fs::File::create(dir.path().join("write-check")).is_ok();

        let mut changed = state.clone();
        changed.insert(URL_B.to_string(), LastSeenState::Legacy("def456".to_string()));
        let result = store.save(&changed);

        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o755)).unwrap();
        if writable {
            return;
        }

        assert!(result.is_err());
        assert_eq!(store.load(), state);
    }

    #[test]
    fn test_unreadable_entries_are_dropped() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(STATE_FILE_NAME),
            format!("{{\"{}\": 42, \"{}\": \"abc\"}}", URL_A, URL_B),
        )
        .unwrap();

        let state = StateStore::new(dir.path()).load();
        assert_eq!(state.len(), 1);
        assert_eq!(get_last_commit(&state, URL_B), Some("abc"));
    }

    #[test]
    fn test_accessors_on_legacy_entry() {
        let mut state = StateMap::new();
        state.insert(URL_A.to_string(), LastSeenState::Legacy("abc123".to_string()));

        assert_eq!(get_last_commit(&state, URL_A), Some("abc123"));
        assert!(get_last_tag_names(&state, URL_A).is_empty());
        assert_eq!(get_last_tag_cutoff(&state, URL_A), None);
    }

    #[test]
    fn test_accessors_on_missing_entry() {
        let state = StateMap::new();
        assert_eq!(get_last_commit(&state, URL_A), None);
        assert!(get_last_tag_names(&state, URL_A).is_empty());
        assert_eq!(get_last_tag_cutoff(&state, URL_A), None);
    }

    #[test]
    fn test_accessors_on_tracked_entry() {
        let date = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        let mut state = StateMap::new();
        state.insert(URL_A.to_string(), tracked("def456", &["v1.0", "v0.9"], Some(date)));

        assert_eq!(get_last_commit(&state, URL_A), Some("def456"));
        let names = get_last_tag_names(&state, URL_A);
        assert!(names.contains("v1.0") && names.contains("v0.9"));
        assert_eq!(get_last_tag_cutoff(&state, URL_A), Some(date));
    }

    #[test]
    fn test_structured_entry_without_optional_fields() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(STATE_FILE_NAME),
            format!(
                "{{\"{}\": {{\"commit_sha\": \"abc\", \"newest_tag_date\": \"garbage\"}}}}",
                URL_A
            ),
        )
        .unwrap();

        let state = StateStore::new(dir.path()).load();
        assert_eq!(get_last_commit(&state, URL_A), Some("abc"));
        assert!(get_last_tag_names(&state, URL_A).is_empty());
        assert_eq!(get_last_tag_cutoff(&state, URL_A), None);
    }

    #[test]
    fn test_rfc3339_tag_date_is_accepted() {
        let value = serde_json::json!({
            "commit_sha": "abc",
            "newest_tag_date": "2025-01-02T03:04:05+02:00"
        });
        let entry: LastSeenState = serde_json::from_value(value).unwrap();
        assert_eq!(
            entry.tag_cutoff(),
            Some(Utc.with_ymd_and_hms(2025, 1, 2, 1, 4, 5).unwrap())
        );
    }

    #[test]
    fn test_blank_commit_id_reads_as_none() {
        let mut state = StateMap::new();
        state.insert(URL_A.to_string(), LastSeenState::Legacy("  ".to_string()));
        assert_eq!(get_last_commit(&state, URL_A), None);
    }
}
