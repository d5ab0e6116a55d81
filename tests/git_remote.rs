mod common;

use chrono::{TimeZone, Utc};
use common::{Origin, EPOCH};
use git_digest::git::{GitRemote, RepoAccess, DEFAULT_CLONE_DEPTH};
use tempfile::tempdir;

fn subjects(records: &[git_digest::CommitRecord]) -> Vec<&str> {
    records.iter().map(|c| c.subject.as_str()).collect()
}

#[test]
fn test_clone_lists_commits_newest_first() {
    let origin_dir = tempdir().unwrap();
    let cache = tempdir().unwrap();
    let origin = Origin::init(origin_dir.path());
    origin.commit("first", 10);
    origin.commit("second\n\nbody text", 20);
    let head = origin.commit("third", 30);

    let remote = GitRemote::new(cache.path(), 0);
    let local = remote.ensure_local_copy(&origin.url, "HEAD").unwrap();
    assert!(local.path.starts_with(cache.path()));

    let commits = remote.list_commits(&local, "HEAD", 10).unwrap();
    assert_eq!(subjects(&commits), vec!["third", "second", "first"]);
    assert_eq!(commits[0].id, head.to_string());
    assert_eq!(commits[0].short_id, &head.to_string()[..7]);
    assert_eq!(commits[0].author, "Ada");
    assert_eq!(commits[0].timestamp, Utc.timestamp_opt(EPOCH + 30, 0).unwrap());
    assert!(commits[0].ref_labels.contains("origin/main"));

    let limited = remote.list_commits(&local, "HEAD", 2).unwrap();
    assert_eq!(subjects(&limited), vec!["third", "second"]);
}

#[test]
fn test_existing_clone_is_reused() {
    let origin_dir = tempdir().unwrap();
    let cache = tempdir().unwrap();
    let origin = Origin::init(origin_dir.path());
    origin.commit("only", 10);

    let remote = GitRemote::new(cache.path(), 0);
    let first = remote.ensure_local_copy(&origin.url, "HEAD").unwrap();
    let second = remote.ensure_local_copy(&origin.url, "HEAD").unwrap();
    assert_eq!(first, second);
    assert_eq!(first.path, remote.clone_path(&origin.url));
}

#[test]
fn test_fetch_sees_new_commits_and_tags() {
    let origin_dir = tempdir().unwrap();
    let cache = tempdir().unwrap();
    let origin = Origin::init(origin_dir.path());
    let first = origin.commit("first", 10);
    origin.lightweight_tag("v0.1", first);

    let remote = GitRemote::new(cache.path(), 0);
    let local = remote.ensure_local_copy(&origin.url, "HEAD").unwrap();
    let tags = remote.list_tags(&local).unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name, "v0.1");
    assert_eq!(tags[0].message, "");
    assert_eq!(tags[0].timestamp, Some(Utc.timestamp_opt(EPOCH + 10, 0).unwrap()));

    let second = origin.commit("second", 20);
    origin.annotated_tag("v0.2", second, "Second release\n\nNotes");

    // Listing reads the local copy, so nothing changes until a fetch.
    let before = remote.list_commits(&local, "HEAD", 10).unwrap();
    assert_eq!(subjects(&before), vec!["first"]);

    remote.fetch_updates(&local).unwrap();

    let after = remote.list_commits(&local, "HEAD", 10).unwrap();
    assert_eq!(subjects(&after), vec!["second", "first"]);

    let mut tags = remote.list_tags(&local).unwrap();
    tags.sort_by(|a, b| a.name.cmp(&b.name));
    assert_eq!(tags.len(), 2);
    assert_eq!(tags[1].name, "v0.2");
    assert_eq!(tags[1].message, "Second release");
    assert_eq!(tags[1].short_id, &second.to_string()[..7]);
    assert_eq!(tags[1].timestamp, Some(Utc.timestamp_opt(EPOCH + 20, 0).unwrap()));
}

#[test]
fn test_named_branch() {
    let origin_dir = tempdir().unwrap();
    let cache = tempdir().unwrap();
    let origin = Origin::init(origin_dir.path());
    let base = origin.commit("base", 10);
    origin.commit("on main", 20);
    origin.branch("develop", base);
    origin.commit_on("refs/heads/develop", "on develop", 30);

    let remote = GitRemote::new(cache.path(), 0);
    let local = remote.ensure_local_copy(&origin.url, "develop").unwrap();

    let commits = remote.list_commits(&local, "develop", 10).unwrap();
    assert_eq!(subjects(&commits), vec!["on develop", "base"]);

    let main = remote.list_commits(&local, "main", 10).unwrap();
    assert_eq!(subjects(&main), vec!["on main", "base"]);
}

#[test]
fn test_unknown_ref_is_error() {
    let origin_dir = tempdir().unwrap();
    let cache = tempdir().unwrap();
    let origin = Origin::init(origin_dir.path());
    origin.commit("only", 10);

    let remote = GitRemote::new(cache.path(), 0);
    let local = remote.ensure_local_copy(&origin.url, "HEAD").unwrap();

    let error = remote.list_commits(&local, "no-such-branch", 10).unwrap_err();
    assert!(error.to_string().contains("no-such-branch"));
}

#[test]
fn test_unreachable_remote_is_error() {
    let missing = tempdir().unwrap();
    let cache = tempdir().unwrap();
    let url = missing.path().join("gone").to_str().unwrap().to_string();

    let remote = GitRemote::new(cache.path(), 0);
    let error = remote.ensure_local_copy(&url, "HEAD").unwrap_err();
    assert!(format!("{:#}", error).contains("Failed to clone"));
}

#[test]
fn test_default_depth_clones_local_remotes() {
    let origin_dir = tempdir().unwrap();
    let origin = Origin::init(origin_dir.path());
    origin.commit("first", 10);

    for url in [origin.url.clone(), format!("file://{}", origin.url)] {
        let cache = tempdir().unwrap();
        let remote = GitRemote::new(cache.path(), DEFAULT_CLONE_DEPTH);
        let local = remote.ensure_local_copy(&url, "HEAD").unwrap();
        remote.fetch_updates(&local).unwrap();

        let commits = remote.list_commits(&local, "HEAD", 10).unwrap();
        assert_eq!(subjects(&commits), vec!["first"]);
    }
}

#[test]
fn test_same_repo_name_on_two_remotes() {
    let first_root = tempdir().unwrap();
    let second_root = tempdir().unwrap();
    let first = Origin::init(&first_root.path().join("acme/widget"));
    let second = Origin::init(&second_root.path().join("acme/widget"));
    first.commit("from first host", 10);
    second.commit("from second host", 10);

    let cache = tempdir().unwrap();
    let remote = GitRemote::new(cache.path(), 0);
    let first_local = remote.ensure_local_copy(&first.url, "HEAD").unwrap();
    let second_local = remote.ensure_local_copy(&second.url, "HEAD").unwrap();
    assert_ne!(first_local.path, second_local.path);

    let first_commits = remote.list_commits(&first_local, "HEAD", 10).unwrap();
    let second_commits = remote.list_commits(&second_local, "HEAD", 10).unwrap();
    assert_eq!(subjects(&first_commits), vec!["from first host"]);
    assert_eq!(subjects(&second_commits), vec!["from second host"]);

    // A later run finds the same clones again.
    assert_eq!(remote.ensure_local_copy(&second.url, "HEAD").unwrap(), second_local);
}

#[test]
fn test_merged_history_is_newest_first() {
    let origin_dir = tempdir().unwrap();
    let cache = tempdir().unwrap();
    let origin = Origin::init(origin_dir.path());
    let base = origin.commit("base", 10);
    origin.branch("feature", base);
    let feature = origin.commit_on("refs/heads/feature", "feature work", 20);
    origin.commit("main work", 30);
    origin.merge(feature, "merge feature", 40);

    let remote = GitRemote::new(cache.path(), 0);
    let local = remote.ensure_local_copy(&origin.url, "HEAD").unwrap();

    let commits = remote.list_commits(&local, "HEAD", 10).unwrap();
    assert_eq!(
        subjects(&commits),
        vec!["merge feature", "main work", "feature work", "base"]
    );

    let limited = remote.list_commits(&local, "HEAD", 2).unwrap();
    assert_eq!(subjects(&limited), vec!["merge feature", "main work"]);
}
