//! Origin repositories built on disk for adapter tests

#![allow(dead_code)]

use git2::{Commit, Oid, Repository, RepositoryInitOptions, Signature, Time};
use std::fs;
use std::path::Path;

/// Base for commit times; each helper call passes an offset from it
pub const EPOCH: i64 = 1_717_200_000;

pub struct Origin {
    pub repo: Repository,
    pub url: String,
}

impl Origin {
    pub fn init(dir: &Path) -> Self {
        let mut options = RepositoryInitOptions::new();
        options.initial_head("main");
        fs::create_dir_all(dir).unwrap();
        let repo = Repository::init_opts(dir, &options).unwrap();

        Self {
            repo,
            url: dir.to_str().unwrap().to_string(),
        }
    }

    pub fn signature(offset: i64) -> Signature<'static> {
        Signature::new("Ada", "ada@example.com", &Time::new(EPOCH + offset, 0)).unwrap()
    }

    /// Commit onto `refname` (e.g. `HEAD` or `refs/heads/develop`)
    pub fn commit_on(&self, refname: &str, message: &str, offset: i64) -> Oid {
        let sig = Self::signature(offset);
        let workdir = self.repo.workdir().unwrap();
        fs::write(workdir.join("log.txt"), format!("{}\n", message)).unwrap();

        let mut index = self.repo.index().unwrap();
        index.add_path(Path::new("log.txt")).unwrap();
        index.write().unwrap();
        let tree = self.repo.find_tree(index.write_tree().unwrap()).unwrap();

        let parent = self
            .repo
            .find_reference(refname)
            .ok()
            .and_then(|r| r.peel_to_commit().ok());
        let parents: Vec<&Commit> = parent.iter().collect();

        self.repo
            .commit(Some(refname), &sig, &sig, message, &tree, &parents)
            .unwrap()
    }

    pub fn commit(&self, message: &str, offset: i64) -> Oid {
        self.commit_on("HEAD", message, offset)
    }

    /// Merge commit on HEAD with `other` as second parent
    pub fn merge(&self, other: Oid, message: &str, offset: i64) -> Oid {
        let sig = Self::signature(offset);
        let head = self.repo.head().unwrap().peel_to_commit().unwrap();
        let other = self.repo.find_commit(other).unwrap();
        let tree = head.tree().unwrap();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &[&head, &other])
            .unwrap()
    }

    pub fn lightweight_tag(&self, name: &str, target: Oid) {
        let object = self.repo.find_object(target, None).unwrap();
        self.repo.tag_lightweight(name, &object, false).unwrap();
    }

    pub fn annotated_tag(&self, name: &str, target: Oid, message: &str) {
        let object = self.repo.find_object(target, None).unwrap();
        let sig = Self::signature(0);
        self.repo.tag(name, &object, &sig, message, false).unwrap();
    }

    pub fn branch(&self, name: &str, target: Oid) {
        let commit = self.repo.find_commit(target).unwrap();
        self.repo.branch(name, &commit, false).unwrap();
    }
}
