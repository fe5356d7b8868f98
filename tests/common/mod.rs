//! Shared helpers for Holocron integration tests
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use async_trait::async_trait;
use holocron::{Provider, Repository};

/// Skip git-backed tests on machines without git
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run git with a throwaway identity and assert it succeeded
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
        .args(args)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Create a non-bare repository with one commit
pub fn init_source(path: &Path) {
    std::fs::create_dir_all(path).expect("Failed to create source dir");
    git(path, &["init", "--quiet"]);
    commit(path, "initial");
}

pub fn commit(path: &Path, message: &str) {
    git(path, &["commit", "--quiet", "--allow-empty", "-m", message]);
}

/// Create an empty bare repository to push into
pub fn init_bare(path: &Path) {
    std::fs::create_dir_all(path).expect("Failed to create bare dir");
    git(path, &["init", "--quiet", "--bare"]);
}

/// Number of commits reachable from any ref
pub fn commit_count(repo: &Path) -> usize {
    git(repo, &["rev-list", "--all", "--count"])
        .parse()
        .expect("rev-list count")
}

pub fn branches(repo: &Path) -> Vec<String> {
    git(repo, &["for-each-ref", "--format=%(refname:short)", "refs/heads"])
        .lines()
        .map(str::to_string)
        .collect()
}

/// Provider serving repositories from directories on local disk
///
/// `{root}/{name}` is the transfer URL; no token is injected.
pub struct LocalProvider {
    pub root: PathBuf,
    pub repos: Vec<Repository>,
    pub suffix: &'static str,
}

impl LocalProvider {
    pub fn source(root: &Path, repos: Vec<Repository>) -> Self {
        Self {
            root: root.to_path_buf(),
            repos,
            suffix: "",
        }
    }

    pub fn destination(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            repos: Vec::new(),
            suffix: ".git",
        }
    }
}

#[async_trait]
impl Provider for LocalProvider {
    async fn fetch_repos(&self, _verbose: bool) -> Vec<Repository> {
        self.repos.clone()
    }

    fn get_remote_url(&self, repo: &Repository) -> String {
        self.root
            .join(format!("{}{}", repo.name, self.suffix))
            .to_string_lossy()
            .into_owned()
    }

    fn provider_name(&self) -> &'static str {
        "Local"
    }
}
