//! End-to-end cycles against real local git repositories

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_fs::prelude::*;
use assert_fs::TempDir;
use chrono::{Duration as ChronoDuration, Utc};
use predicates::prelude::*;

use common::{
    branches, commit, commit_count, git, git_available, init_bare, init_source, LocalProvider,
};
use holocron::{run_cycle, Config, DedupCache, GitCli, Provider, RepoSyncEngine, Repository};

fn config(storage: &TempDir, watch: bool, backup_only: bool, checkout: bool) -> Config {
    let mut config = Config::default();
    config.storage = storage.child("mirrors").path().to_string_lossy().into_owned();
    config.sync.watch = watch;
    config.sync.backup_only = backup_only;
    config.sync.checkout = checkout;
    config.sync.window = 10;
    config
}

fn engine(
    config: Config,
    source: &Arc<dyn Provider>,
    destination: Option<Arc<dyn Provider>>,
) -> Arc<RepoSyncEngine> {
    Arc::new(RepoSyncEngine::new(
        Arc::new(config),
        Arc::clone(source),
        destination,
        Arc::new(GitCli::new(Duration::from_secs(60))),
    ))
}

#[tokio::test]
async fn test_watch_cycle_mirrors_pushes_and_dedups() {
    if !git_available() {
        return;
    }
    let temp = TempDir::new().unwrap();
    let source_root = temp.child("source");
    let dest_root = temp.child("dest");
    init_source(source_root.child("a").path());
    init_bare(dest_root.child("a.git").path());

    let pushed = Utc::now() - ChronoDuration::minutes(5);
    let listing = vec![Repository::new("a", "local").pushed_at(pushed)];
    let source: Arc<dyn Provider> =
        Arc::new(LocalProvider::source(source_root.path(), listing.clone()));
    let destination: Arc<dyn Provider> = Arc::new(LocalProvider::destination(dest_root.path()));

    let engine = engine(config(&temp, true, false, false), &source, Some(destination));
    let mut cache = DedupCache::new();

    let first = run_cycle(Arc::clone(&engine), listing.clone(), &mut cache).await;
    assert_eq!(first.synced, 1);
    assert_eq!(first.failed, 0);
    assert_eq!(cache.get("a"), Some(pushed));

    temp.child("mirrors/a.git").assert(predicate::path::is_dir());
    temp.child("mirrors/a.git/HEAD").assert(predicate::path::exists());
    temp.child("mirrors/a").assert(predicate::path::missing());
    assert_eq!(commit_count(dest_root.child("a.git").path()), 1);

    let second = run_cycle(engine, listing, &mut cache).await;
    assert_eq!(second.synced, 0);
    assert_eq!(second.skipped, 1);
}

#[tokio::test]
async fn test_mirror_push_propagates_new_commits_and_deleted_branches() {
    if !git_available() {
        return;
    }
    let temp = TempDir::new().unwrap();
    let source_root = temp.child("source");
    let dest_root = temp.child("dest");
    let repo_dir = source_root.child("tool");
    init_source(repo_dir.path());
    git(repo_dir.path(), &["branch", "feature"]);
    init_bare(dest_root.child("tool.git").path());

    let listing = vec![Repository::new("tool", "local")];
    let source: Arc<dyn Provider> =
        Arc::new(LocalProvider::source(source_root.path(), listing.clone()));
    let destination: Arc<dyn Provider> = Arc::new(LocalProvider::destination(dest_root.path()));
    let engine = engine(config(&temp, false, false, false), &source, Some(destination));
    let mut cache = DedupCache::new();

    let first = run_cycle(Arc::clone(&engine), listing.clone(), &mut cache).await;
    assert_eq!(first.synced, 1);
    assert_eq!(branches(dest_root.child("tool.git").path()), branches(repo_dir.path()));

    commit(repo_dir.path(), "second");
    git(repo_dir.path(), &["branch", "-D", "feature"]);

    let second = run_cycle(engine, listing, &mut cache).await;
    assert_eq!(second.synced, 1);

    let dest = dest_root.child("tool.git");
    assert_eq!(commit_count(dest.path()), 2);
    assert!(!branches(dest.path()).contains(&"feature".to_string()));
    // no push time, nothing to remember
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_backup_only_checkout_is_created_then_updated() {
    if !git_available() {
        return;
    }
    let temp = TempDir::new().unwrap();
    let source_root = temp.child("source");
    let repo_dir = source_root.child("notes");
    init_source(repo_dir.path());

    let listing = vec![Repository::new("notes", "local")];
    let source: Arc<dyn Provider> =
        Arc::new(LocalProvider::source(source_root.path(), listing.clone()));
    let engine = engine(config(&temp, false, true, true), &source, None);
    let mut cache = DedupCache::new();

    let first = run_cycle(Arc::clone(&engine), listing.clone(), &mut cache).await;
    assert_eq!(first.synced, 1);
    temp.child("mirrors/notes.git").assert(predicate::path::is_dir());
    temp.child("mirrors/notes/.git").assert(predicate::path::is_dir());

    commit(repo_dir.path(), "second");
    let second = run_cycle(engine, listing, &mut cache).await;
    assert_eq!(second.synced, 1);

    let checkout = temp.child("mirrors/notes");
    assert_eq!(git(checkout.path(), &["rev-list", "--count", "HEAD"]), "2");
}

#[tokio::test]
async fn test_failed_clone_is_isolated_and_retried() {
    if !git_available() {
        return;
    }
    let temp = TempDir::new().unwrap();
    let source_root = temp.child("source");
    init_source(source_root.child("good").path());

    let pushed = Utc::now() - ChronoDuration::minutes(1);
    let listing = vec![
        Repository::new("good", "local").pushed_at(pushed),
        Repository::new("missing", "local").pushed_at(pushed),
    ];
    let source: Arc<dyn Provider> =
        Arc::new(LocalProvider::source(source_root.path(), listing.clone()));
    let engine = engine(config(&temp, true, true, false), &source, None);
    let mut cache = DedupCache::new();

    let first = run_cycle(Arc::clone(&engine), listing.clone(), &mut cache).await;
    assert_eq!(first.synced, 1);
    assert_eq!(first.failed, 1);
    assert_eq!(cache.get("missing"), None);
    temp.child("mirrors/missing.git").assert(predicate::path::missing());

    // the failed repository is scheduled again, the synced one is not
    let second = run_cycle(engine, listing, &mut cache).await;
    assert_eq!(second.scheduled, 1);
    assert_eq!(second.failed, 1);
}

#[tokio::test]
async fn test_dry_run_creates_nothing() {
    let temp = TempDir::new().unwrap();
    let listing = vec![Repository::new("a", "local").pushed_at(Utc::now())];
    let source: Arc<dyn Provider> =
        Arc::new(LocalProvider::source(temp.path(), listing.clone()));
    let destination: Arc<dyn Provider> = Arc::new(LocalProvider::destination(temp.path()));

    let mut config = config(&temp, false, false, true);
    config.sync.dry_run = true;
    let engine = engine(config, &source, Some(destination));
    let mut cache = DedupCache::new();

    let summary = run_cycle(engine, listing, &mut cache).await;

    assert_eq!(summary.previewed, 1);
    temp.child("mirrors").assert(predicate::path::missing());
    assert!(cache.is_empty());
}
