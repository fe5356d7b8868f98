//! Cycle orchestration - runs the sync engine over one listing
//!
//! Scheduling decisions and Dedup Cache writes happen here, on the calling
//! task. Workers only run [`RepoSyncEngine::sync_repo`] for their own
//! repository, bounded by a semaphore sized to the configured concurrency.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::cache::DedupCache;
use crate::engine::{RepoSyncEngine, SyncOutcome};
use crate::filter::{schedule, Schedule};
use crate::provider::Repository;

/// Results from one sync cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub discovered: usize,
    pub scheduled: usize,
    pub skipped: usize,
    pub synced: usize,
    /// Dry-run previews; these never touch the cache
    pub previewed: usize,
    pub failed: usize,
    pub duration: Duration,
}

/// Run one cycle over `repos`, recording successful pushes in `cache`.
///
/// Returns once every scheduled repository has finished; per-repository
/// failures are logged and counted, never propagated.
pub async fn run_cycle(
    engine: Arc<RepoSyncEngine>,
    repos: Vec<Repository>,
    cache: &mut DedupCache,
) -> CycleSummary {
    let start = Instant::now();
    let config = engine.config();
    let now = Utc::now();

    let mut summary = CycleSummary {
        discovered: repos.len(),
        ..CycleSummary::default()
    };

    log_storage_estimate(&repos, config.sync.checkout);

    let mut scheduled = Vec::new();
    for repo in repos {
        let mirror_exists = engine.mirror_dir(&repo).exists();
        match schedule(
            &repo,
            cache,
            mirror_exists,
            config.sync.window,
            config.sync.watch,
            now,
        ) {
            Schedule::Sync => scheduled.push(repo),
            Schedule::SkipAlreadySynced => {
                debug!("[{}] Already synced this push, skipping", repo.name);
                summary.skipped += 1;
            }
            Schedule::SkipInactive => {
                debug!(
                    "[{}] Not pushed in the last {} minutes, skipping",
                    repo.name, config.sync.window
                );
                summary.skipped += 1;
            }
        }
    }
    summary.scheduled = scheduled.len();

    let permits = config.sync.concurrency.clamp(1, Semaphore::MAX_PERMITS);
    let semaphore = Arc::new(Semaphore::new(permits));
    let mut running = FuturesUnordered::new();

    for repo in scheduled {
        let name = repo.name.clone();
        let pushed_at = repo.last_pushed_at;
        let engine = Arc::clone(&engine);
        let semaphore = Arc::clone(&semaphore);

        let handle = tokio::spawn(async move {
            // the semaphore is never closed
            let _permit = semaphore.acquire_owned().await.ok();
            engine.sync_repo(&repo).await
        });

        running.push(async move { (name, pushed_at, handle.await) });
    }

    while let Some((name, pushed_at, joined)) = running.next().await {
        match joined {
            Ok(Ok(SyncOutcome::DryRun { .. })) => summary.previewed += 1,
            Ok(Ok(outcome)) => {
                debug!("[{}] Sync completed: {:?}", name, outcome);
                summary.synced += 1;
                if let Some(pushed_at) = pushed_at {
                    cache.record(name, pushed_at);
                }
            }
            Ok(Err(e)) => {
                error!(repo = %e.repo_name(), "{}", e);
                summary.failed += 1;
            }
            Err(e) => {
                error!("[{}] Sync task aborted: {}", name, e);
                summary.failed += 1;
            }
        }
    }

    summary.duration = start.elapsed();
    summary
}

/// Human-readable size for a kilobyte count: MB, or GB above one gigabyte
pub fn format_size(kb: u64) -> String {
    let mb = kb as f64 / 1024.0;
    let gb = mb / 1024.0;
    if gb > 1.0 {
        format!("{:.2} GB", gb)
    } else {
        format!("{:.2} MB", mb)
    }
}

/// Log the total remote size of a listing and what it may take locally
pub fn log_storage_estimate(repos: &[Repository], checkout: bool) {
    let total_kb: u64 = repos.iter().map(|r| r.size).sum();
    info!("Total remote size (compressed): {}", format_size(total_kb));

    if checkout {
        // working tree plus metadata next to each mirror
        let estimate = total_kb.saturating_mul(3);
        info!(
            "Estimated local size (with checkout): ~{}",
            format_size(estimate)
        );
    } else {
        info!("Note: Local bare repositories may be slightly larger than remote.");
    }
}
