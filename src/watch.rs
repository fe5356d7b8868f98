//! Single-shot and watch-mode driver
//!
//! Owns the Dedup Cache for the life of the process. Each iteration fetches
//! a fresh listing from the source, runs one cycle to completion and, in
//! watch mode, sleeps for the configured interval. In watch mode a single
//! Ctrl+C listener is armed for the whole run: a signal during the sleep ends
//! the loop at once, a signal during a cycle ends it once that cycle is done.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cache::DedupCache;
use crate::cycle::{run_cycle, CycleSummary};
use crate::engine::RepoSyncEngine;
use crate::provider::Provider;

pub struct WatchLoop {
    engine: Arc<RepoSyncEngine>,
    source: Arc<dyn Provider>,
    cache: DedupCache,
    interval: Duration,
}

impl WatchLoop {
    pub fn new(engine: Arc<RepoSyncEngine>, source: Arc<dyn Provider>, interval: Duration) -> Self {
        Self {
            engine,
            source,
            cache: DedupCache::new(),
            interval,
        }
    }

    /// Fetch the listing once and run one cycle over it
    pub async fn run_once(&mut self) -> CycleSummary {
        let verbose = self.engine.config().sync.verbose;
        let repos = self.source.fetch_repos(verbose).await;
        debug!(
            "Found {} repositories on {}.",
            repos.len(),
            self.source.provider_name()
        );

        let summary = run_cycle(Arc::clone(&self.engine), repos, &mut self.cache).await;
        log_summary(&summary);
        summary
    }

    /// Run one cycle, or keep cycling until Ctrl+C when watching
    pub async fn run(&mut self) {
        if !self.engine.config().sync.watch {
            self.run_once().await;
            return;
        }

        let (shutdown_sender, shutdown) = watch::channel(false);
        let listener = tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown signal received, finishing current work...");
                    let _ = shutdown_sender.send(true);
                }
                Err(e) => {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                    // keep the channel open so the loop does not see a shutdown
                    std::future::pending::<()>().await;
                }
            }
        });

        self.run_until(shutdown).await;
        listener.abort();
    }

    /// Keep cycling until `shutdown` turns true.
    ///
    /// The flag is checked after every cycle and awaited during the sleep
    /// between cycles, so a request that arrives mid-cycle is not lost.
    pub async fn run_until(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Watching for changes every {:?}", self.interval);

        loop {
            self.run_once().await;

            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    debug!("Starting scheduled sync cycle");
                }
                Ok(_) = shutdown.wait_for(|stop| *stop) => {
                    break;
                }
            }
        }

        info!("Watch loop stopped");
    }
}

fn log_summary(summary: &CycleSummary) {
    if summary.synced > 0 {
        info!("Sync cycle complete. Updated {} repositories.", summary.synced);
    } else {
        debug!("No changes detected in this cycle.");
    }

    debug!(
        "Cycle finished in {:.2}s: {} discovered, {} scheduled, {} skipped, {} synced, {} failed, {} previewed",
        summary.duration.as_secs_f64(),
        summary.discovered,
        summary.scheduled,
        summary.skipped,
        summary.synced,
        summary.failed,
        summary.previewed
    );
}
