//! Per-repository sync state machine
//!
//! The local mirror directory `{storage}/{name}.git` is the only state: when
//! it is absent the repository is mirror-cloned from the source, otherwise
//! all refs are fetched with pruning. Either way the mirror is then pushed
//! to the destination (unless backup-only), and the optional checkout
//! sidecar `{storage}/{name}` is cloned from the local mirror or updated.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{redact_credentials, SyncError};
use crate::git::Vcs;
use crate::provider::{Provider, Repository};

/// Reported as the dry-run target when nothing is pushed
pub const BACKUP_ONLY_TARGET: &str = "(Local Backup Only)";

/// Which transition brought the mirror up to date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorAction {
    /// No mirror existed; a full mirror clone was made
    Cloned,
    /// Existing mirror refreshed with a pruning fetch
    Fetched,
}

/// Result of the best-effort checkout maintenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutStatus {
    Disabled,
    Created,
    Updated,
    Failed(String),
}

/// What a successful run of the engine did for one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Dry run: nothing touched. `target` has credentials masked.
    DryRun { target: String },
    Synced {
        action: MirrorAction,
        pushed: bool,
        checkout: CheckoutStatus,
    },
}

/// Runs the state machine for one repository at a time
pub struct RepoSyncEngine {
    config: Arc<Config>,
    source: Arc<dyn Provider>,
    destination: Option<Arc<dyn Provider>>,
    vcs: Arc<dyn Vcs>,
}

impl RepoSyncEngine {
    pub fn new(
        config: Arc<Config>,
        source: Arc<dyn Provider>,
        destination: Option<Arc<dyn Provider>>,
        vcs: Arc<dyn Vcs>,
    ) -> Self {
        if config.pushes() && destination.is_none() {
            warn!("Pushing is enabled but no destination is configured; mirroring locally only");
        }
        Self {
            config,
            source,
            destination,
            vcs,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mirror_dir(&self, repo: &Repository) -> PathBuf {
        self.config.mirror_dir(&repo.name)
    }

    /// Authenticated destination URL, when this repository gets pushed
    fn push_target(&self, repo: &Repository) -> Option<String> {
        if !self.config.pushes() {
            return None;
        }
        self.destination
            .as_ref()
            .map(|destination| destination.get_remote_url(repo))
    }

    /// Bring one repository's mirror (and push target, and checkout) up to date
    pub async fn sync_repo(&self, repo: &Repository) -> Result<SyncOutcome, SyncError> {
        let name = repo.name.as_str();
        let push_target = self.push_target(repo);

        if self.config.sync.dry_run {
            let target = push_target
                .as_deref()
                .map(redact_credentials)
                .unwrap_or_else(|| BACKUP_ONLY_TARGET.to_string());
            info!("[DRY-RUN] Would sync '{}' -> '{}'", name, target);
            return Ok(SyncOutcome::DryRun { target });
        }

        let storage = self.config.storage_path();
        tokio::fs::create_dir_all(&storage)
            .await
            .map_err(|source| SyncError::Storage {
                name: name.to_string(),
                source,
            })?;

        let mirror = self.mirror_dir(repo);
        let action = self.refresh_mirror(repo, &mirror).await?;

        // the checkout is maintained even when the push fails
        let pushed = match &push_target {
            Some(url) => self.push_mirror(name, &mirror, url).await.map(|_| true),
            None => {
                info!("[{}] Successfully backed up locally.", name);
                Ok(false)
            }
        };

        let checkout = if self.config.sync.checkout {
            self.maintain_checkout(name, &mirror).await
        } else {
            CheckoutStatus::Disabled
        };

        Ok(SyncOutcome::Synced {
            action,
            pushed: pushed?,
            checkout,
        })
    }

    /// Uninitialized -> Mirrored (clone) or Mirrored -> Mirrored (fetch)
    async fn refresh_mirror(
        &self,
        repo: &Repository,
        mirror: &Path,
    ) -> Result<MirrorAction, SyncError> {
        let name = repo.name.as_str();

        if !mirror.exists() {
            info!("[{}] Cloning new mirror...", name);
            let url = self.source.get_remote_url(repo);
            self.vcs
                .mirror_clone(&url, mirror)
                .await
                .map_err(|source| SyncError::Clone {
                    name: name.to_string(),
                    source,
                })?;
            Ok(MirrorAction::Cloned)
        } else {
            debug!("[{}] Fetching updates...", name);
            self.vcs
                .fetch_prune(mirror)
                .await
                .map_err(|source| SyncError::Fetch {
                    name: name.to_string(),
                    source,
                })?;
            Ok(MirrorAction::Fetched)
        }
    }

    async fn push_mirror(&self, name: &str, mirror: &Path, url: &str) -> Result<(), SyncError> {
        self.vcs
            .set_push_url(mirror, url)
            .await
            .map_err(|source| SyncError::SetPushUrl {
                name: name.to_string(),
                source,
            })?;

        self.vcs
            .push_mirror(mirror)
            .await
            .map_err(|source| SyncError::Push {
                name: name.to_string(),
                source,
            })?;

        info!(
            "[{}] Successfully synced to {}.",
            name,
            self.destination
                .as_ref()
                .map(|d| d.provider_name())
                .unwrap_or("destination")
        );
        Ok(())
    }

    /// Clone the sidecar from the local mirror, or pull it; never fails the sync
    async fn maintain_checkout(&self, name: &str, mirror: &Path) -> CheckoutStatus {
        let checkout = self.config.checkout_dir(name);

        if !checkout.exists() {
            debug!("[{}] Creating checkout...", name);
            match self.vcs.clone_checkout(mirror, &checkout).await {
                Ok(()) => CheckoutStatus::Created,
                Err(e) => {
                    warn!("[{}] Failed to create checkout: {}", name, e);
                    CheckoutStatus::Failed(e.to_string())
                }
            }
        } else {
            debug!("[{}] Updating checkout...", name);
            match self.vcs.pull(&checkout).await {
                Ok(()) => CheckoutStatus::Updated,
                Err(e) => {
                    warn!("[{}] Failed to update checkout: {}", name, e);
                    CheckoutStatus::Failed(e.to_string())
                }
            }
        }
    }
}
