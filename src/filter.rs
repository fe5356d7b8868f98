//! Staleness filter and watch-mode scheduling rules

use chrono::{DateTime, Duration, Utc};

use crate::cache::DedupCache;
use crate::provider::Repository;

// Largest window chrono can represent as milliseconds
const MAX_WINDOW_MINUTES: i64 = i64::MAX / 60_000;

/// Whether `repo` was pushed to within the last `window_minutes`.
///
/// No push information means false: staleness alone never forces a skip
/// for such a repository, the cache and mirror-existence rules decide.
pub fn needs_sync(repo: &Repository, window_minutes: u64) -> bool {
    needs_sync_at(repo, window_minutes, Utc::now())
}

/// [`needs_sync`] evaluated against a fixed `now`
pub fn needs_sync_at(repo: &Repository, window_minutes: u64, now: DateTime<Utc>) -> bool {
    let Some(pushed_at) = repo.last_pushed_at else {
        return false;
    };
    let minutes = i64::try_from(window_minutes)
        .unwrap_or(MAX_WINDOW_MINUTES)
        .min(MAX_WINDOW_MINUTES);
    let window = Duration::minutes(minutes);
    now.signed_duration_since(pushed_at) < window
}

/// Outcome of the watch-mode scheduling rules for one repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Run the sync engine for this repository
    Sync,
    /// This exact push is already mirrored
    SkipAlreadySynced,
    /// Mirror exists and the repository was not pushed recently
    SkipInactive,
}

/// Apply the scheduling rules.
///
/// Single-shot mode (`watch == false`) schedules everything. In watch mode:
/// skip when the cache already holds this push; otherwise skip when a mirror
/// exists and the repository is outside the freshness window; otherwise
/// sync. A repository without a local mirror is always scheduled unless its
/// current push is already cached.
pub fn schedule(
    repo: &Repository,
    cache: &DedupCache,
    mirror_exists: bool,
    window_minutes: u64,
    watch: bool,
    now: DateTime<Utc>,
) -> Schedule {
    if !watch {
        return Schedule::Sync;
    }
    if cache.is_current(&repo.name, repo.last_pushed_at) {
        return Schedule::SkipAlreadySynced;
    }
    if mirror_exists && !needs_sync_at(repo, window_minutes, now) {
        return Schedule::SkipInactive;
    }
    Schedule::Sync
}
