//! Holocron - GitHub to GitLab/local repository mirroring
//!
//! Holocron discovers every repository visible to a GitHub token, keeps a
//! bare mirror of each one on local disk and optionally pushes an exact
//! mirror to a GitLab instance. In watch mode it polls on a fixed interval
//! and skips repositories whose latest push has already been mirrored.
//!
//! ## Modules
//!
//! - [`provider`]: GitHub source and GitLab destination listings and URLs
//! - [`filter`]: Staleness window and watch-mode scheduling rules
//! - [`cache`]: In-memory record of mirrored pushes
//! - [`engine`]: Per-repository clone/fetch/push/checkout state machine
//! - [`cycle`]: Bounded-concurrency cycle orchestration
//! - [`watch`]: Single-shot and polling driver
//! - [`git`]: `git` executable driver
//! - [`config`]: Configuration and credentials

pub mod cache;
pub mod config;
pub mod cycle;
pub mod engine;
pub mod error;
pub mod filter;
pub mod git;
pub mod provider;
pub mod watch;

#[cfg(test)]
mod test_log;

pub use cache::DedupCache;
pub use config::{Config, Credentials};
pub use cycle::{run_cycle, CycleSummary};
pub use engine::{CheckoutStatus, MirrorAction, RepoSyncEngine, SyncOutcome};
pub use error::{ConfigError, GitError, ProviderError, SyncError};
pub use filter::needs_sync;
pub use git::{GitCli, Vcs};
pub use provider::{GitHubProvider, GitLabProvider, Provider, Repository};
pub use watch::WatchLoop;
