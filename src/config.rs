use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dirs::config_dir;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::error::ConfigError;

/// Main configuration structure for Holocron
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Local storage root for bare mirrors and checkouts
    #[serde(default = "default_storage")]
    pub storage: String,

    /// Synchronization behavior settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Hosting service endpoints
    #[serde(default)]
    pub providers: ProviderConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Synchronization configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// Only report what would be synced
    #[serde(skip)]
    pub dry_run: bool,

    /// Keep polling instead of running a single cycle
    #[serde(skip)]
    pub watch: bool,

    /// Log per-page and per-step detail
    #[serde(skip)]
    pub verbose: bool,

    /// Time to sleep between cycles in watch mode
    #[serde(default = "default_interval")]
    pub interval: String, // "60s", "5m"

    /// Staleness window in minutes
    #[serde(default = "default_window")]
    pub window: u64,

    /// Maximum repositories synced at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Mirror locally only, never push to the destination
    #[serde(default)]
    pub backup_only: bool,

    /// Maintain a working copy next to each mirror
    #[serde(default)]
    pub checkout: bool,

    /// Timeout for a single git command in seconds
    #[serde(default = "default_git_timeout")]
    pub git_timeout: u64,

    /// Timeout for a single listing page request in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout: u64,
}

/// Provider API endpoints
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,

    #[serde(default = "default_gitlab_api_url")]
    pub gitlab_api_url: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level used when RUST_LOG is unset and --verbose is off
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Tokens for the source and (optionally) destination provider
#[derive(Clone)]
pub struct Credentials {
    pub source_token: String,
    pub destination_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("source_token", &"***")
            .field(
                "destination_token",
                &self.destination_token.as_ref().map(|_| "***"),
            )
            .finish()
    }
}

impl Credentials {
    pub const SOURCE_VAR: &'static str = "GITHUB_TOKEN";
    pub const DESTINATION_VAR: &'static str = "GITLAB_TOKEN";

    /// Read tokens from the process environment.
    ///
    /// The destination token is only required when pushing is enabled.
    pub fn from_env(backup_only: bool) -> Result<Self, ConfigError> {
        Self::resolve(
            env::var(Self::SOURCE_VAR).ok(),
            env::var(Self::DESTINATION_VAR).ok(),
            backup_only,
        )
    }

    /// Validate raw token values; empty strings count as missing
    pub fn resolve(
        source: Option<String>,
        destination: Option<String>,
        backup_only: bool,
    ) -> Result<Self, ConfigError> {
        let source_token = source
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingToken(Self::SOURCE_VAR))?;

        let destination_token = destination.filter(|t| !t.is_empty());
        if !backup_only && destination_token.is_none() {
            return Err(ConfigError::MissingToken(Self::DESTINATION_VAR));
        }

        Ok(Self {
            source_token,
            destination_token: if backup_only { None } else { destination_token },
        })
    }
}

// Default value functions
fn default_storage() -> String {
    "./mirror-data".to_string()
}
fn default_interval() -> String {
    "60s".to_string()
}
fn default_window() -> u64 {
    10
}
fn default_concurrency() -> usize {
    5
}
fn default_git_timeout() -> u64 {
    900
}
fn default_http_timeout() -> u64 {
    20
}
fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_gitlab_api_url() -> String {
    "http://gitlab.local/api/v4".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            watch: false,
            verbose: false,
            interval: default_interval(),
            window: default_window(),
            concurrency: default_concurrency(),
            backup_only: false,
            checkout: false,
            git_timeout: default_git_timeout(),
            http_timeout: default_http_timeout(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            github_api_url: default_github_api_url(),
            gitlab_api_url: default_gitlab_api_url(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: default_storage(),
            sync: SyncConfig::default(),
            providers: ProviderConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load the default config file if it exists, otherwise use defaults
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Self::default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                let mut config = Self::default();
                config.expand_paths()?;
                Ok(config)
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let mut config: Config =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        config.expand_paths()?;

        Ok(config)
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("holocron").join("config.yml"))
    }

    /// Expand environment variables and `~` in the storage path
    pub fn expand_paths(&mut self) -> Result<(), ConfigError> {
        self.storage = shellexpand::full(&self.storage)
            .map_err(|_| ConfigError::Expand(self.storage.clone()))?
            .into_owned();
        Ok(())
    }

    /// Let `GITHUB_API_URL` / `GITLAB_API_URL` override the file values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var("GITHUB_API_URL") {
            if !url.is_empty() {
                self.providers.github_api_url = url;
            }
        }
        if let Ok(url) = env::var("GITLAB_API_URL") {
            if !url.is_empty() {
                self.providers.gitlab_api_url = url;
            }
        }
    }

    /// Reject settings the core cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.sync.concurrency > Semaphore::MAX_PERMITS {
            return Err(ConfigError::ConcurrencyTooHigh {
                value: self.sync.concurrency,
                max: Semaphore::MAX_PERMITS,
            });
        }
        self.interval()?;
        Ok(())
    }

    pub fn storage_path(&self) -> PathBuf {
        PathBuf::from(&self.storage)
    }

    /// Bare mirror directory for a repository: `{storage}/{name}.git`
    pub fn mirror_dir(&self, name: &str) -> PathBuf {
        self.storage_path().join(format!("{}.git", name))
    }

    /// Working copy directory for a repository: `{storage}/{name}`
    pub fn checkout_dir(&self, name: &str) -> PathBuf {
        self.storage_path().join(name)
    }

    pub fn interval(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.sync.interval).map(Duration::from_secs)
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.git_timeout)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.http_timeout)
    }

    /// Whether mirrors are pushed to the destination provider
    pub fn pushes(&self) -> bool {
        !self.sync.backup_only
    }
}

/// Parse duration strings like "30s", "5m", "1h", "2d" or bare seconds
pub fn parse_duration(duration_str: &str) -> Result<u64, ConfigError> {
    let normalized = duration_str.trim().to_lowercase();
    let invalid = || ConfigError::InvalidDuration(duration_str.to_string());

    let (value, multiplier) = if let Some(value) = normalized.strip_suffix('s') {
        (value, 1)
    } else if let Some(value) = normalized.strip_suffix('m') {
        (value, 60)
    } else if let Some(value) = normalized.strip_suffix('h') {
        (value, 3600)
    } else if let Some(value) = normalized.strip_suffix('d') {
        (value, 86400)
    } else {
        (normalized.as_str(), 1)
    };

    value
        .trim()
        .parse::<u64>()
        .map_err(|_| invalid())?
        .checked_mul(multiplier)
        .ok_or_else(invalid)
}
