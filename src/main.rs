use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use holocron::{
    Config, ConfigError, Credentials, GitCli, GitHubProvider, GitLabProvider, Provider,
    RepoSyncEngine, WatchLoop,
};

/// sysexits EX_CONFIG
const EXIT_CONFIG: u8 = 78;

#[derive(Parser)]
#[command(name = "holocron")]
#[command(about = "Mirror GitHub repositories to GitLab and/or local disk")]
#[command(version)]
struct Cli {
    /// Show what would be synced without touching disk or remotes
    #[arg(long)]
    dry_run: bool,

    /// Keep running and poll for changes
    #[arg(short, long)]
    watch: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Time between cycles in watch mode (e.g. 60s, 5m, 1h)
    #[arg(long)]
    interval: Option<String>,

    /// Only re-check existing mirrors pushed to in the last N minutes
    #[arg(long)]
    window: Option<u64>,

    /// Local storage root for mirrors
    #[arg(long)]
    storage: Option<String>,

    /// Maximum repositories synced at the same time
    #[arg(long)]
    concurrency: Option<usize>,

    /// Mirror locally only; GITLAB_TOKEN is not required
    #[arg(long)]
    backup_only: bool,

    /// Maintain a working copy next to each mirror
    #[arg(long)]
    checkout: bool,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Show author and license information
    #[arg(long)]
    credits: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if e.downcast_ref::<ConfigError>().is_some() {
                ExitCode::from(EXIT_CONFIG)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.credits {
        print_credits();
        return Ok(());
    }

    // a missing .env is fine
    dotenvy::dotenv().ok();

    let config = load_config(&cli)?;
    init_logging(&config);

    info!("Initializing Holocron v{}", env!("CARGO_PKG_VERSION"));
    if config.sync.dry_run {
        warn!("!!! DRY RUN MODE ACTIVE !!!");
    }

    let credentials = Credentials::from_env(config.sync.backup_only)?;
    let config = Arc::new(config);

    let source: Arc<dyn Provider> = Arc::new(
        GitHubProvider::new(
            &config.providers.github_api_url,
            &credentials.source_token,
            config.http_timeout(),
        )
        .context("Failed to create GitHub client")?,
    );

    let destination = match &credentials.destination_token {
        Some(token) => {
            let gitlab = GitLabProvider::new(
                &config.providers.gitlab_api_url,
                token,
                config.http_timeout(),
            )
            .context("Failed to create GitLab client")?;
            Some(Arc::new(gitlab) as Arc<dyn Provider>)
        }
        None => None,
    };

    let vcs = Arc::new(GitCli::new(config.git_timeout()));
    let interval = config.interval()?;
    let engine = Arc::new(RepoSyncEngine::new(
        Arc::clone(&config),
        Arc::clone(&source),
        destination,
        vcs,
    ));

    WatchLoop::new(engine, source, interval).run().await;

    Ok(())
}

/// Load the config file, then layer CLI flags and environment on top
fn load_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };

    config.sync.dry_run = cli.dry_run;
    config.sync.watch = cli.watch;
    config.sync.verbose = cli.verbose;
    config.sync.backup_only |= cli.backup_only;
    config.sync.checkout |= cli.checkout;

    if let Some(interval) = &cli.interval {
        config.sync.interval = interval.clone();
    }
    if let Some(window) = cli.window {
        config.sync.window = window;
    }
    if let Some(concurrency) = cli.concurrency {
        config.sync.concurrency = concurrency;
    }
    if let Some(storage) = &cli.storage {
        config.storage = storage.clone();
        config.expand_paths()?;
    }

    config.apply_env_overrides();
    config.validate()?;

    Ok(config)
}

/// Initialize logging; RUST_LOG wins over --verbose and the config level
fn init_logging(config: &Config) {
    let default_level = if config.sync.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn print_credits() {
    println!("Holocron: The Ultimate Git Mirroring Tool");
    println!("Author: {}", env!("CARGO_PKG_AUTHORS"));
    println!("License: {}", env!("CARGO_PKG_LICENSE"));
}
