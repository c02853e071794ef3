//! svnfs binary
//!
//! Mounts a Subversion repository so that every revision is a directory.
//!
//! ## Usage
//!
//! ```bash
//! # Mount a remote repository
//! svnfs https://svn.example.org/repos/project ~/mnt/project
//!
//! # Mount a local repository, keeping fetched files in a fixed cache directory
//! svnfs --cache-dir ~/.cache/svnfs /srv/svn/project ~/mnt/project
//!
//! # Everything from ~/.config/svnfs/config.toml
//! svnfs
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use svnfs_kernel::{MaterializationCache, RevisionFs, SessionGuard, SvnCommandSession};
use svnfs_server::{ConfigLayer, SvnFs, mount};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Read-only filesystem over every revision of a Subversion repository.
#[derive(Debug, Parser)]
#[command(name = "svnfs", version)]
struct Args {
    /// Repository URL or local repository path
    repository: Option<String>,

    /// Directory to mount on
    mountpoint: Option<String>,

    /// Config file (default: ~/.config/svnfs/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory for fetched file contents (default: system temp dir)
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<String>,

    /// Give up waiting for the repository session after this long (0 waits forever)
    #[arg(long, value_name = "MS")]
    lock_timeout_ms: Option<u64>,

    /// Attribute cache lifetime in the kernel
    #[arg(long = "attr-ttl", value_name = "SECS")]
    attr_ttl: Option<u64>,

    /// svn client binary
    #[arg(long = "svn", value_name = "BINARY")]
    svn: Option<String>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn overrides(&self) -> ConfigLayer {
        ConfigLayer {
            repository: self.repository.clone(),
            mountpoint: self.mountpoint.clone(),
            cache_dir: self.cache_dir.clone(),
            lock_timeout_ms: self.lock_timeout_ms,
            attr_ttl_secs: self.attr_ttl,
            svn_binary: self.svn.clone(),
            fs_name: None,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let config = ConfigLayer::load(args.config.as_deref())?
        .merge(args.overrides())
        .resolve()?;

    tracing::info!(
        repository = %config.repository,
        mountpoint = %config.mountpoint.display(),
        "starting svnfs"
    );

    let session = SvnCommandSession::open(&config.repository, &config.svn_binary)
        .with_context(|| format!("could not open repository {}", config.repository))?;
    let guard = SessionGuard::new(session).with_timeout(config.lock_timeout);

    let cache = match &config.cache_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("could not create cache directory {}", dir.display()))?;
            MaterializationCache::new(dir)
        }
        None => MaterializationCache::in_temp_dir(),
    };
    tracing::debug!(cache_dir = %cache.cache_dir().display(), "materialization cache ready");

    let fs = SvnFs::new(Arc::new(RevisionFs::new(guard, cache)), config.attr_ttl);
    mount(fs, &config.mountpoint, &config.fs_name)
        .with_context(|| format!("could not mount on {}", config.mountpoint.display()))?;

    tracing::info!("unmounted");
    Ok(())
}
