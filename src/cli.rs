//! Command-line interface parsing for kpiboard
//!
//! Every option can also be given through a `KPIBOARD_*` environment
//! variable. `Settings` is the validated configuration shared by all
//! subcommands.

use chrono::{Datelike, Utc};
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::data::sotkanet::SOTKANET_BASE_URL;
use crate::data::{normalize_region, RegionError, DEFAULT_REGION};

/// Accepted upstream timeout range in seconds
const MIN_TIMEOUT_SECS: u64 = 10;
const MAX_TIMEOUT_SECS: u64 = 15;

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid timeout: {0}s. Expected 10-15 seconds")]
    InvalidTimeout(u64),

    #[error(transparent)]
    InvalidRegion(#[from] RegionError),

    #[error("No cache directory available; pass --cache-dir")]
    NoCacheDir,
}

/// kpiboard - cached Sotkanet indicators for the healthcare KPI dashboard
#[derive(Parser, Debug)]
#[command(name = "kpiboard")]
#[command(about = "Caching Sotkanet proxy for the healthcare KPI dashboard")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Base URL of the Sotkanet REST API
    #[arg(long, env = "KPIBOARD_UPSTREAM_URL", default_value = SOTKANET_BASE_URL, global = true)]
    pub upstream_url: String,

    /// Directory for cached payloads and the metrics table
    #[arg(long, env = "KPIBOARD_CACHE_DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Upstream request timeout in seconds (10-15)
    #[arg(long, env = "KPIBOARD_TIMEOUT_SECS", default_value_t = 10, global = true)]
    pub timeout_secs: u64,

    /// Default region (Sotkanet numeric id or known alias such as HVA16)
    #[arg(long, env = "KPIBOARD_REGION", default_value = DEFAULT_REGION, global = true)]
    pub region: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "KPIBOARD_LOG_JSON", global = true)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP API
    Serve {
        /// Address to listen on
        #[arg(long, env = "KPIBOARD_BIND", default_value = "127.0.0.1:3001")]
        bind: SocketAddr,

        /// Minutes between background syncs; 0 disables them
        #[arg(long, env = "KPIBOARD_SYNC_INTERVAL_MINS", default_value_t = 0)]
        sync_interval_mins: u64,
    },
    /// Resolve every catalog indicator once and print the summary
    Sync {
        /// Statistics year (defaults to last year)
        #[arg(long)]
        year: Option<i32>,
    },
    /// Resolve one indicator and print it
    Resolve {
        /// Indicator key, area.key or Sotkanet id
        indicator: String,

        /// Statistics year (defaults to last year)
        #[arg(long)]
        year: Option<i32>,
    },
}

/// Validated configuration derived from the global arguments
#[derive(Debug, Clone)]
pub struct Settings {
    /// Sotkanet REST base URL
    pub upstream_url: String,
    /// Holds cache files and `metrics.json`
    pub cache_dir: PathBuf,
    /// Per-request upstream timeout, 10-15 s
    pub timeout: Duration,
    /// Canonical default region id
    pub region: String,
    /// Emit JSON log lines
    pub log_json: bool,
}

impl Settings {
    /// Validates global arguments.
    ///
    /// Without `--cache-dir` the XDG cache directory is used.
    pub fn from_args(args: &GlobalArgs) -> Result<Self, CliError> {
        if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&args.timeout_secs) {
            return Err(CliError::InvalidTimeout(args.timeout_secs));
        }

        let cache_dir = match &args.cache_dir {
            Some(dir) => dir.clone(),
            None => crate::cache::CacheManager::new()
                .map(|cache| cache.dir().to_path_buf())
                .ok_or(CliError::NoCacheDir)?,
        };

        Ok(Settings {
            upstream_url: args.upstream_url.clone(),
            cache_dir,
            timeout: Duration::from_secs(args.timeout_secs),
            region: normalize_region(&args.region)?,
            log_json: args.log_json,
        })
    }
}

/// Year used when a request names none: the last full calendar year
pub fn default_year() -> i32 {
    Utc::now().year() - 1
}
