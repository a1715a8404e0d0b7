//! kpiboard - caching Sotkanet proxy for the healthcare KPI dashboard
//!
//! `serve` runs the HTTP API, `sync` and `resolve` run one job and print
//! the result as JSON.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use kpiboard::cli::{default_year, Cli, Command, Settings};
use kpiboard::resolver::MetricResolver;
use kpiboard::server::{self, AppState};
use kpiboard::sync::{SyncJob, SyncSchedule};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("kpiboard: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_args(&cli.global)?;
    kpiboard::logging::init(settings.log_json)?;

    let resolver = Arc::new(MetricResolver::from_settings(&settings)?);

    match cli.command {
        Command::Serve {
            bind,
            sync_interval_mins,
        } => {
            let schedule = (sync_interval_mins > 0).then(|| SyncSchedule {
                interval: Duration::from_secs(sync_interval_mins * 60),
                region: settings.region.clone(),
                year: None,
            });
            let state = AppState::new(resolver, settings.region.clone());
            server::serve(state, bind, schedule).await?;
        }
        Command::Sync { year } => {
            let job = SyncJob::new(resolver);
            let summary = job
                .sync_all(&settings.region, year.unwrap_or_else(default_year))
                .await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Resolve { indicator, year } => {
            let metric = resolver
                .resolve(&indicator, &settings.region, year.unwrap_or_else(default_year))
                .await?;
            println!("{}", serde_json::to_string_pretty(&metric)?);
        }
    }

    Ok(())
}
