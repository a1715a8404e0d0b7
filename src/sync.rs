//! Catalog-wide synchronization
//!
//! `SyncJob::sync_all` resolves every catalog indicator one after another and
//! reports a per-indicator outcome. One indicator failing never stops the
//! rest. `SyncScheduler` optionally repeats the job on a fixed interval.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::data::{normalize_region, DataSource};
use crate::resolver::MetricResolver;

/// Outcome of syncing one indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Real data was fetched or already cached
    Synced,
    /// No real data; a simulated value was recorded instead
    FallbackCreated,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSyncResult {
    /// Qualified catalog key, `area.key`
    pub indicator: String,
    /// Sotkanet indicator id
    pub indicator_id: u32,
    pub status: SyncStatus,
    /// Upstream points behind the value, 1 for a fallback, 0 on error
    pub records: usize,
    /// Resolved value, absent on error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Why the indicator could not be synced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of one sync run
///
/// `synced_count` counts fallback creations as synced; `fallback_count`
/// tells how many of those were simulated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Canonical region id, or the rejected input when it was invalid
    pub region: String,
    /// Year that was synced
    pub year: i32,
    /// Catalog size
    pub total_indicators: usize,
    /// Indicators that ended `synced` or `fallback_created`
    pub synced_count: usize,
    /// Indicators that ended `fallback_created`
    pub fallback_count: usize,
    /// One entry per catalog indicator, in catalog order
    pub results: Vec<IndicatorSyncResult>,
    /// When the run finished
    pub timestamp: DateTime<Utc>,
}

pub struct SyncJob {
    resolver: Arc<MetricResolver>,
}

impl SyncJob {
    pub fn new(resolver: Arc<MetricResolver>) -> Self {
        Self { resolver }
    }

    /// Resolves every catalog indicator for `region` and `year`, sequentially
    ///
    /// # Arguments
    /// * `region` - Sotkanet region id or a known alias
    /// * `year` - Statistics year handed to the resolver
    ///
    /// # Returns
    /// A summary with one result per indicator. An invalid region marks
    /// every indicator `error` instead of failing the run.
    pub async fn sync_all(&self, region: &str, year: i32) -> SyncSummary {
        let indicators = self.resolver.catalog().all().to_vec();
        let mut results = Vec::with_capacity(indicators.len());

        let region = match normalize_region(region) {
            Ok(region) => region,
            Err(e) => {
                warn!(region, error = %e, "sync requested for invalid region");
                let results = indicators
                    .iter()
                    .map(|indicator| IndicatorSyncResult {
                        indicator: indicator.qualified_key(),
                        indicator_id: indicator.id,
                        status: SyncStatus::Error,
                        records: 0,
                        value: None,
                        error: Some(e.to_string()),
                    })
                    .collect();
                return summarize(region.to_string(), year, results);
            }
        };

        for indicator in &indicators {
            let resolution = self.resolver.resolve_indicator(indicator, &region, year).await;
            let status = match resolution.metric.data_source {
                DataSource::Upstream => SyncStatus::Synced,
                DataSource::Fallback => SyncStatus::FallbackCreated,
            };
            results.push(IndicatorSyncResult {
                indicator: indicator.qualified_key(),
                indicator_id: indicator.id,
                status,
                records: resolution.records,
                value: Some(resolution.metric.value),
                error: None,
            });
        }

        let summary = summarize(region, year, results);
        info!(
            region = %summary.region,
            year,
            total = summary.total_indicators,
            synced = summary.synced_count,
            fallback = summary.fallback_count,
            "sync finished"
        );
        summary
    }
}

fn summarize(region: String, year: i32, results: Vec<IndicatorSyncResult>) -> SyncSummary {
    let synced_count = results
        .iter()
        .filter(|r| matches!(r.status, SyncStatus::Synced | SyncStatus::FallbackCreated))
        .count();
    let fallback_count = results
        .iter()
        .filter(|r| r.status == SyncStatus::FallbackCreated)
        .count();

    SyncSummary {
        region,
        year,
        total_indicators: results.len(),
        synced_count,
        fallback_count,
        results,
        timestamp: Utc::now(),
    }
}

/// Configuration for periodic syncing
#[derive(Debug, Clone)]
pub struct SyncSchedule {
    /// Time between runs; the first run happens after one interval
    pub interval: Duration,
    /// Region passed to every run
    pub region: String,
    /// Fixed year, or `None` to use the previous calendar year at each run
    pub year: Option<i32>,
}

/// Handle for the background sync task
pub struct SyncScheduler {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SyncScheduler {
    /// Spawns a task running `job` every `schedule.interval`, first run after one interval
    pub fn spawn(job: Arc<SyncJob>, schedule: SyncSchedule) -> Self {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(schedule.interval);
            // Skip the first tick (immediate)
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let year = schedule.year.unwrap_or_else(crate::cli::default_year);
                        job.sync_all(&schedule.region, year).await;
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self { shutdown_tx, task }
    }

    /// Stops the loop and waits for an in-flight run to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
    }
}
