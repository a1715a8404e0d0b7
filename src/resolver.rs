//! Metric resolution: cache, then upstream, then simulated fallback
//!
//! `MetricResolver::resolve` always answers for a known indicator. Upstream
//! failures and empty answers are logged and absorbed; the caller only sees
//! the difference through `ResolvedMetric::data_source`. Cache and metrics
//! writes are side effects and their failures never reach the caller either.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{
    cache_key, cache_ttl, metric_cache_key, CacheManager, CacheStore, MetricKey, MetricRecord,
    MetricsTable,
};
use crate::cli::Settings;
use crate::data::{
    headline_figure, normalize_region, Area, Catalog, DataPoint, DataSource, FallbackGenerator,
    Indicator, IndicatorLookupError, RegionError, ResolvedMetric, SotkanetClient, Trend,
    UpstreamClient, UpstreamError,
};

/// How many years before the requested one are tried when it has no data
pub const PRIOR_YEARS: i32 = 3;

/// Errors surfaced to callers of the resolver
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Indicator(#[from] IndicatorLookupError),

    #[error(transparent)]
    Region(#[from] RegionError),
}

/// A resolved metric plus how many upstream points backed it
#[derive(Debug, Clone)]
pub struct Resolution {
    pub metric: ResolvedMetric,
    /// Upstream points behind the value, or 1 for a fallback record
    pub records: usize,
    /// The value was read from the cache without calling upstream
    pub from_cache: bool,
}

/// Answers "what is indicator X for region R in year Y"
pub struct MetricResolver {
    catalog: Arc<Catalog>,
    upstream: Arc<dyn UpstreamClient>,
    cache: Arc<dyn CacheStore>,
    metrics: Arc<MetricsTable>,
    fallback: FallbackGenerator,
}

impl MetricResolver {
    pub fn new(
        catalog: Arc<Catalog>,
        upstream: Arc<dyn UpstreamClient>,
        cache: Arc<dyn CacheStore>,
        metrics: Arc<MetricsTable>,
    ) -> Self {
        let fallback = FallbackGenerator::new(catalog.clone());
        Self {
            catalog,
            upstream,
            cache,
            metrics,
            fallback,
        }
    }

    /// Wires the Sotkanet client, disk cache and metrics table described by `settings`
    pub fn from_settings(settings: &Settings) -> Result<Self, UpstreamError> {
        let upstream = SotkanetClient::new(settings.upstream_url.clone(), settings.timeout)?;
        let cache = CacheManager::with_dir(settings.cache_dir.clone());
        let metrics = MetricsTable::open(settings.cache_dir.clone());
        Ok(Self::new(
            Arc::new(Catalog::builtin()),
            Arc::new(upstream),
            Arc::new(cache),
            Arc::new(metrics),
        ))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn fallback(&self) -> &FallbackGenerator {
        &self.fallback
    }

    pub fn metrics(&self) -> &MetricsTable {
        &self.metrics
    }

    /// Resolves one indicator. Only unknown indicators and invalid regions fail.
    ///
    /// # Arguments
    /// * `indicator` - Catalog key, `area.key` or Sotkanet id
    /// * `region` - Sotkanet region id or a known alias
    /// * `year` - Statistics year; up to `PRIOR_YEARS` earlier years are tried
    ///
    /// # Returns
    /// * `Ok(ResolvedMetric)` tagged `upstream` or `fallback`
    /// * `Err(ResolveError)` for unknown or ambiguous indicators and invalid regions
    pub async fn resolve(
        &self,
        indicator: &str,
        region: &str,
        year: i32,
    ) -> Result<ResolvedMetric, ResolveError> {
        Ok(self.resolve_detailed(indicator, region, year).await?.metric)
    }

    /// Like `resolve`, also reporting how the value was obtained
    pub async fn resolve_detailed(
        &self,
        indicator: &str,
        region: &str,
        year: i32,
    ) -> Result<Resolution, ResolveError> {
        let indicator = self.catalog.lookup(indicator)?.clone();
        let region = normalize_region(region)?;
        Ok(self.resolve_indicator(&indicator, &region, year).await)
    }

    /// Resolves every indicator of one subject area, in catalog order
    pub async fn resolve_area(
        &self,
        area: Area,
        region: &str,
        year: i32,
    ) -> Result<Vec<ResolvedMetric>, ResolveError> {
        let region = normalize_region(region)?;
        let indicators: Vec<Indicator> = self.catalog.in_area(area).cloned().collect();

        let mut metrics = Vec::with_capacity(indicators.len());
        for indicator in &indicators {
            metrics.push(self.resolve_indicator(indicator, &region, year).await.metric);
        }
        Ok(metrics)
    }

    /// Resolution for an indicator already known to be in the catalog
    pub(crate) async fn resolve_indicator(
        &self,
        indicator: &Indicator,
        region: &str,
        year: i32,
    ) -> Resolution {
        let key = metric_cache_key(indicator.id, region, year);

        if let Some(entry) = self.cache.get(&key) {
            match serde_json::from_value::<Vec<DataPoint>>(entry.payload) {
                Ok(points) => {
                    if let Some(value) = headline_figure(&points) {
                        debug!(indicator = indicator.id, region, year, "serving metric from cache");
                        let data_year = points.first().map(|p| p.year);
                        let mut metric = self.assemble(
                            indicator,
                            region,
                            year,
                            value,
                            DataSource::Upstream,
                            data_year,
                        );
                        metric.last_updated = entry.cached_at;
                        return Resolution {
                            metric,
                            records: points.len(),
                            from_cache: true,
                        };
                    }
                }
                Err(e) => warn!(
                    indicator = indicator.id,
                    region,
                    year,
                    error = %e,
                    "ignoring unreadable cache entry"
                ),
            }
        }

        // Saturates near i32::MIN
        let earliest = year.saturating_sub(PRIOR_YEARS);
        for attempt_year in (earliest..=year).rev() {
            match self.upstream.fetch_indicator(indicator.id, region, attempt_year).await {
                Ok(points) => match headline_figure(&points) {
                    Some(value) => {
                        info!(
                            indicator = indicator.id,
                            region,
                            year,
                            data_year = attempt_year,
                            points = points.len(),
                            "resolved metric from upstream"
                        );
                        self.store_points(&key, &points);
                        self.record(indicator, region, attempt_year, value, DataSource::Upstream);
                        return Resolution {
                            metric: self.assemble(
                                indicator,
                                region,
                                year,
                                value,
                                DataSource::Upstream,
                                Some(attempt_year),
                            ),
                            records: points.len(),
                            from_cache: false,
                        };
                    }
                    None => debug!(
                        indicator = indicator.id,
                        region,
                        year = attempt_year,
                        "upstream has no data"
                    ),
                },
                Err(e) => warn!(
                    indicator = indicator.id,
                    region,
                    year = attempt_year,
                    error = %e,
                    "upstream unavailable"
                ),
            }
        }

        let value = FallbackGenerator::baseline(indicator);
        warn!(
            indicator = indicator.id,
            region,
            year,
            value,
            "no upstream data, using simulated value"
        );
        self.record(indicator, region, year, value, DataSource::Fallback);
        Resolution {
            metric: self.assemble(indicator, region, year, value, DataSource::Fallback, None),
            records: 1,
            from_cache: false,
        }
    }

    /// Raw data points for one indicator, cache-aside.
    ///
    /// Unlike `resolve` this does not fall back: upstream errors are returned.
    /// An empty answer is cached like any other.
    pub async fn indicator_data(
        &self,
        indicator_id: u32,
        region: &str,
        year: i32,
    ) -> Result<Vec<DataPoint>, DataError> {
        let region = normalize_region(region)?;
        let key = cache_key(indicator_id, &region, year);

        if let Some(points) = self.cached_points(&key) {
            debug!(
                indicator = indicator_id,
                region = %region,
                year,
                "serving data points from cache"
            );
            return Ok(points);
        }

        let points = self.upstream.fetch_indicator(indicator_id, &region, year).await?;
        self.store_points(&key, &points);
        self.record_points(indicator_id, &region, year, &points);
        Ok(points)
    }

    /// Raw data points for several indicators in one upstream call.
    ///
    /// Cached indicators are not re-fetched. If the upstream call fails the
    /// uncached indicators map to empty lists.
    pub async fn multiple_data(
        &self,
        indicator_ids: &[u32],
        region: &str,
        year: i32,
    ) -> Result<BTreeMap<u32, Vec<DataPoint>>, RegionError> {
        let region = normalize_region(region)?;
        let mut results = BTreeMap::new();
        let mut missing = Vec::new();

        for &id in indicator_ids {
            match self.cached_points(&cache_key(id, &region, year)) {
                Some(points) => {
                    results.insert(id, points);
                }
                None => missing.push(id),
            }
        }

        if missing.is_empty() {
            return Ok(results);
        }

        let fetched = self.upstream.fetch_multiple(&missing, &region, year).await;
        match fetched {
            Ok(grouped) => {
                for id in missing {
                    let points = grouped.get(&id).cloned().unwrap_or_default();
                    self.store_points(&cache_key(id, &region, year), &points);
                    self.record_points(id, &region, year, &points);
                    results.insert(id, points);
                }
            }
            Err(e) => {
                warn!(
                    indicators = ?missing,
                    region = %region,
                    year,
                    error = %e,
                    "upstream unavailable for multiple indicators"
                );
                for id in missing {
                    results.insert(id, Vec::new());
                }
            }
        }
        Ok(results)
    }

    fn cached_points(&self, key: &str) -> Option<Vec<DataPoint>> {
        let entry = self.cache.get(key)?;
        serde_json::from_value(entry.payload).ok()
    }

    fn store_points(&self, key: &str, points: &[DataPoint]) {
        let payload = match serde_json::to_value(points) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key, error = %e, "failed to encode cache payload");
                return;
            }
        };
        if let Err(e) = self.cache.put(key, &payload, cache_ttl()) {
            warn!(key, error = %e, "cache write failed");
        }
    }

    fn record(
        &self,
        indicator: &Indicator,
        region: &str,
        year: i32,
        value: f64,
        source: DataSource,
    ) {
        let record = MetricRecord {
            key: MetricKey {
                indicator_id: indicator.id,
                region: region.to_string(),
                year,
                gender: "total".to_string(),
            },
            value,
            absolute_value: value,
            data_source: source,
            last_updated: Utc::now(),
        };
        if let Err(e) = self.metrics.upsert(record) {
            warn!(indicator = indicator.id, region, year, error = %e, "metric write failed");
        }
    }

    /// Records every point of a catalog indicator, one row per gender
    fn record_points(&self, indicator_id: u32, region: &str, year: i32, points: &[DataPoint]) {
        if self.catalog.by_id(indicator_id).is_none() {
            return;
        }
        for point in points {
            let (Some(value), Some(absolute)) =
                (point.value.or(point.absolute_value), point.figure())
            else {
                continue;
            };
            let record = MetricRecord {
                key: MetricKey {
                    indicator_id,
                    region: region.to_string(),
                    year,
                    gender: point.gender_or_total().to_string(),
                },
                value,
                absolute_value: absolute,
                data_source: DataSource::Upstream,
                last_updated: Utc::now(),
            };
            if let Err(e) = self.metrics.upsert(record) {
                warn!(indicator = indicator_id, region, year, error = %e, "metric write failed");
            }
        }
    }

    fn assemble(
        &self,
        indicator: &Indicator,
        region: &str,
        year: i32,
        value: f64,
        source: DataSource,
        data_year: Option<i32>,
    ) -> ResolvedMetric {
        ResolvedMetric {
            key: indicator.key.clone(),
            indicator_id: indicator.id,
            area: indicator.area,
            region: region.to_string(),
            year,
            value,
            target: indicator.target,
            trend: Trend::from_values(value, indicator.target),
            unit: indicator.unit.clone(),
            data_source: source,
            data_year,
            last_updated: Utc::now(),
        }
    }
}

/// Errors of the raw data pass-through
#[derive(Debug, Error)]
pub enum DataError {
    #[error(transparent)]
    Region(#[from] RegionError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}
