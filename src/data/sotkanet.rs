//! Sotkanet statistics API client
//!
//! Issues `GET {base}/json?indicator=..&years=..&regions=..&genders=total`
//! and validates that the body is a JSON array of data points. Every failure
//! (timeout, non-2xx status, transport error, unexpected body) is an
//! `UpstreamError`; retrying is left to the caller.

use async_trait::async_trait;
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use super::DataPoint;

/// Default base URL of the Sotkanet REST API
pub const SOTKANET_BASE_URL: &str = "https://sotkanet.fi/rest/1.1";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// The statistics API could not provide data
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// No response within the configured timeout
    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),

    /// Upstream answered with a non-2xx status
    #[error("upstream returned HTTP {0}")]
    Status(u16),

    /// Connection or protocol failure
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Body was not an array of data points
    #[error("unexpected upstream payload: {0}")]
    InvalidShape(String),
}

/// Source of indicator data points
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Data points for one indicator, region and year
    async fn fetch_indicator(
        &self,
        indicator_id: u32,
        region: &str,
        year: i32,
    ) -> Result<Vec<DataPoint>, UpstreamError>;

    /// Data points for several indicators, grouped by indicator id.
    ///
    /// Every requested id is present in the result, possibly with no points.
    async fn fetch_multiple(
        &self,
        indicator_ids: &[u32],
        region: &str,
        year: i32,
    ) -> Result<BTreeMap<u32, Vec<DataPoint>>, UpstreamError> {
        let mut grouped = BTreeMap::new();
        for &id in indicator_ids {
            grouped.insert(id, self.fetch_indicator(id, region, year).await?);
        }
        Ok(grouped)
    }
}

/// Client for the Sotkanet REST API
#[derive(Debug, Clone)]
pub struct SotkanetClient {
    http_client: Client,
    base_url: String,
    timeout: Duration,
}

impl SotkanetClient {
    /// Creates a client against `base_url` with a per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_points(
        &self,
        indicator_param: &str,
        region: &str,
        year: i32,
    ) -> Result<Vec<DataPoint>, UpstreamError> {
        let url = format!("{}/json", self.base_url);
        let year = year.to_string();

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("indicator", indicator_param),
                ("years", year.as_str()),
                ("regions", region),
                ("genders", "total"),
            ])
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let text = response.text().await.map_err(|e| self.classify(e))?;
        parse_data_points(&text)
    }

    fn classify(&self, error: reqwest::Error) -> UpstreamError {
        if error.is_timeout() {
            UpstreamError::Timeout(self.timeout)
        } else {
            UpstreamError::Transport(error)
        }
    }
}

#[async_trait]
impl UpstreamClient for SotkanetClient {
    async fn fetch_indicator(
        &self,
        indicator_id: u32,
        region: &str,
        year: i32,
    ) -> Result<Vec<DataPoint>, UpstreamError> {
        self.get_points(&indicator_id.to_string(), region, year).await
    }

    async fn fetch_multiple(
        &self,
        indicator_ids: &[u32],
        region: &str,
        year: i32,
    ) -> Result<BTreeMap<u32, Vec<DataPoint>>, UpstreamError> {
        let param = indicator_ids
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let points = self.get_points(&param, region, year).await?;
        Ok(group_by_indicator(indicator_ids, points))
    }
}

/// Parses an upstream body, insisting on an array of data points
pub fn parse_data_points(body: &str) -> Result<Vec<DataPoint>, UpstreamError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| UpstreamError::InvalidShape(format!("body is not JSON: {}", e)))?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        other => {
            return Err(UpstreamError::InvalidShape(format!(
                "expected a JSON array, got {}",
                json_kind(&other)
            )))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value(item)
                .map_err(|e| UpstreamError::InvalidShape(format!("element {}: {}", i, e)))
        })
        .collect()
}

/// Splits a combined response by indicator.
///
/// Every requested id gets an entry, empty if upstream sent nothing for it.
/// Points for ids that were not requested are dropped.
pub fn group_by_indicator(
    indicator_ids: &[u32],
    points: Vec<DataPoint>,
) -> BTreeMap<u32, Vec<DataPoint>> {
    let mut grouped: BTreeMap<u32, Vec<DataPoint>> =
        indicator_ids.iter().map(|&id| (id, Vec::new())).collect();
    for point in points {
        if let Some(bucket) = grouped.get_mut(&point.indicator) {
            bucket.push(point);
        }
    }
    grouped
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
