//! Core data models for kpiboard
//!
//! Wire shapes from the Sotkanet statistics API, the static indicator
//! catalog and region table, the simulated fallback values and the resolved
//! metric handed to dashboard clients.

pub mod catalog;
pub mod fallback;
pub mod region;
pub mod sotkanet;

pub use catalog::{Area, Catalog, Indicator, IndicatorLookupError};
pub use fallback::FallbackGenerator;
pub use region::{normalize_region, Region, RegionError, DEFAULT_REGION};
pub use sotkanet::{SotkanetClient, UpstreamClient, UpstreamError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observation returned by the statistics API
///
/// Only `value` and `absoluteValue` are interpreted; every other field is
/// passed through to clients untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Sotkanet indicator id
    pub indicator: u32,
    /// Statistics year of the observation
    pub year: i32,
    /// Region id as sent by the API (a number in practice)
    #[serde(default)]
    pub region: serde_json::Value,
    /// Relative figure, e.g. a percentage or a rate per 1000 residents
    #[serde(default)]
    pub value: Option<f64>,
    /// Absolute figure, when the API provides one
    #[serde(rename = "absoluteValue", default, skip_serializing_if = "Option::is_none")]
    pub absolute_value: Option<f64>,
    /// `total`, `male` or `female`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    /// Any other fields, kept for pass-through
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DataPoint {
    /// The figure shown on the dashboard: `absoluteValue`, else `value`
    pub fn figure(&self) -> Option<f64> {
        self.absolute_value.or(self.value)
    }

    /// Gender label, `total` when the API left it out
    pub fn gender_or_total(&self) -> &str {
        self.gender.as_deref().unwrap_or("total")
    }
}

/// Picks the figure for a resolved metric: the first `total` point with a
/// number, else the first point with a number at all.
pub fn headline_figure(points: &[DataPoint]) -> Option<f64> {
    points
        .iter()
        .filter(|p| p.gender_or_total() == "total")
        .find_map(DataPoint::figure)
        .or_else(|| points.iter().find_map(DataPoint::figure))
}

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Real data from the statistics API (fresh or cached)
    Upstream,
    /// Simulated stand-in value
    Fallback,
}

/// Direction of a metric relative to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    /// At or above target
    Up,
    /// Below target
    Down,
}

impl Trend {
    /// `Up` when the value meets or beats the target
    pub fn from_values(value: f64, target: f64) -> Self {
        if value >= target {
            Trend::Up
        } else {
            Trend::Down
        }
    }
}

/// A metric as served to dashboard cards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMetric {
    /// Catalog key, e.g. `hoitotakuu`
    pub key: String,
    /// Sotkanet indicator id
    pub indicator_id: u32,
    /// Subject area the indicator belongs to
    pub area: Area,
    /// Canonical numeric region id
    pub region: String,
    /// Year that was asked for
    pub year: i32,
    /// Headline figure, real or simulated
    pub value: f64,
    /// Target from the catalog; the API has no notion of targets
    pub target: f64,
    /// `up` when `value >= target`
    pub trend: Trend,
    /// Display unit, e.g. `%`
    pub unit: String,
    /// Whether `value` is real or simulated
    pub data_source: DataSource,
    /// Year the upstream figure belongs to; may precede `year`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_year: Option<i32>,
    /// When the value was fetched (cache time for cached values)
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point(value: Option<f64>, absolute: Option<f64>, gender: Option<&str>) -> DataPoint {
        DataPoint {
            indicator: 2230,
            year: 2023,
            region: json!(974),
            value,
            absolute_value: absolute,
            gender: gender.map(str::to_string),
            extra: Default::default(),
        }
    }

    #[test]
    fn test_figure_prefers_absolute_value() {
        assert_eq!(point(Some(12.5), Some(91.0), None).figure(), Some(91.0));
        assert_eq!(point(Some(12.5), None, None).figure(), Some(12.5));
        assert_eq!(point(None, None, None).figure(), None);
    }

    #[test]
    fn test_headline_figure_prefers_total_gender() {
        let points = vec![
            point(Some(80.0), None, Some("male")),
            point(Some(91.0), None, Some("total")),
        ];
        assert_eq!(headline_figure(&points), Some(91.0));
    }

    #[test]
    fn test_headline_figure_falls_back_to_any_gender() {
        let points = vec![point(None, None, Some("total")), point(Some(7.0), None, Some("female"))];
        assert_eq!(headline_figure(&points), Some(7.0));
        assert_eq!(headline_figure(&[]), None);
    }

    #[test]
    fn test_trend_boundary_is_up() {
        assert_eq!(Trend::from_values(95.0, 95.0), Trend::Up);
        assert_eq!(Trend::from_values(96.0, 95.0), Trend::Up);
        assert_eq!(Trend::from_values(94.9, 95.0), Trend::Down);
    }

    #[test]
    fn test_data_point_keeps_unknown_fields() {
        let raw = json!({
            "indicator": 2230,
            "year": 2023,
            "region": 974,
            "value": 91.0,
            "absoluteValue": 91.0,
            "gender": "total",
            "flag": "estimate"
        });
        let parsed: DataPoint = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(parsed.extra.get("flag"), Some(&json!("estimate")));
        assert_eq!(serde_json::to_value(&parsed).unwrap(), raw);
    }

    #[test]
    fn test_resolved_metric_serializes_camel_case() {
        let metric = ResolvedMetric {
            key: "hoitotakuu".to_string(),
            indicator_id: 2230,
            area: Area::Avoterveydenhuolto,
            region: "974".to_string(),
            year: 2023,
            value: 91.0,
            target: 95.0,
            trend: Trend::Down,
            unit: "%".to_string(),
            data_source: DataSource::Upstream,
            data_year: Some(2023),
            last_updated: Utc::now(),
        };
        let json = serde_json::to_value(&metric).unwrap();
        assert_eq!(json["dataSource"], "upstream");
        assert_eq!(json["trend"], "down");
        assert_eq!(json["indicatorId"], 2230);
        assert!(json.get("lastUpdated").is_some());
    }
}
