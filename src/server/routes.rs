//! Route handlers

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{ApiError, ApiResult, AppState};
use crate::cli::default_year;
use crate::data::region::all_regions;
use crate::data::{Area, DataPoint, Indicator, Region, ResolvedMetric};
use crate::sync::SyncSummary;

/// Upper bound for `/trend` series length
const MAX_TREND_POINTS: usize = 60;

const MONTHS: [&str; 12] = [
    "Tam", "Hel", "Maa", "Huh", "Tou", "Kes", "Hei", "Elo", "Syy", "Lok", "Mar", "Jou",
];

#[derive(Debug, Deserialize)]
pub struct DataQuery {
    pub region: Option<String>,
    pub year: Option<i32>,
    pub gender: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MultipleQuery {
    pub indicators: Option<String>,
    pub region: Option<String>,
    pub year: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    pub points: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncRequest {
    pub region: Option<String>,
    pub year: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct TrendPoint {
    pub month: &'static str,
    pub value: f64,
}

#[derive(Debug, Serialize)]
pub struct TrendResponse {
    pub indicator: String,
    pub baseline: f64,
    pub target: f64,
    pub points: Vec<TrendPoint>,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        service: "kpiboard",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
    })
}

pub async fn indicators(State(state): State<AppState>) -> Json<Vec<Indicator>> {
    Json(state.resolver.catalog().all().to_vec())
}

pub async fn regions() -> Json<&'static [Region]> {
    Json(all_regions())
}

pub async fn indicator_data(
    State(state): State<AppState>,
    Path(indicator): Path<String>,
    Query(query): Query<DataQuery>,
) -> ApiResult<Json<Vec<DataPoint>>> {
    let id = indicator_id(&state, &indicator)?;
    let region = query.region.unwrap_or_else(|| state.default_region.clone());
    let year = query.year.unwrap_or_else(default_year);

    let mut points = state.resolver.indicator_data(id, &region, year).await?;
    if let Some(gender) = query.gender {
        points.retain(|p| p.gender_or_total() == gender);
    }
    Ok(Json(points))
}

pub async fn multiple(
    State(state): State<AppState>,
    Query(query): Query<MultipleQuery>,
) -> ApiResult<Json<BTreeMap<u32, Vec<DataPoint>>>> {
    let list = query
        .indicators
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::InvalidInput("indicators parameter is required".to_string()))?;

    let ids = list
        .split(',')
        .map(|item| indicator_id(&state, item))
        .collect::<ApiResult<Vec<u32>>>()?;

    let region = query.region.unwrap_or_else(|| state.default_region.clone());
    let year = query.year.unwrap_or_else(default_year);

    Ok(Json(state.resolver.multiple_data(&ids, &region, year).await?))
}

pub async fn metric(
    State(state): State<AppState>,
    Path(indicator): Path<String>,
    Query(query): Query<DataQuery>,
) -> ApiResult<Json<ResolvedMetric>> {
    let region = query.region.unwrap_or_else(|| state.default_region.clone());
    let year = query.year.unwrap_or_else(default_year);
    Ok(Json(state.resolver.resolve(&indicator, &region, year).await?))
}

pub async fn area(
    State(state): State<AppState>,
    Path(area): Path<String>,
    Query(query): Query<DataQuery>,
) -> ApiResult<Json<Vec<ResolvedMetric>>> {
    let area = Area::from_str(&area)
        .ok_or_else(|| ApiError::InvalidInput(format!("unknown area '{}'", area)))?;
    let region = query.region.unwrap_or_else(|| state.default_region.clone());
    let year = query.year.unwrap_or_else(default_year);
    Ok(Json(state.resolver.resolve_area(area, &region, year).await?))
}

pub async fn trend(
    State(state): State<AppState>,
    Path(indicator): Path<String>,
    Query(query): Query<TrendQuery>,
) -> ApiResult<Json<TrendResponse>> {
    let found = state.resolver.catalog().lookup(&indicator)?.clone();
    let count = query.points.unwrap_or(MONTHS.len()).min(MAX_TREND_POINTS);

    let values = state.resolver.fallback().series(&found.qualified_key(), count);
    let points = values
        .into_iter()
        .enumerate()
        .map(|(i, value)| TrendPoint {
            month: MONTHS[i % MONTHS.len()],
            value,
        })
        .collect();

    Ok(Json(TrendResponse {
        indicator: found.qualified_key(),
        baseline: found.fallback,
        target: found.target,
        points,
    }))
}

pub async fn sync(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<SyncSummary>> {
    let request = sync_request(&headers, &body)?;
    let region = request.region.unwrap_or_else(|| state.default_region.clone());
    let year = request.year.unwrap_or_else(default_year);
    Ok(Json(state.sync.sync_all(&region, year).await))
}

/// An empty body means defaults; anything else must be a JSON `SyncRequest`
fn sync_request(headers: &HeaderMap, body: &[u8]) -> ApiResult<SyncRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(SyncRequest::default());
    }

    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_ascii_lowercase().starts_with("application/json"))
        .unwrap_or(false);
    if !is_json {
        return Err(ApiError::InvalidInput(
            "sync body must be sent as application/json".to_string(),
        ));
    }

    serde_json::from_slice(body)
        .map_err(|e| ApiError::InvalidInput(format!("invalid sync request: {}", e)))
}

/// Accepts a Sotkanet id as-is, or maps a catalog reference to its id
fn indicator_id(state: &AppState, reference: &str) -> ApiResult<u32> {
    let reference = reference.trim();
    if let Ok(id) = reference.parse::<u32>() {
        return Ok(id);
    }
    Ok(state.resolver.catalog().lookup(reference)?.id)
}
