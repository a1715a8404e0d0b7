//! HTTP API tests against a local stand-in for the Sotkanet API

use axum::{
    body::{to_bytes, Body},
    extract::{Query, State},
    http::{Request, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

use kpiboard::cache::{MemoryCache, MetricsTable};
use kpiboard::data::sotkanet::DEFAULT_TIMEOUT;
use kpiboard::data::{Catalog, SotkanetClient};
use kpiboard::resolver::MetricResolver;
use kpiboard::server::{create_router, AppState};

/// Fake upstream: indicator 2230 has 91 for 2023, 1820 has 2900 for 2023,
/// indicator 666 answers with an object instead of an array.
#[derive(Clone, Default)]
struct Upstream {
    hits: Arc<AtomicUsize>,
}

async fn fake_sotkanet(
    State(upstream): State<Upstream>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    upstream.hits.fetch_add(1, Ordering::SeqCst);
    assert_eq!(params.get("genders").map(String::as_str), Some("total"));

    let year: i32 = params.get("years").and_then(|y| y.parse().ok()).unwrap_or(0);
    let region = params.get("regions").cloned().unwrap_or_default();
    let indicators = params.get("indicator").cloned().unwrap_or_default();

    if indicators == "666" {
        return Json(json!({"error": "unknown indicator"}));
    }

    let points: Vec<Value> = indicators
        .split(',')
        .filter_map(|id| match (id, year) {
            ("2230", 2023) => Some(json!({
                "indicator": 2230, "year": 2023, "region": region.parse::<u32>().unwrap_or(0),
                "value": 91.0, "absoluteValue": 91.0, "gender": "total"
            })),
            ("1820", 2023) => Some(json!({
                "indicator": 1820, "year": 2023, "region": region.parse::<u32>().unwrap_or(0),
                "value": 2900.0, "gender": "total"
            })),
            _ => None,
        })
        .collect();
    Json(Value::Array(points))
}

async fn spawn_upstream() -> (String, Upstream) {
    let upstream = Upstream::default();
    let app = Router::new()
        .route("/json", get(fake_sotkanet))
        .with_state(upstream.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), upstream)
}

async fn test_app() -> (Router, Upstream) {
    let (base_url, upstream) = spawn_upstream().await;
    let client = SotkanetClient::new(base_url, DEFAULT_TIMEOUT).unwrap();
    let resolver = MetricResolver::new(
        Arc::new(Catalog::builtin()),
        Arc::new(client),
        Arc::new(MemoryCache::new()),
        Arc::new(MetricsTable::in_memory()),
    );
    let state = AppState::new(Arc::new(resolver), "974");
    (create_router(state), upstream)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

#[tokio::test]
async fn test_health() {
    let (app, _) = test_app().await;
    let (status, body) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
}

#[tokio::test]
async fn test_indicators_and_regions() {
    let (app, _) = test_app().await;

    let (status, body) = get_json(&app, "/indicators").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 12);

    let (status, body) = get_json(&app, "/regions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["code"], "974");
}

#[tokio::test]
async fn test_metric_from_upstream() {
    let (app, upstream) = test_app().await;

    let (status, body) = get_json(&app, "/metric/hoitotakuu?region=974&year=2023").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], 91.0);
    assert_eq!(body["target"], 95.0);
    assert_eq!(body["trend"], "down");
    assert_eq!(body["dataSource"], "upstream");
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);

    let (_, again) = get_json(&app, "/metric/hoitotakuu?region=974&year=2023").await;
    assert_eq!(again["value"], 91.0);
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 1, "second call served from cache");
}

#[tokio::test]
async fn test_metric_without_upstream_data_falls_back() {
    let (app, upstream) = test_app().await;

    let (status, body) = get_json(&app, "/metric/hoitotakuu?year=2019").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], 91.0);
    assert_eq!(body["dataSource"], "fallback");
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_metric_error_statuses() {
    let (app, _) = test_app().await;

    let (status, body) = get_json(&app, "/metric/sairaalapaikat").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "UNKNOWN_INDICATOR");

    let (status, body) = get_json(&app, "/metric/kayntimaara").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "AMBIGUOUS_INDICATOR");

    let (status, _) = get_json(&app, "/metric/hoitotakuu?region=kuopio").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_data_route_passes_points_through() {
    let (app, upstream) = test_app().await;

    let (status, body) = get_json(&app, "/data/2230?region=HVA16&year=2023").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["absoluteValue"], 91.0);
    assert_eq!(body[0]["region"], 974);

    let (status, body) = get_json(&app, "/data/2230?year=2023&gender=female").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_data_route_rejects_unexpected_upstream_shape() {
    let (app, _) = test_app().await;
    let (status, body) = get_json(&app, "/data/666?year=2023").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "UPSTREAM_UNAVAILABLE");
}

#[tokio::test]
async fn test_multiple_route() {
    let (app, upstream) = test_app().await;

    let (status, body) =
        get_json(&app, "/multiple?indicators=2230,1820,digipalvelut&year=2023").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["2230"][0]["value"], 91.0);
    assert_eq!(body["1820"][0]["value"], 2900.0);
    assert!(body["4420"].as_array().unwrap().is_empty());
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 1, "one combined upstream call");

    let (status, _) = get_json(&app, "/multiple").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_area_route() {
    let (app, _) = test_app().await;

    let (status, body) = get_json(&app, "/area/avoterveydenhuolto?year=2023").await;
    assert_eq!(status, StatusCode::OK);
    let metrics = body.as_array().unwrap();
    assert_eq!(metrics.len(), 3);
    assert_eq!(metrics[0]["dataSource"], "upstream");
    assert_eq!(metrics[1]["dataSource"], "upstream");
    assert_eq!(metrics[2]["dataSource"], "fallback");

    let (status, _) = get_json(&app, "/area/costs").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_trend_route_within_jitter() {
    let (app, _) = test_app().await;

    let (status, body) = get_json(&app, "/trend/odotusaika?points=6").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["baseline"], 28.0);
    let points = body["points"].as_array().unwrap();
    assert_eq!(points.len(), 6);
    for point in points {
        let value = point["value"].as_f64().unwrap();
        assert!((value - 28.0).abs() <= 2.8 + 1e-9, "value {} outside band", value);
    }
}

#[tokio::test]
async fn test_sync_route() {
    let (app, _) = test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/sync")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"region": "974", "year": 2023}"#))
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_indicators"], 12);
    assert_eq!(body["synced_count"], 12);
    assert_eq!(body["fallback_count"], 10);
    assert_eq!(body["results"][0]["status"], "synced");
}

fn sync_request(content_type: Option<&str>, body: &'static str) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/sync");
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    builder.body(Body::from(body)).unwrap()
}

#[tokio::test]
async fn test_sync_route_rejects_malformed_body() {
    let (app, upstream) = test_app().await;

    let bad_year = sync_request(Some("application/json"), r#"{"region": "974", "year": "2019"}"#);
    let (status, body) = send(&app, bad_year).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_INPUT");

    let (status, _) = send(&app, sync_request(Some("text/plain"), r#"{"year": 2019}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, sync_request(Some("application/json"), "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(upstream.hits.load(Ordering::SeqCst), 0, "nothing was synced");
}

#[tokio::test]
async fn test_sync_route_empty_body_uses_defaults() {
    let (app, _) = test_app().await;

    let (status, body) = send(&app, sync_request(None, "")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["region"], "974");
    assert_eq!(body["total_indicators"], 12);
}

#[tokio::test]
async fn test_prior_year_metric_does_not_answer_raw_data_for_requested_year() {
    let (app, upstream) = test_app().await;

    let (_, metric) = get_json(&app, "/metric/hoitotakuu?year=2024").await;
    assert_eq!(metric["dataSource"], "upstream");
    assert_eq!(metric["dataYear"], 2023);
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 2);

    let (status, body) = get_json(&app, "/data/2230?year=2024").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 3);
}
