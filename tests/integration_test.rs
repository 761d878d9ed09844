//! Integration test: raw CSV → processed dataset → training run → registry →
//! prediction API, plus the unavailable and bad-request paths.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use credit_risk::{
    api::{build_router, handlers::HealthResponse, AppState, LoadedModel, PredictionService},
    config::{AppConfig, TrainingConfig},
    dataset::{load_processed, JoinPolicy},
    features::{CustomerFeatures, FeatureExtractor},
    model::{Cell, CreditRiskPipeline, FeatureTable, GradientBoostingParams, Prediction, PreprocessorSpec},
    processing,
    risk::ProxyLabeler,
    storage::{ModelRegistry, Stage},
    training::Trainer,
    transactions::Transaction,
};
use serde_json::{json, Value};
use std::fmt::Write as _;
use std::path::Path;
use tower::ServiceExt;

const MODEL: &str = "CreditRiskModel";

/// 60 customers in three behaviour groups: busy and recent, occasional, dormant.
fn write_raw(path: &Path) {
    let mut s = String::from(
        "TransactionId,BatchId,CustomerId,ProductId,ChannelId,Value,TransactionStartTime\n",
    );
    let mut t = 0;
    for c in 0..60 {
        let (count, first_day, value) = match c % 3 {
            0 => (12, 20, 800.0),
            1 => (4, 10, 150.0),
            _ => (1, 1, 25.0),
        };
        for k in 0..count {
            t += 1;
            writeln!(
                s,
                "T{t},B{},CustomerId_{c},ProductId_{},ChannelId_{},{},2019-02-{:02}T08:{:02}:00Z",
                t % 7,
                k % 4,
                1 + (c + k) % 3,
                value + (c * 3 + k * 11) as f64,
                first_day + k % 8,
                c % 60
            )
            .unwrap();
        }
    }
    std::fs::write(path, s).unwrap();
}

fn quick_training() -> TrainingConfig {
    TrainingConfig {
        classifier: GradientBoostingParams {
            n_estimators: 30,
            ..Default::default()
        },
        ..Default::default()
    }
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn dormant_customer() -> Value {
    json!({
        "total_transactions": 1,
        "total_value": 30.0,
        "avg_value": 30.0,
        "std_value": 0.0,
        "unique_products": 1,
        "most_frequent_channel": "ChannelId_2"
    })
}

#[test]
fn feature_scenarios() {
    let ts = |d| Utc.with_ymd_and_hms(2023, 1, d, 0, 0, 0).unwrap();
    let txs = vec![
        Transaction::new("T1", "C1", "P1", "CH1", 100.0, ts(1)),
        Transaction::new("T2", "C1", "P2", "CH1", 200.0, ts(10)),
        Transaction::new("T3", "C2", "P1", "CH2", 50.0, ts(5)),
    ];
    let features = FeatureExtractor::new().extract(&txs).unwrap();
    assert_eq!(features.len(), 2);
    let c1 = &features[0];
    assert_eq!(c1.total_transactions, 2);
    assert_eq!(c1.total_value, 300.0);
    assert_eq!(c1.avg_value, 150.0);
    assert!(c1.std_value > 0.0);
    assert_eq!(c1.unique_products, 2);
    assert_eq!(features[1].std_value, 0.0);
}

#[test]
fn proxy_labels_are_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("data.csv");
    write_raw(&raw);
    let txs = credit_risk::transactions::load_transactions(&raw).unwrap();
    let labeler = ProxyLabeler::new(AppConfig::default().labeling);
    let a = labeler.label(&txs).unwrap();
    let b = labeler.label(&txs).unwrap();
    assert_eq!(a.labels, b.labels);
    let top = a
        .clusters
        .iter()
        .map(|c| c.mean_recency)
        .fold(f64::MIN, f64::max);
    let high = a.clusters.iter().find(|c| c.cluster == a.high_risk_cluster).unwrap();
    assert_eq!(high.mean_recency, top);
}

#[tokio::test]
async fn end_to_end_process_train_serve() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("raw/data.csv");
    std::fs::create_dir_all(raw.parent().unwrap()).unwrap();
    write_raw(&raw);

    let summary = processing::run(
        &raw,
        &dir.path().join("processed"),
        &AppConfig::default().labeling,
        JoinPolicy::Strict,
    )
    .unwrap();
    assert_eq!(summary.customers, 60);

    let data = load_processed(&summary.output_path).unwrap();
    let registry_root = dir.path().join("mlruns");
    let registry = ModelRegistry::open(&registry_root).unwrap();
    let run = Trainer::new(quick_training(), "integration")
        .run(&data, &registry, MODEL)
        .unwrap();
    assert_eq!(run.version, 1);
    assert!((0.0..=1.0).contains(&run.metrics.roc_auc));

    let service = PredictionService::open(&registry_root, MODEL, Stage::Production);
    assert!(service.is_ready());
    let app = build_router(AppState::new(service));

    let (status, body) = call(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    let health: HealthResponse = serde_json::from_value(body).unwrap();
    assert_eq!(health.status, "API is running");
    assert_eq!(health.model_status, "Model loaded successfully.");
    assert_eq!(health.model_version, Some(1));

    let (status, _) = call(&app, get("/health/ready")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, first) = call(&app, post_json("/predict", &dormant_customer())).await;
    assert_eq!(status, StatusCode::OK);
    let first: Prediction = serde_json::from_value(first).unwrap();
    assert!((0.0..=1.0).contains(&first.risk_probability));
    assert_eq!(first.is_high_risk, u8::from(first.risk_probability > 0.5));

    // read-only: same input, same answer
    for _ in 0..3 {
        let (_, again) = call(&app, post_json("/predict", &dormant_customer())).await;
        let again: Prediction = serde_json::from_value(again).unwrap();
        assert_eq!(again, first);
    }

    let mut unseen = dormant_customer();
    unseen["most_frequent_channel"] = json!("ChannelId_999");
    let (status, _) = call(&app, post_json("/predict", &unseen)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &app,
        post_json("/predict", &json!({"total_transactions": "two", "avg_value": 1.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert_eq!(body["error"]["fields"].as_array().unwrap().len(), 6 - 1);

    // a bad request does not disturb later ones
    let (status, _) = call(&app, post_json("/predict", &dormant_customer())).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unavailable_service_answers_503() {
    let dir = tempfile::tempdir().unwrap();
    let service = PredictionService::open(dir.path(), MODEL, Stage::Production);
    assert!(!service.is_ready());
    let app = build_router(AppState::new(service));

    let (status, body) = call(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_status"], "Error: Model not loaded.");
    assert!(body.get("model_version").is_none());

    let (status, _) = call(&app, get("/health/live")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, get("/health/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = call(&app, post_json("/predict", &dormant_customer())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["status"], 503);
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ModelRegistry::open(dir.path()).unwrap();
    let raw = dir.path().join("data.csv");
    write_raw(&raw);
    let summary = processing::run(
        &raw,
        dir.path(),
        &AppConfig::default().labeling,
        JoinPolicy::DropUnmatched,
    )
    .unwrap();
    let data = load_processed(&summary.output_path).unwrap();
    Trainer::new(quick_training(), "integration")
        .run(&data, &registry, MODEL)
        .unwrap();

    let app = build_router(AppState::new(PredictionService::load(&registry, MODEL, Stage::Production)));
    let req = Request::builder()
        .method("POST")
        .uri("/predict")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["fields"][0]["field"], "body");
}

#[test]
fn retraining_archives_previous_production_version() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("data.csv");
    write_raw(&raw);
    let summary = processing::run(
        &raw,
        dir.path(),
        &AppConfig::default().labeling,
        JoinPolicy::DropUnmatched,
    )
    .unwrap();
    let data = load_processed(&summary.output_path).unwrap();
    let registry = ModelRegistry::open(&dir.path().join("mlruns")).unwrap();
    let trainer = Trainer::new(quick_training(), "integration");
    trainer.run(&data, &registry, MODEL).unwrap();
    trainer.run(&data, &registry, MODEL).unwrap();

    let stages: Vec<Stage> = registry
        .list_versions(MODEL)
        .unwrap()
        .into_iter()
        .map(|v| v.stage)
        .collect();
    assert_eq!(stages, vec![Stage::Archived, Stage::Production]);
    let service = PredictionService::load(&registry, MODEL, Stage::Production);
    assert_eq!(service.model().map(|m| m.version), Some(2));
}

/// Pipeline fitted on the six request features plus `extra` passthrough columns.
fn fitted_with_extra(extra: &[&str]) -> CreditRiskPipeline {
    let customers: Vec<CustomerFeatures> = (0..40)
        .map(|i| {
            let risky = i % 4 == 0;
            CustomerFeatures {
                customer_id: format!("C{i}"),
                total_transactions: if risky { 1 } else { 8 + (i % 5) as u64 },
                total_value: if risky { 30.0 } else { 1_200.0 + i as f64 },
                avg_value: if risky { 30.0 } else { 140.0 },
                std_value: if risky { 0.0 } else { 25.0 },
                unique_products: if risky { 1 } else { 3 },
                most_frequent_channel: format!("ChannelId_{}", 1 + i % 3),
            }
        })
        .collect();
    let base = FeatureTable::from_customers(&customers);
    let mut columns = base.columns().to_vec();
    columns.extend(extra.iter().map(|c| c.to_string()));
    let rows = base
        .rows()
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let mut r = r.clone();
            r.extend(extra.iter().map(|_| Cell::Number(i as f64)));
            r
        })
        .collect();
    let table = FeatureTable::new(columns, rows);
    let target: Vec<u8> = (0..40).map(|i| u8::from(i % 4 == 0)).collect();
    CreditRiskPipeline::fit(
        &PreprocessorSpec::credit_default(),
        &GradientBoostingParams {
            n_estimators: 10,
            ..Default::default()
        },
        &table,
        &target,
    )
    .unwrap()
}

fn service_with(pipeline: CreditRiskPipeline) -> Router {
    build_router(AppState::new(PredictionService::ready(LoadedModel {
        name: MODEL.to_string(),
        version: 1,
        stage: Stage::Production,
        pipeline,
    })))
}

#[tokio::test]
async fn scoring_failure_is_internal_error_and_isolated() {
    // the request cannot supply `tenure`, so the fitted transform fails
    let broken = service_with(fitted_with_extra(&["tenure"]));
    let healthy = service_with(fitted_with_extra(&[]));

    let (status, body) = call(&broken, post_json("/predict", &dormant_customer())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
    assert_eq!(body["error"]["status"], 500);

    // the failed request left the service as it was
    let (status, body) = call(&broken, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_status"], "Model loaded successfully.");
    let (status, _) = call(&broken, post_json("/predict", &dormant_customer())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, body) = call(&healthy, post_json("/predict", &dormant_customer())).await;
    assert_eq!(status, StatusCode::OK);
    let prediction: Prediction = serde_json::from_value(body).unwrap();
    assert!((0.0..=1.0).contains(&prediction.risk_probability));
}
