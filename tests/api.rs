//! End-to-end tests for the HTTP surface, driven through the router.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use candle_core::{Device, Tensor};
use churn_service::charts::{ChartRenderer, Charts};
use churn_service::report::PredictionSummary;
use churn_service::table::FeatureFrame;
use axum_prometheus::metrics_exporter_prometheus::PrometheusBuilder;
use churn_service::{
    AppState, ChurnLabel, Classifier, ClassifierError, LinearClassifier, PlottersRenderer,
    RequiredColumns, metrics_router, router,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "churn-test-boundary";
const UPLOAD_LIMIT: usize = 1024 * 1024;

/// Churn whenever tenure is under a year.
struct TenureRule;

impl Classifier for TenureRule {
    fn predict(&self, frame: &FeatureFrame<'_>) -> Result<Vec<ChurnLabel>, ClassifierError> {
        let tenure = frame
            .column_index("tenure")
            .ok_or_else(|| ClassifierError::UnknownColumn("tenure".into()))?;
        Ok(frame
            .rows()
            .iter()
            .map(|row| match row[tenure].parse::<f64>() {
                Ok(months) if months < 12.0 => ChurnLabel::Churn,
                _ => ChurnLabel::NoChurn,
            })
            .collect())
    }
}

struct FixedCharts;

impl ChartRenderer for FixedCharts {
    fn render(&self, _summary: &PredictionSummary) -> anyhow::Result<Charts> {
        Ok(Charts {
            bar_graph: b"bar".to_vec(),
            line_graph: b"line".to_vec(),
        })
    }
}

fn columns() -> Arc<RequiredColumns> {
    Arc::new(RequiredColumns::new(vec!["tenure".into(), "MonthlyCharges".into()]).unwrap())
}

fn stub_app() -> Router {
    let state = AppState::new(Arc::new(TenureRule), columns(), Arc::new(FixedCharts));
    router(state, UPLOAD_LIMIT)
}

struct Part<'a> {
    name: &'a str,
    file_name: Option<&'a str>,
    content: &'a [u8],
}

fn file(file_name: &'static str, content: &'static str) -> Part<'static> {
    Part {
        name: "file",
        file_name: Some(file_name),
        content: content.as_bytes(),
    }
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let disposition = match part.file_name {
            Some(file_name) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{file_name}\"\r\nContent-Type: text/csv\r\n\r\n",
                part.name
            ),
            None => format!(
                "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                part.name
            ),
        };
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(part.content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn post_predict(app: Router, parts: &[Part<'_>]) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap();
    send(app, request).await
}

fn error_message(body: &Value) -> &str {
    body["error"].as_str().unwrap()
}

#[tokio::test]
async fn one_result_per_row_in_input_order() {
    let csv = "customerID,tenure,MonthlyCharges\nA,5,70.5\nB,48,20.0\nC,2,99.9\n";
    let (status, body) = post_predict(stub_app(), &[file("customers.csv", csv)]).await;

    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["prediction"], "Churn");
    assert_eq!(
        results[0]["reason"],
        "It is churn because of the following factors: tenure: 5, MonthlyCharges: 70.5"
    );
    assert_eq!(results[1]["prediction"], "No Churn");
    assert_eq!(
        results[1]["reason"],
        "It is no churn because of the following factors: tenure: 48, MonthlyCharges: 20.0"
    );
    assert_eq!(results[2]["prediction"], "Churn");
}

#[tokio::test]
async fn charts_are_returned_as_data_uris() {
    let csv = "tenure,MonthlyCharges\n5,70.5\n";
    let (status, body) = post_predict(stub_app(), &[file("customers.csv", csv)]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bar_graph"], "data:image/png;base64,YmFy");
    assert_eq!(body["line_graph"], "data:image/png;base64,bGluZQ==");
    assert!(body.get("graph").is_none());
}

#[tokio::test]
async fn wrong_extension_is_rejected_regardless_of_content() {
    let csv = "tenure,MonthlyCharges\n5,70.5\n";
    for name in ["customers.txt", "customers.CSV", "customers.csv.bak"] {
        let (status, body) = post_predict(stub_app(), &[file(name, csv)]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "filename {name:?}");
        assert_eq!(
            error_message(&body),
            "Invalid file type. Please upload a CSV file"
        );
    }
}

#[tokio::test]
async fn missing_file_field_is_rejected() {
    let other = Part {
        name: "notes",
        file_name: Some("customers.csv"),
        content: b"tenure,MonthlyCharges\n5,70.5\n",
    };
    let (status, body) = post_predict(stub_app(), &[other]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), "No file uploaded");

    let (status, body) = post_predict(stub_app(), &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), "No file uploaded");
}

#[tokio::test]
async fn file_field_without_filename_does_not_count() {
    let plain = Part {
        name: "file",
        file_name: None,
        content: b"tenure,MonthlyCharges\n5,70.5\n",
    };
    let (status, body) = post_predict(stub_app(), &[plain]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), "No file uploaded");
}

#[tokio::test]
async fn non_multipart_body_is_treated_as_no_file() {
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"file": "x.csv"}"#))
        .unwrap();
    let (status, body) = send(stub_app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), "No file uploaded");
}

#[tokio::test]
async fn missing_columns_are_enumerated() {
    let csv = "customerID,tenure\nA,5\n";
    let (status, body) = post_predict(stub_app(), &[file("customers.csv", csv)]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(&body),
        "Missing required columns: MonthlyCharges"
    );

    let csv = "customerID\nA\n";
    let (_, body) = post_predict(stub_app(), &[file("customers.csv", csv)]).await;
    assert_eq!(
        error_message(&body),
        "Missing required columns: tenure, MonthlyCharges"
    );
}

#[tokio::test]
async fn malformed_csv_is_a_read_error() {
    for csv in ["", "tenure,MonthlyCharges\n5,70.5,extra\n"] {
        let (status, body) = post_predict(stub_app(), &[file("customers.csv", csv)]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(
            error_message(&body).starts_with("Error reading file: "),
            "unexpected message {body}"
        );
    }
}

#[tokio::test]
async fn header_only_csv_returns_empty_results() {
    let csv = "tenure,MonthlyCharges\n";
    let (status, body) = post_predict(stub_app(), &[file("customers.csv", csv)]).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn repeated_requests_and_duplicate_rows_agree() {
    let csv = "tenure,MonthlyCharges\n7,55.0\n7,55.0\n30,80.25\n";
    let (_, first) = post_predict(stub_app(), &[file("customers.csv", csv)]).await;
    let (_, second) = post_predict(stub_app(), &[file("customers.csv", csv)]).await;

    assert_eq!(first["results"], second["results"]);
    assert_eq!(first["results"][0], first["results"][1]);
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .header(header::ORIGIN, "http://example.com")
        .body(Body::empty())
        .unwrap();
    let response = stub_app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn metrics_route_allows_any_origin() {
    let handle = PrometheusBuilder::new().build_recorder().handle();
    let app = stub_app().merge(metrics_router(handle));
    let request = Request::builder()
        .method("GET")
        .uri("/metrics")
        .header(header::ORIGIN, "http://example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn health_reports_ok() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(stub_app(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let state = AppState::new(Arc::new(TenureRule), columns(), Arc::new(FixedCharts));
    let app = router(state, 64);

    let csv = format!("tenure,MonthlyCharges\n{}", "5,70.5\n".repeat(100));
    let content: &'static str = Box::leak(csv.into_boxed_str());
    let (status, _) = post_predict(app, &[file("customers.csv", content)]).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

/// Writes a two-feature linear model: short tenure on a monthly contract churns.
fn write_model(dir: &std::path::Path) {
    std::fs::write(
        dir.join("config.json"),
        r#"{"num_classes": 2, "churn_class": 1, "features": [
            {"kind": "numeric", "column": "tenure", "mean": 12.0, "scale": 12.0},
            {"kind": "categorical", "column": "Contract", "categories": ["Month-to-month", "One year", "Two year"]}
        ]}"#,
    )
    .unwrap();

    let device = Device::Cpu;
    let weight = Tensor::new(
        &[[1.0f32, -1.0, 0.5, 1.5], [-1.0, 1.0, -0.5, -1.5]],
        &device,
    )
    .unwrap();
    let bias = Tensor::new(&[0f32, 0.0], &device).unwrap();
    let tensors = HashMap::from([
        ("classifier.weight".to_string(), weight),
        ("classifier.bias".to_string(), bias),
    ]);
    candle_core::safetensors::save(&tensors, dir.join("model.safetensors")).unwrap();
}

fn model_app() -> (tempfile::TempDir, Router) {
    let dir = tempfile::tempdir().unwrap();
    write_model(dir.path());
    let columns =
        Arc::new(RequiredColumns::new(vec!["tenure".into(), "Contract".into()]).unwrap());
    let classifier = LinearClassifier::load(dir.path(), &columns).unwrap();
    let state = AppState::new(
        Arc::new(classifier),
        columns,
        Arc::new(PlottersRenderer::new(false)),
    );
    (dir, router(state, UPLOAD_LIMIT))
}

#[tokio::test]
async fn end_to_end_with_trained_model_and_charts() {
    let (_dir, app) = model_app();
    let csv = "customerID,Contract,tenure\nA,Month-to-month,1\nB,Two year,60\nC,Month-to-month,2\n";
    let (status, body) = post_predict(app, &[file("telco.csv", csv)]).await;

    assert_eq!(status, StatusCode::OK);
    let predictions: Vec<&str> = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["prediction"].as_str().unwrap())
        .collect();
    assert_eq!(predictions, ["Churn", "No Churn", "Churn"]);
    assert_eq!(
        body["results"][1]["reason"],
        "It is no churn because of the following factors: tenure: 60, Contract: Two year"
    );

    for key in ["bar_graph", "line_graph"] {
        assert!(
            body[key]
                .as_str()
                .unwrap()
                .starts_with("data:image/png;base64,iVBORw0KGgo"),
            "{key} is not a PNG data URI"
        );
    }
}

#[tokio::test]
async fn non_numeric_feature_is_a_client_error() {
    let (_dir, app) = model_app();
    let csv = "tenure,Contract\n5,Month-to-month\n,Two year\n";
    let (status, body) = post_predict(app, &[file("telco.csv", csv)]).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(&body),
        "Invalid value for column 'tenure' at row 2: ''"
    );
}
