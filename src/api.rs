use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use axum::body::Bytes;
use axum_prometheus::metrics_exporter_prometheus::PrometheusHandle;
use metrics::counter;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::charts::{ChartRenderer, data_uri};
use crate::engine::Classifier;
use crate::error::ServiceError;
use crate::report::{PredictionSummary, build_results};
use crate::schema::RequiredColumns;
use crate::table::UploadedTable;
use crate::types::{HealthResponse, PredictionResponse, PredictionResult};

const FILE_FIELD: &str = "file";
const CSV_EXTENSION: &str = ".csv";

/// Read-only handles built once at startup and shared by every request.
#[derive(Clone)]
pub struct AppState {
    classifier: Arc<dyn Classifier>,
    columns: Arc<RequiredColumns>,
    renderer: Arc<dyn ChartRenderer>,
}

/// Row results plus the aggregates the charts are drawn from.
#[derive(Debug)]
pub struct Prediction {
    pub results: Vec<PredictionResult>,
    pub summary: PredictionSummary,
}

impl AppState {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        columns: Arc<RequiredColumns>,
        renderer: Arc<dyn ChartRenderer>,
    ) -> Self {
        Self {
            classifier,
            columns,
            renderer,
        }
    }

    /// Parse, validate and classify an uploaded CSV. No rendering.
    pub fn classify_csv(&self, bytes: &[u8]) -> Result<Prediction, ServiceError> {
        let table = UploadedTable::from_csv(bytes)?;
        let frame = table.select(&self.columns)?;
        let labels = self.classifier.predict(&frame)?;

        Ok(Prediction {
            results: build_results(&frame, &labels),
            summary: PredictionSummary::from_labels(&labels),
        })
    }

    /// Full request flow: classification followed by both charts.
    pub fn predict_csv(&self, bytes: &[u8]) -> Result<PredictionResponse, ServiceError> {
        let Prediction { results, summary } = self.classify_csv(bytes)?;
        let charts = self
            .renderer
            .render(&summary)
            .map_err(ServiceError::Internal)?;

        counter!("predictions_total", "label" => "churn").increment(summary.churn as u64);
        counter!("predictions_total", "label" => "no_churn").increment(summary.no_churn as u64);
        tracing::info!(
            rows = summary.total(),
            churn = summary.churn,
            "Prediction completed successfully"
        );

        Ok(PredictionResponse {
            results,
            bar_graph: data_uri(&charts.bar_graph),
            line_graph: data_uri(&charts.line_graph),
        })
    }
}

/// `/predict` and `/health` with CORS open to every origin.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/predict", post(predict_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(state)
}

/// `/metrics` rendered from `handle`, under the same CORS policy as [`router`].
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(move || async move { handle.render() }))
        .layer(cors())
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[tracing::instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4().simple()))]
async fn predict_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResponse>, ServiceError> {
    counter!("prediction_requests_total").increment(1);

    let mut multipart = multipart.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Request body is not multipart");
        ServiceError::NoFile
    })?;
    let (file_name, bytes) = read_upload(&mut multipart).await?;
    tracing::info!(file_name = %file_name, size = bytes.len(), "Processing prediction request");

    tokio::task::spawn_blocking(move || state.predict_csv(&bytes))
        .await
        .map_err(|e| ServiceError::Internal(e.into()))?
        .map(Json)
}

/// Finds the first `file` field that carries a filename and reads it, after
/// checking the extension.
async fn read_upload(multipart: &mut Multipart) -> Result<(String, Bytes), ServiceError> {
    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        if !file_name.ends_with(CSV_EXTENSION) {
            return Err(ServiceError::InvalidFileType);
        }

        let bytes = field.bytes().await.map_err(upload_error)?;
        return Ok((file_name, bytes));
    }

    Err(ServiceError::NoFile)
}

fn upload_error(err: axum::extract::multipart::MultipartError) -> ServiceError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::PayloadTooLarge(err.body_text())
    } else {
        ServiceError::ReadFile(err.body_text())
    }
}
