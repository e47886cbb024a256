use serde::Serialize;

use crate::engine::ChurnLabel;

#[derive(Debug, Clone, Serialize)]
pub struct PredictionResult {
    pub prediction: ChurnLabel,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub results: Vec<PredictionResult>,
    /// `data:image/png;base64,...` of the percentage bar chart
    pub bar_graph: String,
    /// `data:image/png;base64,...` of the cumulative churn line chart
    pub line_graph: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}
