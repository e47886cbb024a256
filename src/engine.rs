use serde::Serialize;

use crate::table::FeatureFrame;

/// Outcome of classifying one customer row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChurnLabel {
    #[serde(rename = "Churn")]
    Churn,
    #[serde(rename = "No Churn")]
    NoChurn,
}

impl ChurnLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChurnLabel::Churn => "Churn",
            ChurnLabel::NoChurn => "No Churn",
        }
    }

    pub fn is_churn(&self) -> bool {
        matches!(self, ChurnLabel::Churn)
    }
}

impl std::fmt::Display for ChurnLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// A cell that cannot be encoded as a model input. `row` is 1-based.
    #[error("Invalid value for column '{column}' at row {row}: '{value}'")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },
    #[error("column '{0}' is not part of the feature frame")]
    UnknownColumn(String),
    #[error("inference failed: {0}")]
    Inference(#[from] candle_core::Error),
}

pub trait Classifier: Send + Sync {
    /// One label per frame row, in row order.
    fn predict(&self, frame: &FeatureFrame<'_>) -> Result<Vec<ChurnLabel>, ClassifierError>;
}
