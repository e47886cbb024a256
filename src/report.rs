//! Turning classifier labels into result records and aggregate statistics.

use crate::engine::ChurnLabel;
use crate::table::FeatureFrame;
use crate::types::PredictionResult;

const CHURN_PREFIX: &str = "It is churn because of the following factors: ";
const NO_CHURN_PREFIX: &str = "It is no churn because of the following factors: ";

/// `"col: value"` pairs for one row, in frame column order.
pub fn reason_factors(columns: &[String], row: &[&str]) -> String {
    columns
        .iter()
        .zip(row)
        .map(|(column, value)| format!("{column}: {value}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Pairs each row with its label. `labels` must be one per frame row.
pub fn build_results(frame: &FeatureFrame<'_>, labels: &[ChurnLabel]) -> Vec<PredictionResult> {
    debug_assert_eq!(frame.len(), labels.len());

    frame
        .rows()
        .iter()
        .zip(labels)
        .map(|(row, &label)| {
            let prefix = match label {
                ChurnLabel::Churn => CHURN_PREFIX,
                ChurnLabel::NoChurn => NO_CHURN_PREFIX,
            };
            PredictionResult {
                prediction: label,
                reason: format!("{prefix}{}", reason_factors(frame.columns(), row)),
            }
        })
        .collect()
}

/// Aggregates over one request's predictions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PredictionSummary {
    pub churn: usize,
    pub no_churn: usize,
    /// Running count of churn predictions, indexed by row.
    pub cumulative_churn: Vec<usize>,
}

impl PredictionSummary {
    pub fn from_labels(labels: &[ChurnLabel]) -> Self {
        let mut summary = Self {
            cumulative_churn: Vec::with_capacity(labels.len()),
            ..Default::default()
        };
        for label in labels {
            match label {
                ChurnLabel::Churn => summary.churn += 1,
                ChurnLabel::NoChurn => summary.no_churn += 1,
            }
            summary.cumulative_churn.push(summary.churn);
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.churn + self.no_churn
    }

    /// Percentage per label seen, largest first; churn wins ties.
    pub fn shares(&self) -> Vec<(ChurnLabel, f64)> {
        let total = self.total();
        if total == 0 {
            return Vec::new();
        }

        let mut counts = vec![
            (ChurnLabel::Churn, self.churn),
            (ChurnLabel::NoChurn, self.no_churn),
        ];
        counts.retain(|&(_, count)| count > 0);
        counts.sort_by(|a, b| b.1.cmp(&a.1));

        counts
            .into_iter()
            .map(|(label, count)| (label, count as f64 * 100.0 / total as f64))
            .collect()
    }
}
