//! Churn prediction service: upload a CSV of customers, get a churn label and
//! the reasoning factors per row, plus two summary charts.

pub mod api;
pub mod charts;
pub mod config;
pub mod engine;
pub mod error;
pub mod linear_engine;
pub mod report;
pub mod schema;
pub mod table;
pub mod types;

pub use api::{AppState, Prediction, metrics_router, router};
pub use charts::{ChartRenderer, Charts, PlottersRenderer};
pub use config::Config;
pub use engine::{ChurnLabel, Classifier, ClassifierError};
pub use linear_engine::LinearClassifier;
pub use schema::RequiredColumns;
