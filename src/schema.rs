//! The required column set the classifier was trained on.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid columns file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("columns list is empty")]
    Empty,
    #[error("column '{0}' is listed more than once")]
    Duplicate(String),
}

#[derive(Debug, Deserialize)]
struct ColumnsFile {
    columns: Vec<String>,
}

/// Ordered, duplicate-free list of feature column names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredColumns {
    columns: Vec<String>,
}

impl RequiredColumns {
    pub fn new(columns: Vec<String>) -> Result<Self, SchemaError> {
        if columns.is_empty() {
            return Err(SchemaError::Empty);
        }
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(SchemaError::Duplicate(column.clone()));
            }
        }
        Ok(Self { columns })
    }

    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let file: ColumnsFile = serde_json::from_str(json)?;
        Self::new(file.columns)
    }

    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let columns = Self::from_json(&json)?;
        tracing::info!(count = columns.len(), "Loaded required columns");
        Ok(columns)
    }

    /// Required names absent from `headers`, in required order.
    pub fn missing<'a, S: AsRef<str>>(&'a self, headers: &[S]) -> Vec<&'a str> {
        let present: HashSet<&str> = headers.iter().map(|h| h.as_ref()).collect();
        self.columns
            .iter()
            .map(String::as_str)
            .filter(|column| !present.contains(column))
            .collect()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
