//! Uploaded CSV tables and their projection onto the required columns.

use csv::{ReaderBuilder, StringRecord};

use crate::schema::RequiredColumns;

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("No columns to parse from file")]
    NoColumns,
    #[error("{0}")]
    Csv(#[from] csv::Error),
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

/// Header plus rows of raw cell text, in upload order.
#[derive(Debug)]
pub struct UploadedTable {
    headers: StringRecord,
    rows: Vec<StringRecord>,
}

impl UploadedTable {
    /// Parses `bytes` as a headed CSV. Every record must match the header width.
    pub fn from_csv(bytes: &[u8]) -> Result<Self, TableError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(bytes);

        let headers = reader.headers()?.clone();
        if headers.is_empty() || (headers.len() == 1 && headers[0].is_empty()) {
            return Err(TableError::NoColumns);
        }

        let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> Vec<&str> {
        self.headers.iter().collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Projects the table onto `required`, keeping the required column order.
    pub fn select<'a>(&'a self, required: &'a RequiredColumns) -> Result<FeatureFrame<'a>, TableError> {
        let headers = self.headers();
        let missing = required.missing(&headers);
        if !missing.is_empty() {
            return Err(TableError::MissingColumns(
                missing.into_iter().map(str::to_string).collect(),
            ));
        }

        // first occurrence wins for duplicated header names
        let positions: Vec<usize> = required
            .iter()
            .filter_map(|column| headers.iter().position(|h| *h == column))
            .collect();

        let rows = self
            .rows
            .iter()
            .map(|record| positions.iter().map(|&i| record.get(i).unwrap_or("")).collect())
            .collect();

        Ok(FeatureFrame {
            columns: required.as_slice(),
            rows,
        })
    }
}

/// The feature columns of an upload, the only view the classifier gets.
#[derive(Debug, Clone)]
pub struct FeatureFrame<'a> {
    columns: &'a [String],
    rows: Vec<Vec<&'a str>>,
}

impl<'a> FeatureFrame<'a> {
    pub fn new(columns: &'a [String], rows: Vec<Vec<&'a str>>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &'a [String] {
        self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn rows(&self) -> &[Vec<&'a str>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
