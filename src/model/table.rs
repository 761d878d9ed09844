//! Minimal named-column table fed to the preprocessing stage.

use crate::features::{CustomerFeatures, CATEGORICAL_FEATURES, NUMERIC_FEATURES};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    /// Empty and non-finite values (`NaN`, `inf`) are missing.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Cell::Missing;
        }
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Cell::Number(v),
            Ok(_) => Cell::Missing,
            Err(_) => Cell::Text(raw.to_string()),
        }
    }

    /// Keeps the raw text as is; only empty values are missing.
    pub fn text(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            Cell::Missing
        } else {
            Cell::Text(raw.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Numeric view; `Err` carries the offending text.
    pub fn as_number(&self) -> Result<Option<f64>, &str> {
        match self {
            Cell::Number(v) => Ok(Some(*v)),
            Cell::Missing => Ok(None),
            Cell::Text(t) => t.trim().parse::<f64>().map(Some).map_err(|_| t.as_str()),
        }
    }

    /// Categorical view; numbers are rendered without a trailing `.0`.
    pub fn as_category(&self) -> Option<String> {
        match self {
            Cell::Number(v) => Some(v.to_string()),
            Cell::Text(t) => Some(t.clone()),
            Cell::Missing => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl FeatureTable {
    /// Rows shorter than `columns` are padded with [`Cell::Missing`].
    pub fn new(columns: Vec<String>, mut rows: Vec<Vec<Cell>>) -> Self {
        for r in &mut rows {
            r.resize(columns.len(), Cell::Missing);
        }
        Self { columns, rows }
    }

    pub fn from_customers<'a, I>(customers: I) -> Self
    where
        I: IntoIterator<Item = &'a CustomerFeatures>,
    {
        let columns = NUMERIC_FEATURES
            .iter()
            .chain(CATEGORICAL_FEATURES.iter())
            .map(|c| c.to_string())
            .collect();
        let rows = customers
            .into_iter()
            .map(|c| {
                let mut row: Vec<Cell> = c.numeric_values().into_iter().map(Cell::Number).collect();
                row.push(Cell::Text(c.most_frequent_channel.clone()));
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, idx: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().map(move |r| &r[idx])
    }

    /// New table with the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }
}
