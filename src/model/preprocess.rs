//! Column preprocessing: a declarative [`PreprocessorSpec`] that is fitted once on
//! training data into a [`FittedPreprocessor`], which is then reused unchanged
//! for every later transform (evaluation and serving).
//!
//! Output column order is numeric → one-hot → passthrough.

use super::table::FeatureTable;
use crate::error::{PipelineError, Result};
use crate::features::{CATEGORICAL_FEATURES, NUMERIC_FEATURES};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericImpute {
    Median,
    Mean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownCategory {
    /// Encode as all zeros
    Ignore,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Remainder {
    Passthrough,
    Drop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessorSpec {
    pub numeric: Vec<String>,
    pub numeric_impute: NumericImpute,
    pub standardize: bool,
    /// Imputed with the most frequent value, then one-hot encoded
    pub categorical: Vec<String>,
    pub handle_unknown: UnknownCategory,
    pub remainder: Remainder,
}

impl PreprocessorSpec {
    /// Median-impute + standardize the numeric features, mode-impute + one-hot
    /// the channel (unknown channels encode to zeros), pass everything else through.
    pub fn credit_default() -> Self {
        Self {
            numeric: NUMERIC_FEATURES.iter().map(|c| c.to_string()).collect(),
            numeric_impute: NumericImpute::Median,
            standardize: true,
            categorical: CATEGORICAL_FEATURES.iter().map(|c| c.to_string()).collect(),
            handle_unknown: UnknownCategory::Ignore,
            remainder: Remainder::Passthrough,
        }
    }

    pub fn fit(&self, table: &FeatureTable) -> Result<FittedPreprocessor> {
        if table.is_empty() {
            return Err(PipelineError::EmptyInput("preprocessor training table".to_string()));
        }

        let mut numeric = Vec::with_capacity(self.numeric.len());
        for name in &self.numeric {
            let idx = require_column(table, name)?;
            let observed = numeric_values(table, idx, name)?;
            let fill = match self.numeric_impute {
                NumericImpute::Median => median(&observed),
                NumericImpute::Mean => mean(&observed),
            }
            .ok_or_else(|| PipelineError::preprocessing(name, "all values are missing"))?;

            let imputed: Vec<f64> = table
                .column(idx)
                .map(|c| c.as_number().ok().flatten().unwrap_or(fill))
                .collect();
            let (center, scale) = if self.standardize {
                let m = mean(&imputed).unwrap_or(0.0);
                let var = imputed.iter().map(|v| (v - m).powi(2)).sum::<f64>() / imputed.len() as f64;
                let sd = var.sqrt();
                (m, if sd > 0.0 && sd.is_finite() { sd } else { 1.0 })
            } else {
                (0.0, 1.0)
            };
            numeric.push(NumericColumn {
                name: name.clone(),
                fill,
                center,
                scale,
            });
        }

        let mut categorical = Vec::with_capacity(self.categorical.len());
        for name in &self.categorical {
            let idx = require_column(table, name)?;
            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            for cell in table.column(idx) {
                if let Some(v) = cell.as_category() {
                    *counts.entry(v).or_default() += 1;
                }
            }
            // ascending keys + strict `>`: smallest value wins a tie
            let mut fill: Option<(&String, usize)> = None;
            for (value, &n) in &counts {
                if fill.map_or(true, |(_, best)| n > best) {
                    fill = Some((value, n));
                }
            }
            let fill = fill
                .map(|(v, _)| v.clone())
                .ok_or_else(|| PipelineError::preprocessing(name, "all values are missing"))?;
            categorical.push(CategoricalColumn {
                name: name.clone(),
                fill,
                categories: counts.into_keys().collect(),
            });
        }

        let passthrough = match self.remainder {
            Remainder::Drop => Vec::new(),
            Remainder::Passthrough => table
                .columns()
                .iter()
                .filter(|c| !self.numeric.contains(c) && !self.categorical.contains(c))
                .cloned()
                .collect(),
        };

        Ok(FittedPreprocessor {
            numeric,
            categorical,
            passthrough,
            handle_unknown: self.handle_unknown,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct NumericColumn {
    name: String,
    fill: f64,
    center: f64,
    scale: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CategoricalColumn {
    name: String,
    fill: String,
    /// Sorted, unique
    categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPreprocessor {
    numeric: Vec<NumericColumn>,
    categorical: Vec<CategoricalColumn>,
    passthrough: Vec<String>,
    handle_unknown: UnknownCategory,
}

impl FittedPreprocessor {
    /// Columns a table must provide to be transformed.
    pub fn input_columns(&self) -> Vec<&str> {
        self.numeric
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.categorical.iter().map(|c| c.name.as_str()))
            .chain(self.passthrough.iter().map(String::as_str))
            .collect()
    }

    pub fn n_features_out(&self) -> usize {
        self.numeric.len()
            + self.categorical.iter().map(|c| c.categories.len()).sum::<usize>()
            + self.passthrough.len()
    }

    pub fn feature_names_out(&self) -> Vec<String> {
        let mut names: Vec<String> = self.numeric.iter().map(|c| format!("num__{}", c.name)).collect();
        for c in &self.categorical {
            names.extend(c.categories.iter().map(|v| format!("cat__{}_{}", c.name, v)));
        }
        names.extend(self.passthrough.iter().map(|c| format!("remainder__{c}")));
        names
    }

    pub fn transform(&self, table: &FeatureTable) -> Result<Array2<f64>> {
        let num_idx = self
            .numeric
            .iter()
            .map(|c| require_column(table, &c.name))
            .collect::<Result<Vec<_>>>()?;
        let cat_idx = self
            .categorical
            .iter()
            .map(|c| require_column(table, &c.name))
            .collect::<Result<Vec<_>>>()?;
        let pass_idx = self
            .passthrough
            .iter()
            .map(|c| require_column(table, c))
            .collect::<Result<Vec<_>>>()?;

        let mut out = Array2::<f64>::zeros((table.len(), self.n_features_out()));
        for (i, row) in table.rows().iter().enumerate() {
            let mut j = 0;
            for (col, &idx) in self.numeric.iter().zip(&num_idx) {
                let v = row[idx]
                    .as_number()
                    .map_err(|t| PipelineError::preprocessing(&col.name, format!("{t:?} is not a number")))?
                    .unwrap_or(col.fill);
                out[[i, j]] = (v - col.center) / col.scale;
                j += 1;
            }
            for (col, &idx) in self.categorical.iter().zip(&cat_idx) {
                let value = row[idx].as_category().unwrap_or_else(|| col.fill.clone());
                match col.categories.binary_search(&value) {
                    Ok(pos) => out[[i, j + pos]] = 1.0,
                    Err(_) if self.handle_unknown == UnknownCategory::Ignore => {}
                    Err(_) => {
                        return Err(PipelineError::preprocessing(
                            &col.name,
                            format!("unknown category {value:?}"),
                        ))
                    }
                }
                j += col.categories.len();
            }
            for (name, &idx) in self.passthrough.iter().zip(&pass_idx) {
                out[[i, j]] = match row[idx].as_number() {
                    Ok(Some(v)) => v,
                    Ok(None) => return Err(PipelineError::preprocessing(name, "missing value")),
                    Err(t) => {
                        return Err(PipelineError::preprocessing(name, format!("{t:?} is not a number")))
                    }
                };
                j += 1;
            }
        }
        Ok(out)
    }
}

fn require_column(table: &FeatureTable, name: &str) -> Result<usize> {
    table
        .column_index(name)
        .ok_or_else(|| PipelineError::preprocessing(name, "column is missing"))
}

fn numeric_values(table: &FeatureTable, idx: usize, name: &str) -> Result<Vec<f64>> {
    let mut out = Vec::with_capacity(table.len());
    for cell in table.column(idx) {
        match cell.as_number() {
            Ok(Some(v)) => out.push(v),
            Ok(None) => {}
            Err(t) => return Err(PipelineError::preprocessing(name, format!("{t:?} is not a number"))),
        }
    }
    Ok(out)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}
