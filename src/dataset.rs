//! Training data set: customer features joined with proxy labels, and the
//! processed CSV file that hands it from the processing step to training.

use crate::error::{PipelineError, Result};
use crate::features::{CustomerFeatures, CATEGORICAL_FEATURES};
use crate::model::{Cell, FeatureTable};
use crate::risk::RiskLabel;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::path::Path;
use tracing::warn;

pub const PROCESSED_FILE_NAME: &str = "processed_credit_data.csv";
pub const ID_COLUMN: &str = "CustomerId";
pub const TARGET_COLUMN: &str = "is_high_risk";

/// Handling of customers that appear in only one of the two inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPolicy {
    /// Inner join; unmatched customers are dropped with a warning
    #[default]
    DropUnmatched,
    /// Any unmatched customer fails the join
    Strict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledCustomer {
    #[serde(flatten)]
    pub features: CustomerFeatures,
    pub is_high_risk: bool,
}

#[derive(Debug, Clone, Default)]
pub struct JoinOutcome {
    pub rows: Vec<LabeledCustomer>,
    pub unmatched_features: Vec<String>,
    pub unmatched_labels: Vec<String>,
}

/// Inner join on customer id, keeping the order of `features`.
pub fn join(
    features: Vec<CustomerFeatures>,
    labels: &[RiskLabel],
    policy: JoinPolicy,
) -> Result<JoinOutcome> {
    let by_id: HashMap<&str, bool> = labels
        .iter()
        .map(|l| (l.customer_id.as_str(), l.is_high_risk))
        .collect();
    let feature_ids: HashSet<String> = features.iter().map(|f| f.customer_id.clone()).collect();

    let mut out = JoinOutcome::default();
    for f in features {
        match by_id.get(f.customer_id.as_str()) {
            Some(&is_high_risk) => out.rows.push(LabeledCustomer {
                features: f,
                is_high_risk,
            }),
            None => out.unmatched_features.push(f.customer_id),
        }
    }
    out.unmatched_labels = labels
        .iter()
        .filter(|l| !feature_ids.contains(&l.customer_id))
        .map(|l| l.customer_id.clone())
        .collect();

    let dropped = out.unmatched_features.len() + out.unmatched_labels.len();
    if dropped > 0 {
        if policy == JoinPolicy::Strict {
            return Err(PipelineError::Join(format!(
                "{} customers without a label, {} labels without features",
                out.unmatched_features.len(),
                out.unmatched_labels.len()
            )));
        }
        warn!(
            without_label = out.unmatched_features.len(),
            without_features = out.unmatched_labels.len(),
            "dropping unmatched customers from training data"
        );
    }
    Ok(out)
}

/// Flat CSV row; field order is the file's column order.
#[derive(Debug, Serialize)]
struct ProcessedRow<'a> {
    #[serde(rename = "CustomerId")]
    customer_id: &'a str,
    total_transactions: u64,
    total_value: f64,
    avg_value: f64,
    std_value: f64,
    unique_products: u64,
    most_frequent_channel: &'a str,
    is_high_risk: u8,
}

pub fn write_processed<W: Write>(rows: &[LabeledCustomer], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for r in rows {
        let f = &r.features;
        wtr.serialize(ProcessedRow {
            customer_id: &f.customer_id,
            total_transactions: f.total_transactions,
            total_value: f.total_value,
            avg_value: f.avg_value,
            std_value: f.std_value,
            unique_products: f.unique_products,
            most_frequent_channel: &f.most_frequent_channel,
            is_high_risk: u8::from(r.is_high_risk),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Model inputs and 0/1 targets read back from a processed file.
#[derive(Debug, Clone)]
pub struct TrainingData {
    pub table: FeatureTable,
    pub target: Vec<u8>,
}

impl TrainingData {
    pub fn from_rows(rows: &[LabeledCustomer]) -> Self {
        let features: Vec<&CustomerFeatures> = rows.iter().map(|r| &r.features).collect();
        Self {
            table: FeatureTable::from_customers(features),
            target: rows.iter().map(|r| u8::from(r.is_high_risk)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }
}

/// Every column other than the id and the target becomes a model input.
pub fn read_processed<R: Read>(reader: R) -> Result<TrainingData> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let target_idx = headers
        .iter()
        .position(|h| h == TARGET_COLUMN)
        .ok_or_else(|| PipelineError::invalid(1, TARGET_COLUMN, "column is missing"))?;
    let input_idx: Vec<usize> = (0..headers.len())
        .filter(|&i| i != target_idx && &headers[i] != ID_COLUMN)
        .collect();
    let columns: Vec<String> = input_idx.iter().map(|&i| headers[i].to_string()).collect();

    let mut rows = Vec::new();
    let mut target = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line());
        let label = match record.get(target_idx).map(str::trim) {
            Some("1") | Some("1.0") | Some("true") => 1,
            Some("0") | Some("0.0") | Some("false") => 0,
            other => {
                return Err(PipelineError::invalid(
                    line,
                    TARGET_COLUMN,
                    format!("must be 0 or 1, got {other:?}"),
                ))
            }
        };
        target.push(label);
        rows.push(
            input_idx
                .iter()
                .map(|&i| {
                    let raw = record.get(i).unwrap_or("");
                    if CATEGORICAL_FEATURES.contains(&&headers[i]) {
                        Cell::text(raw)
                    } else {
                        Cell::parse(raw)
                    }
                })
                .collect(),
        );
    }

    Ok(TrainingData {
        table: FeatureTable::new(columns, rows),
        target,
    })
}

pub fn load_processed(path: &Path) -> Result<TrainingData> {
    let file = std::fs::File::open(path)?;
    let data = read_processed(file)?;
    if data.is_empty() {
        return Err(PipelineError::EmptyInput(path.display().to_string()));
    }
    Ok(data)
}
