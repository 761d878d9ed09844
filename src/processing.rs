//! Data-processing run: raw transactions in, one labeled row per customer out.

use crate::config::{DataConfig, LabelingConfig};
use crate::dataset::{self, JoinPolicy, LabeledCustomer, PROCESSED_FILE_NAME};
use crate::error::Result;
use crate::features::FeatureExtractor;
use crate::risk::ProxyLabeler;
use crate::transactions::{load_transactions, Transaction};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct ProcessingSummary {
    pub transactions: usize,
    pub customers: usize,
    pub high_risk: usize,
    pub dropped: usize,
    pub output_path: PathBuf,
}

/// Features and proxy labels for an in-memory transaction set.
pub fn build_dataset(
    transactions: &[Transaction],
    labeling: &LabelingConfig,
    policy: JoinPolicy,
) -> Result<(Vec<LabeledCustomer>, usize)> {
    let labels = ProxyLabeler::new(labeling.clone()).label(transactions)?;
    let features = FeatureExtractor::new().extract(transactions)?;
    let joined = dataset::join(features, &labels.labels, policy)?;
    let dropped = joined.unmatched_features.len() + joined.unmatched_labels.len();
    Ok((joined.rows, dropped))
}

/// Read `raw_path`, build the labeled dataset and write
/// `processed_credit_data.csv` into `output_dir` (created if missing).
pub fn run(
    raw_path: &Path,
    output_dir: &Path,
    labeling: &LabelingConfig,
    policy: JoinPolicy,
) -> Result<ProcessingSummary> {
    let transactions = load_transactions(raw_path)?;
    let (rows, dropped) = build_dataset(&transactions, labeling, policy)?;

    std::fs::create_dir_all(output_dir)?;
    let output_path = output_dir.join(PROCESSED_FILE_NAME);
    dataset::write_processed(&rows, BufWriter::new(File::create(&output_path)?))?;

    let summary = ProcessingSummary {
        transactions: transactions.len(),
        customers: rows.len(),
        high_risk: rows.iter().filter(|r| r.is_high_risk).count(),
        dropped,
        output_path,
    };
    info!(
        customers = summary.customers,
        high_risk = summary.high_risk,
        output = %summary.output_path.display(),
        "processed dataset written"
    );
    Ok(summary)
}

/// [`run`] with paths and policy taken from the data section.
pub fn run_with_config(data: &DataConfig, labeling: &LabelingConfig) -> Result<ProcessingSummary> {
    run(&data.raw_data_path, &data.processed_data_dir, labeling, data.join)
}
