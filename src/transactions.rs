//! Raw transaction records and CSV ingestion.
//!
//! Input files carry one row per transaction with (at least) the columns
//! `TransactionId, CustomerId, ProductId, ChannelId, Value, TransactionStartTime`.
//! Any other column is ignored. Validation is fail-fast: the first bad row
//! aborts the load with its line number and field.

use crate::error::{PipelineError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// One immutable transaction row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub customer_id: String,
    pub product_id: String,
    pub channel_id: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        transaction_id: impl Into<String>,
        customer_id: impl Into<String>,
        product_id: impl Into<String>,
        channel_id: impl Into<String>,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            customer_id: customer_id.into(),
            product_id: product_id.into(),
            channel_id: channel_id.into(),
            value,
            timestamp,
        }
    }
}

/// Row as it appears in the file; every column optional so that absent
/// columns surface as field errors rather than serde errors.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRow {
    #[serde(rename = "TransactionId")]
    transaction_id: Option<String>,
    #[serde(rename = "CustomerId")]
    customer_id: Option<String>,
    #[serde(rename = "ProductId")]
    product_id: Option<String>,
    #[serde(rename = "ChannelId")]
    channel_id: Option<String>,
    #[serde(rename = "Value")]
    value: Option<f64>,
    #[serde(rename = "TransactionStartTime")]
    start_time: Option<String>,
}

fn required(field: &str, value: Option<String>, line: u64) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(PipelineError::invalid(line, field, "is missing")),
    }
}

impl RawRow {
    fn validate(self, line: u64) -> Result<Transaction> {
        let transaction_id = required("TransactionId", self.transaction_id, line)?;
        let customer_id = required("CustomerId", self.customer_id, line)?;
        let product_id = required("ProductId", self.product_id, line)?;
        let channel_id = required("ChannelId", self.channel_id, line)?;
        let value = self
            .value
            .ok_or_else(|| PipelineError::invalid(line, "Value", "is missing"))?;
        if !value.is_finite() {
            return Err(PipelineError::invalid(line, "Value", "is not a finite number"));
        }
        let raw_ts = required("TransactionStartTime", self.start_time, line)?;
        let timestamp = parse_timestamp(&raw_ts).ok_or_else(|| {
            PipelineError::invalid(
                line,
                "TransactionStartTime",
                format!("has unrecognized timestamp {raw_ts:?}"),
            )
        })?;
        Ok(Transaction {
            transaction_id,
            customer_id,
            product_id,
            channel_id,
            value,
            timestamp,
        })
    }
}

/// Parse RFC 3339, `YYYY-MM-DD[ T]HH:MM:SS` or `YYYY-MM-DD`. Naive values are UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Read transactions from any CSV source with a header row.
pub fn read_transactions<R: Read>(reader: R) -> Result<Vec<Transaction>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let mut out = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line());
        let row: RawRow = record.deserialize(Some(&headers))?;
        out.push(row.validate(line)?);
    }
    Ok(out)
}

/// Load and validate a raw transaction file.
pub fn load_transactions(path: &Path) -> Result<Vec<Transaction>> {
    let file = std::fs::File::open(path)?;
    let txs = read_transactions(file)?;
    if txs.is_empty() {
        return Err(PipelineError::EmptyInput(path.display().to_string()));
    }
    tracing::info!(path = %path.display(), rows = txs.len(), "loaded raw transactions");
    Ok(txs)
}
