//! Recency / Frequency / Monetary metrics per customer.

use crate::error::{PipelineError, Result};
use crate::transactions::Transaction;
use chrono::{DateTime, Duration, Utc};
use ndarray::{Array2, Axis};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct RfmRecord {
    pub customer_id: String,
    /// Whole days between the snapshot date and the customer's last transaction
    pub recency: i64,
    pub frequency: u64,
    pub monetary: f64,
}

#[derive(Debug, Clone)]
pub struct RfmTable {
    /// Latest transaction in the data set plus one day
    pub snapshot: DateTime<Utc>,
    /// Ordered by customer id
    pub records: Vec<RfmRecord>,
}

struct Accumulator {
    last_seen: DateTime<Utc>,
    count: u64,
    total: f64,
}

pub fn compute_rfm(transactions: &[Transaction]) -> Result<RfmTable> {
    let latest = transactions
        .iter()
        .map(|t| t.timestamp)
        .max()
        .ok_or_else(|| PipelineError::EmptyInput("transaction set".to_string()))?;
    let snapshot = latest + Duration::days(1);

    let mut per_customer: BTreeMap<&str, Accumulator> = BTreeMap::new();
    for t in transactions {
        let acc = per_customer
            .entry(t.customer_id.as_str())
            .or_insert(Accumulator {
                last_seen: t.timestamp,
                count: 0,
                total: 0.0,
            });
        acc.last_seen = acc.last_seen.max(t.timestamp);
        acc.count += 1;
        acc.total += t.value;
    }

    let records = per_customer
        .into_iter()
        .map(|(customer_id, acc)| RfmRecord {
            customer_id: customer_id.to_string(),
            recency: (snapshot - acc.last_seen).num_days(),
            frequency: acc.count,
            monetary: acc.total,
        })
        .collect();

    Ok(RfmTable { snapshot, records })
}

impl RfmTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `ln(x + 1)` of each metric, then column-wise standardization.
    pub fn standardized_log(&self) -> Result<Array2<f64>> {
        let mut m = Array2::<f64>::zeros((self.records.len(), 3));
        for (i, r) in self.records.iter().enumerate() {
            if r.monetary < 0.0 {
                return Err(PipelineError::Labeling(format!(
                    "customer {} has negative monetary total {}",
                    r.customer_id, r.monetary
                )));
            }
            m[[i, 0]] = (r.recency as f64).ln_1p();
            m[[i, 1]] = (r.frequency as f64).ln_1p();
            m[[i, 2]] = r.monetary.ln_1p();
        }
        Ok(standardize(m))
    }
}

/// Zero mean, unit population variance per column. Constant columns are only centered.
pub(crate) fn standardize(mut m: Array2<f64>) -> Array2<f64> {
    if m.nrows() == 0 {
        return m;
    }
    let Some(means) = m.mean_axis(Axis(0)) else {
        return m;
    };
    let stds = m.std_axis(Axis(0), 0.0);
    for (j, mut col) in m.axis_iter_mut(Axis(1)).enumerate() {
        let scale = if stds[j] > 0.0 && stds[j].is_finite() { stds[j] } else { 1.0 };
        let mean = means[j];
        col.mapv_inplace(|v| (v - mean) / scale);
    }
    m
}
