//! Feature aggregation: transactions → group by customer → behavioral stats → one row each.

use super::{BehavioralStats, CustomerFeatures};
use crate::error::{PipelineError, Result};
use crate::transactions::Transaction;
use std::collections::BTreeMap;

/// Stateless aggregator; output is ordered by customer id.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, transactions: &[Transaction]) -> Result<Vec<CustomerFeatures>> {
        if transactions.is_empty() {
            return Err(PipelineError::EmptyInput("transaction set".to_string()));
        }

        let mut groups: BTreeMap<&str, Vec<&Transaction>> = BTreeMap::new();
        for t in transactions {
            groups.entry(t.customer_id.as_str()).or_default().push(t);
        }

        let mut out = Vec::with_capacity(groups.len());
        for (customer_id, group) in groups {
            let stats = BehavioralStats::from_transactions(group.iter().copied());
            let most_frequent_channel = stats.top_channel.ok_or_else(|| {
                PipelineError::EmptyInput(format!("transactions of customer {customer_id}"))
            })?;
            out.push(CustomerFeatures {
                customer_id: customer_id.to_string(),
                total_transactions: stats.count,
                total_value: stats.sum,
                avg_value: stats.mean,
                std_value: stats.std_dev,
                unique_products: stats.unique_products,
                most_frequent_channel,
            });
        }
        tracing::debug!(customers = out.len(), "aggregated customer features");
        Ok(out)
    }
}
