//! Summary statistics over one customer's transactions.

use crate::transactions::Transaction;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BehavioralStats {
    pub count: u64,
    pub sum: f64,
    pub mean: f64,
    /// Sample (n - 1) standard deviation, 0 when count < 2
    pub std_dev: f64,
    pub unique_products: u64,
    /// Most used channel; ties go to the lexicographically smallest id
    pub top_channel: Option<String>,
}

impl BehavioralStats {
    pub fn from_transactions<'a, I>(transactions: I) -> Self
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let mut values: Vec<f64> = Vec::new();
        let mut products = HashSet::new();
        let mut channels: BTreeMap<&str, u64> = BTreeMap::new();

        for t in transactions {
            values.push(t.value);
            products.insert(t.product_id.as_str());
            *channels.entry(t.channel_id.as_str()).or_default() += 1;
        }

        let count = values.len() as u64;
        if count == 0 {
            return Self::default();
        }
        let sum: f64 = values.iter().sum();
        let mean = sum / count as f64;
        let std_dev = if count < 2 {
            0.0
        } else {
            let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (count - 1) as f64).sqrt()
        };

        // BTreeMap iterates ascending, strict `>` keeps the smallest id on ties
        let mut top: Option<(&str, u64)> = None;
        for (channel, n) in channels {
            if top.map_or(true, |(_, best)| n > best) {
                top = Some((channel, n));
            }
        }

        Self {
            count,
            sum,
            mean,
            std_dev,
            unique_products: products.len() as u64,
            top_channel: top.map(|(c, _)| c.to_string()),
        }
    }
}
