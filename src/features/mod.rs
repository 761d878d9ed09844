//! Customer-level behavioral features aggregated from raw transactions.

mod behavioral;
mod pipeline;

pub use behavioral::BehavioralStats;
pub use pipeline::FeatureExtractor;

use serde::{Deserialize, Serialize};

/// Numeric model inputs, in schema order.
pub const NUMERIC_FEATURES: [&str; 5] = [
    "total_transactions",
    "total_value",
    "avg_value",
    "std_value",
    "unique_products",
];

/// Categorical model inputs.
pub const CATEGORICAL_FEATURES: [&str; 1] = ["most_frequent_channel"];

/// One row per customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerFeatures {
    pub customer_id: String,
    pub total_transactions: u64,
    pub total_value: f64,
    pub avg_value: f64,
    /// Sample standard deviation; 0 for a single transaction
    pub std_value: f64,
    pub unique_products: u64,
    pub most_frequent_channel: String,
}

impl CustomerFeatures {
    /// Numeric features in [`NUMERIC_FEATURES`] order.
    pub fn numeric_values(&self) -> [f64; 5] {
        [
            self.total_transactions as f64,
            self.total_value,
            self.avg_value,
            self.std_value,
            self.unique_products as f64,
        ]
    }
}
