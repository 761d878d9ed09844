//! Clusters customers on their RFM profile and labels the cluster with the
//! highest mean recency as high risk. The result is a proxy, not ground truth;
//! identical input and seed always reproduce the same labels.

use super::rfm::{compute_rfm, RfmTable};
use crate::config::LabelingConfig;
use crate::error::{PipelineError, Result};
use crate::transactions::Transaction;
use chrono::{DateTime, Utc};
use linfa::prelude::*;
use linfa_clustering::{KMeans, KMeansInit};
use linfa_nn::distance::L2Dist;
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLabel {
    pub customer_id: String,
    pub cluster: usize,
    pub is_high_risk: bool,
}

/// Means are over the raw (untransformed) RFM values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub cluster: usize,
    pub size: usize,
    pub mean_recency: f64,
    pub mean_frequency: f64,
    pub mean_monetary: f64,
}

#[derive(Debug, Clone)]
pub struct ProxyLabels {
    pub snapshot: DateTime<Utc>,
    pub high_risk_cluster: usize,
    /// Non-empty clusters, ascending by id
    pub clusters: Vec<ClusterSummary>,
    /// Ordered by customer id
    pub labels: Vec<RiskLabel>,
    pub inertia: f64,
}

impl ProxyLabels {
    pub fn high_risk_count(&self) -> usize {
        self.labels.iter().filter(|l| l.is_high_risk).count()
    }
}

pub struct ProxyLabeler {
    config: LabelingConfig,
}

impl ProxyLabeler {
    pub fn new(config: LabelingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LabelingConfig {
        &self.config
    }

    pub fn label(&self, transactions: &[Transaction]) -> Result<ProxyLabels> {
        let rfm = compute_rfm(transactions)?;
        self.label_rfm(&rfm)
    }

    pub fn label_rfm(&self, rfm: &RfmTable) -> Result<ProxyLabels> {
        let k = self.config.n_clusters;
        if k < 2 {
            return Err(PipelineError::Labeling(format!("n_clusters must be at least 2, got {k}")));
        }
        if rfm.len() < k {
            return Err(PipelineError::Labeling(format!(
                "{} customers cannot be split into {k} clusters",
                rfm.len()
            )));
        }

        let points = rfm.standardized_log()?;
        let dataset = DatasetBase::from(points.clone());
        let rng = StdRng::seed_from_u64(self.config.seed);
        let model = KMeans::params_with(k, rng, L2Dist)
            .n_runs(self.config.n_init.max(1))
            .max_n_iterations(self.config.max_iterations)
            .tolerance(self.config.tolerance)
            .init_method(KMeansInit::KMeansPlusPlus)
            .fit(&dataset)
            .map_err(|e| PipelineError::Labeling(e.to_string()))?;
        let assignments: Array1<usize> = model.predict(&points);

        let clusters = summarize(rfm, &assignments, k);
        let high_risk_cluster = pick_high_risk(&clusters)
            .ok_or_else(|| PipelineError::Labeling("clustering produced no clusters".to_string()))?;

        let labels = rfm
            .records
            .iter()
            .zip(assignments.iter())
            .map(|(r, &cluster)| RiskLabel {
                customer_id: r.customer_id.clone(),
                cluster,
                is_high_risk: cluster == high_risk_cluster,
            })
            .collect();

        for c in &clusters {
            info!(
                cluster = c.cluster,
                size = c.size,
                mean_recency = c.mean_recency,
                mean_frequency = c.mean_frequency,
                mean_monetary = c.mean_monetary,
                high_risk = c.cluster == high_risk_cluster,
                "rfm cluster"
            );
        }

        Ok(ProxyLabels {
            snapshot: rfm.snapshot,
            high_risk_cluster,
            clusters,
            labels,
            inertia: model.inertia(),
        })
    }
}

fn summarize(rfm: &RfmTable, assignments: &Array1<usize>, k: usize) -> Vec<ClusterSummary> {
    let mut sums = vec![(0usize, 0.0f64, 0.0f64, 0.0f64); k];
    for (r, &c) in rfm.records.iter().zip(assignments.iter()) {
        if let Some(s) = sums.get_mut(c) {
            s.0 += 1;
            s.1 += r.recency as f64;
            s.2 += r.frequency as f64;
            s.3 += r.monetary;
        }
    }
    sums.into_iter()
        .enumerate()
        .filter(|(_, s)| s.0 > 0)
        .map(|(cluster, (n, rec, freq, mon))| {
            let n_f = n as f64;
            ClusterSummary {
                cluster,
                size: n,
                mean_recency: rec / n_f,
                mean_frequency: freq / n_f,
                mean_monetary: mon / n_f,
            }
        })
        .collect()
}

/// Highest mean recency; the lowest cluster id wins a tie.
fn pick_high_risk(clusters: &[ClusterSummary]) -> Option<usize> {
    let mut best: Option<&ClusterSummary> = None;
    for c in clusters {
        if best.map_or(true, |b| c.mean_recency > b.mean_recency) {
            best = Some(c);
        }
    }
    best.map(|c| c.cluster)
}
