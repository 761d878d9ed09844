//! Proxy risk labeling: RFM metrics, k-means over their log-scaled form, and
//! the least-recently-active cluster marked high risk.

mod engine;
mod rfm;

pub use engine::{ClusterSummary, ProxyLabeler, ProxyLabels, RiskLabel};
pub use rfm::{compute_rfm, RfmRecord, RfmTable};
