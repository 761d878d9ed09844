//! Binary classification metrics for evaluating a trained pipeline.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    /// 0 when nothing was predicted positive
    pub precision: f64,
    /// 0 when the set has no positives
    pub recall: f64,
    pub f1_score: f64,
    pub roc_auc: f64,
}

impl ClassificationMetrics {
    /// `y_pred` are hard 0/1 decisions, `y_score` positive-class probabilities.
    pub fn compute(y_true: &[u8], y_pred: &[u8], y_score: &[f64]) -> Result<Self> {
        if y_true.is_empty() || y_true.len() != y_pred.len() || y_true.len() != y_score.len() {
            return Err(PipelineError::Training(format!(
                "metric inputs differ in length: {} / {} / {}",
                y_true.len(),
                y_pred.len(),
                y_score.len()
            )));
        }
        let (mut tp, mut fp, mut tn, mut fn_) = (0u64, 0u64, 0u64, 0u64);
        for (&t, &p) in y_true.iter().zip(y_pred) {
            match (t == 1, p == 1) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (false, false) => tn += 1,
                (true, false) => fn_ += 1,
            }
        }
        let ratio = |num: u64, den: u64| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1_score = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        let roc_auc = roc_auc(y_true, y_score).ok_or_else(|| {
            PipelineError::Training("ROC-AUC is undefined: evaluation split holds a single class".into())
        })?;

        Ok(Self {
            accuracy: ratio(tp + tn, tp + tn + fp + fn_),
            precision,
            recall,
            f1_score,
            roc_auc,
        })
    }

    pub fn as_map(&self) -> BTreeMap<String, f64> {
        [
            ("accuracy", self.accuracy),
            ("precision", self.precision),
            ("recall", self.recall),
            ("f1_score", self.f1_score),
            ("roc_auc", self.roc_auc),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

/// Area under the ROC curve via the rank-sum statistic; tied scores share
/// their average rank. `None` unless both classes are present.
pub fn roc_auc(y_true: &[u8], y_score: &[f64]) -> Option<f64> {
    let n_pos = y_true.iter().filter(|&&t| t == 1).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 || y_true.len() != y_score.len() {
        return None;
    }

    let mut order: Vec<usize> = (0..y_score.len()).collect();
    order.sort_by(|&a, &b| y_score[a].total_cmp(&y_score[b]));

    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && y_score[order[j + 1]] == y_score[order[i]] {
            j += 1;
        }
        // ranks are 1-based
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        rank_sum_pos += order[i..=j].iter().filter(|&&k| y_true[k] == 1).count() as f64 * avg_rank;
        i = j + 1;
    }

    let n_pos_f = n_pos as f64;
    Some((rank_sum_pos - n_pos_f * (n_pos_f + 1.0) / 2.0) / (n_pos_f * n_neg as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confusion_based_metrics() {
        let y_true = [1, 1, 0, 0, 1];
        let y_pred = [1, 0, 0, 1, 1];
        let scores = [0.9, 0.4, 0.2, 0.6, 0.8];
        let m = ClassificationMetrics::compute(&y_true, &y_pred, &scores).unwrap();
        assert!((m.accuracy - 0.6).abs() < 1e-12);
        assert!((m.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.f1_score - 2.0 / 3.0).abs() < 1e-12);
        // pairs (pos, neg): 0.9>0.2,0.9>0.6,0.4>0.2,0.4<0.6,0.8>0.2,0.8>0.6 → 5/6
        assert!((m.roc_auc - 5.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn auc_extremes_and_ties() {
        assert_eq!(roc_auc(&[0, 0, 1, 1], &[0.1, 0.2, 0.8, 0.9]), Some(1.0));
        assert_eq!(roc_auc(&[1, 1, 0, 0], &[0.1, 0.2, 0.8, 0.9]), Some(0.0));
        assert_eq!(roc_auc(&[0, 1], &[0.5, 0.5]), Some(0.5));
        assert_eq!(roc_auc(&[1, 1], &[0.5, 0.7]), None);
    }

    #[test]
    fn no_positive_predictions_gives_zero_precision() {
        let m = ClassificationMetrics::compute(&[1, 0], &[0, 0], &[0.4, 0.1]).unwrap();
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.f1_score, 0.0);
        assert_eq!(m.roc_auc, 1.0);
    }

    #[test]
    fn single_class_split_is_an_error() {
        assert!(ClassificationMetrics::compute(&[0, 0], &[0, 1], &[0.1, 0.9]).is_err());
    }
}
