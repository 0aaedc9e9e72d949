//! Evaluation metrics for validation reporting and early stopping.

/// Area under the ROC curve via the rank-sum statistic. Tied scores share
/// their average rank. Returns `None` unless both classes are present.
pub fn auc(scores: &[f64], labels: &[f64]) -> Option<f64> {
    debug_assert_eq!(scores.len(), labels.len());

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // 1-based average rank for the tie group [start, end)
        let rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }

    let positives = labels.iter().filter(|&&y| y >= 0.5).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let positive_rank_sum: f64 = ranks
        .iter()
        .zip(labels)
        .filter(|(_, y)| **y >= 0.5)
        .map(|(rank, _)| rank)
        .sum();
    let p = positives as f64;
    let n = negatives as f64;
    Some((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}

/// Mean binary cross-entropy of probabilities against 0/1 labels.
pub fn log_loss(probabilities: &[f64], labels: &[f64]) -> f64 {
    const EPS: f64 = 1e-15;
    if probabilities.is_empty() {
        return 0.0;
    }
    let total: f64 = probabilities
        .iter()
        .zip(labels)
        .map(|(&p, &y)| {
            let p = p.clamp(EPS, 1.0 - EPS);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    total / probabilities.len() as f64
}

/// Root mean squared error.
pub fn rmse(predictions: &[f64], targets: &[f64]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    let sse: f64 = predictions
        .iter()
        .zip(targets)
        .map(|(p, y)| (p - y).powi(2))
        .sum();
    (sse / predictions.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_and_inverted_auc() {
        let labels = [0.0, 0.0, 1.0, 1.0];
        assert_eq!(auc(&[0.1, 0.2, 0.8, 0.9], &labels), Some(1.0));
        assert_eq!(auc(&[0.9, 0.8, 0.2, 0.1], &labels), Some(0.0));
    }

    #[test]
    fn ties_count_half() {
        let labels = [0.0, 1.0];
        assert_eq!(auc(&[0.5, 0.5], &labels), Some(0.5));

        // pos {0.8, 0.5}, neg {0.5, 0.1}: pairs (0.8>0.5, 0.8>0.1, 0.5=0.5, 0.5>0.1) = 3.5/4
        let scores = [0.8, 0.5, 0.5, 0.1];
        let labels = [1.0, 1.0, 0.0, 0.0];
        assert_eq!(auc(&scores, &labels), Some(0.875));
    }

    #[test]
    fn single_class_has_no_auc() {
        assert_eq!(auc(&[0.1, 0.2], &[1.0, 1.0]), None);
    }

    #[test]
    fn log_loss_is_finite_at_extremes() {
        let loss = log_loss(&[0.0, 1.0], &[1.0, 0.0]);
        assert!(loss.is_finite());
        assert!(log_loss(&[0.99, 0.01], &[1.0, 0.0]) < 0.02);
    }

    #[test]
    fn rmse_basic() {
        assert_eq!(rmse(&[1.0, 3.0], &[1.0, 1.0]), 2.0_f64.sqrt());
    }
}
