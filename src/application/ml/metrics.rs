use crate::domain::ml::artifact::{ClassSupport, ModelMetrics};

/// Probability above which a row is predicted positive.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Scores a held-out set. Discrimination metrics are 0 when `y_true` has a single class.
pub fn evaluate(y_true: &[u8], probabilities: &[f64]) -> ModelMetrics {
    debug_assert_eq!(y_true.len(), probabilities.len());

    let positives = y_true.iter().filter(|&&y| y == 1).count();
    let negatives = y_true.len() - positives;
    let both_classes = positives > 0 && negatives > 0;

    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    let mut correct = 0usize;
    for (&y, &p) in y_true.iter().zip(probabilities) {
        let predicted = p > DECISION_THRESHOLD;
        match (predicted, y == 1) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, true) => fn_ += 1,
            (false, false) => {}
        }
        if predicted == (y == 1) {
            correct += 1;
        }
    }

    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    ModelMetrics {
        auc: if both_classes { roc_auc(y_true, probabilities) } else { 0.0 },
        pr_auc: if both_classes { pr_auc(y_true, probabilities) } else { 0.0 },
        accuracy: ratio(correct, y_true.len()),
        precision,
        recall,
        f1,
        support: ClassSupport {
            negative: negatives,
            positive: positives,
        },
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

/// Area under the ROC curve via the rank-sum statistic, averaging tied ranks.
pub fn roc_auc(y_true: &[u8], scores: &[f64]) -> f64 {
    let positives = y_true.iter().filter(|&&y| y == 1).count();
    let negatives = y_true.len() - positives;
    if positives == 0 || negatives == 0 {
        return 0.0;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based average rank of the tie block i..=j
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }

    let positive_rank_sum: f64 = y_true
        .iter()
        .zip(&ranks)
        .filter(|(y, _)| **y == 1)
        .map(|(_, r)| r)
        .sum();
    let p = positives as f64;
    (positive_rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64)
}

/// Area under the precision-recall curve (trapezoidal), anchored at recall 0 / precision 1.
pub fn pr_auc(y_true: &[u8], scores: &[f64]) -> f64 {
    let positives = y_true.iter().filter(|&&y| y == 1).count();
    if positives == 0 {
        return 0.0;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut points = vec![(0.0, 1.0)];
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut i = 0;
    while i < order.len() {
        let threshold = scores[order[i]];
        while i < order.len() && scores[order[i]] == threshold {
            if y_true[order[i]] == 1 {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        points.push((ratio(tp, positives), ratio(tp, tp + fp)));
        if tp == positives {
            break;
        }
    }

    points
        .windows(2)
        .map(|w| (w[1].0 - w[0].0) * (w[1].1 + w[0].1) / 2.0)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_separation() {
        let y = [0, 0, 1, 1];
        let p = [0.1, 0.2, 0.8, 0.9];
        let m = evaluate(&y, &p);
        assert!((m.auc - 1.0).abs() < 1e-12);
        assert!((m.pr_auc - 1.0).abs() < 1e-12);
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.precision, 1.0);
        assert_eq!(m.recall, 1.0);
        assert_eq!(m.f1, 1.0);
        assert_eq!(m.support, ClassSupport { negative: 2, positive: 2 });
    }

    #[test]
    fn test_auc_with_ties_and_inversions() {
        // One positive ties a negative, one positive beats both negatives.
        let y = [0, 1, 0, 1];
        let p = [0.3, 0.3, 0.1, 0.9];
        // Pairs: (0.3 vs 0.3)=0.5, (0.3 vs 0.1)=1, (0.9 vs 0.3)=1, (0.9 vs 0.1)=1 -> 3.5/4
        assert!((roc_auc(&y, &p) - 0.875).abs() < 1e-12);
    }

    #[test]
    fn test_single_class_defaults_to_zero() {
        let m = evaluate(&[0, 0, 0], &[0.9, 0.2, 0.6]);
        assert_eq!(m.auc, 0.0);
        assert_eq!(m.pr_auc, 0.0);
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert!((m.accuracy - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(m.support.positive, 0);
    }

    #[test]
    fn test_no_predicted_positives_gives_zero_precision() {
        let m = evaluate(&[1, 0], &[0.4, 0.1]);
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1, 0.0);
        assert_eq!(m.auc, 1.0);
    }

    #[test]
    fn test_pr_auc_partial() {
        // Ranking: 0.9(+), 0.8(-), 0.7(+)
        // Points: (0,1) -> (0.5,1) -> (0.5,0.5) -> (1,2/3)
        let area = pr_auc(&[1, 0, 1], &[0.9, 0.8, 0.7]);
        let expected = 0.5 * 1.0 + 0.0 + 0.5 * (0.5 + 2.0 / 3.0) / 2.0;
        assert!((area - expected).abs() < 1e-12);
    }
}
