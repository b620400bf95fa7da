//! Token-level relevance metrics for paragraph ranking.
//!
//! The paragraph ranker needs one number per (paragraph, query) pair. The
//! metrics here are the classic reading-comprehension pair: multiset token
//! F1 and BLEU-4, both pure functions over token slices so callers can
//! swap in a different scorer without touching the ranker.

use std::collections::HashMap;

/// Multiset precision/recall/F1 between two token sequences.
///
/// Token counts are clipped (a token matching twice in the prediction but
/// once in the reference contributes once), the standard SQuAD-style
/// overlap.
#[must_use]
pub fn precision_recall_f1(prediction: &[String], ground_truth: &[String]) -> (f64, f64, f64) {
    if prediction.is_empty() || ground_truth.is_empty() {
        return (0.0, 0.0, 0.0);
    }

    let mut truth_counts: HashMap<&str, usize> = HashMap::new();
    for token in ground_truth {
        *truth_counts.entry(token.as_str()).or_insert(0) += 1;
    }

    let mut num_same = 0usize;
    for token in prediction {
        if let Some(count) = truth_counts.get_mut(token.as_str()) {
            if *count > 0 {
                *count -= 1;
                num_same += 1;
            }
        }
    }

    if num_same == 0 {
        return (0.0, 0.0, 0.0);
    }

    let p = num_same as f64 / prediction.len() as f64;
    let r = num_same as f64 / ground_truth.len() as f64;
    let f1 = 2.0 * p * r / (p + r);
    (p, r, f1)
}

/// Token F1, the third component of [`precision_recall_f1`].
#[must_use]
pub fn f1_score(prediction: &[String], ground_truth: &[String]) -> f64 {
    precision_recall_f1(prediction, ground_truth).2
}

/// Token recall, the second component of [`precision_recall_f1`].
#[must_use]
pub fn recall(prediction: &[String], ground_truth: &[String]) -> f64 {
    precision_recall_f1(prediction, ground_truth).1
}

/// BLEU-4: geometric mean of clipped 1..4-gram precisions with brevity
/// penalty. Unsmoothed: a candidate sharing no 4-gram with the reference
/// scores 0, which is the desired behavior for ranking short paragraphs
/// (F1 carries the signal there).
#[must_use]
pub fn bleu4(prediction: &[String], ground_truth: &[String]) -> f64 {
    const MAX_N: usize = 4;

    if prediction.is_empty() || ground_truth.is_empty() {
        return 0.0;
    }

    let mut log_sum = 0.0f64;
    for n in 1..=MAX_N {
        let p = ngram_precision(prediction, ground_truth, n);
        if p == 0.0 {
            return 0.0;
        }
        log_sum += p.ln();
    }

    let c = prediction.len() as f64;
    let r = ground_truth.len() as f64;
    let bp = if c > r { 1.0 } else { (1.0 - r / c).exp() };

    bp * (log_sum / MAX_N as f64).exp()
}

fn ngram_precision(prediction: &[String], ground_truth: &[String], n: usize) -> f64 {
    if prediction.len() < n {
        return 0.0;
    }

    let mut truth_counts: HashMap<&[String], usize> = HashMap::new();
    for gram in ground_truth.windows(n) {
        *truth_counts.entry(gram).or_insert(0) += 1;
    }

    let mut clipped = 0usize;
    let mut total = 0usize;
    for gram in prediction.windows(n) {
        total += 1;
        if let Some(count) = truth_counts.get_mut(gram) {
            if *count > 0 {
                *count -= 1;
                clipped += 1;
            }
        }
    }

    if total == 0 {
        0.0
    } else {
        clipped as f64 / total as f64
    }
}

/// Maximum of `metric` over a set of references.
#[must_use]
pub fn metric_max_over_ground_truths<F>(metric: F, prediction: &[String], ground_truths: &[Vec<String>]) -> f64
where
    F: Fn(&[String], &[String]) -> f64,
{
    ground_truths
        .iter()
        .map(|gt| metric(prediction, gt))
        .fold(0.0, f64::max)
}

/// Default paragraph relevance scorer: mean of token F1 and BLEU-4.
///
/// Bounded in `[0, 1]` and monotone in both components. This is the
/// function the ranker receives by default; callers with a better scorer
/// pass their own.
#[must_use]
pub fn para_match_score(candidate: &[String], reference: &[String]) -> f64 {
    0.5 * f1_score(candidate, reference) + 0.5 * bleu4(candidate, reference)
}
