//! Output comparison between execution paths.

use log::warn;
use serde::Serialize;

/// Allowed distance of a probability head's sum from 1.
pub const SIMPLEX_TOLERANCE: f64 = 1e-3;

/// Element-wise difference statistics over the common prefix of two outputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct DiffStats {
    pub mae: f64,
    pub max_abs_diff: f64,
    pub n: usize,
    pub l2_norm: f64,
}

/// Compare `a` and `b` over `min(a.len(), b.len())` elements.
///
/// All statistics are 0 when nothing is compared.
pub fn diff_stats(a: &[f64], b: &[f64]) -> DiffStats {
    let n = a.len().min(b.len());
    if n == 0 {
        return DiffStats::default();
    }

    let mut sum = 0.0;
    let mut max_abs_diff = 0.0f64;
    let mut sum_sq = 0.0;
    for (x, y) in a.iter().zip(b) {
        let d = (x - y).abs();
        sum += d;
        sum_sq += d * d;
        max_abs_diff = max_abs_diff.max(d);
    }

    DiffStats {
        mae: sum / n as f64,
        max_abs_diff,
        n,
        l2_norm: sum_sq.sqrt(),
    }
}

/// Check that `values` sums to 1 within `tolerance`; logs a warning otherwise.
pub fn check_probability_simplex(label: &str, values: &[f64], tolerance: f64) -> bool {
    let sum: f64 = values.iter().sum();
    let ok = (sum - 1.0).abs() <= tolerance;
    if !ok {
        warn!("{label}: probability head sums to {sum:.6}, expected 1 ± {tolerance}");
    }
    ok
}

/// Numerically stable softmax.
pub fn softmax(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = values.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    let sum = if sum > 0.0 { sum } else { 1.0 };
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the largest value; the first one wins ties. NaN is never chosen.
pub fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_outputs_have_zero_diff() {
        let a = [0.1, 0.7, 0.2];
        let stats = diff_stats(&a, &a);
        assert_eq!(stats.mae, 0.0);
        assert_eq!(stats.max_abs_diff, 0.0);
        assert_eq!(stats.n, 3);
    }

    #[test]
    fn test_diff_is_symmetric() {
        let a = [0.5, -1.0, 2.0, 8.0];
        let b = [0.25, 1.0, 2.5];
        assert_eq!(diff_stats(&a, &b), diff_stats(&b, &a));
    }

    #[test]
    fn test_diff_values_and_truncation() {
        let stats = diff_stats(&[1.0, 2.0, 3.0], &[1.5, 1.0]);
        assert_eq!(stats.n, 2);
        assert!((stats.mae - 0.75).abs() < 1e-12);
        assert_eq!(stats.max_abs_diff, 1.0);
        assert!((stats.l2_norm - 1.25f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(diff_stats(&[], &[1.0]), DiffStats::default());
    }

    #[test]
    fn test_simplex_check() {
        assert!(check_probability_simplex("ok", &[0.2, 0.3, 0.5], SIMPLEX_TOLERANCE));
        assert!(check_probability_simplex("close", &[0.2, 0.3, 0.5005], SIMPLEX_TOLERANCE));
        assert!(!check_probability_simplex("off", &[0.2, 0.3, 0.6], SIMPLEX_TOLERANCE));
    }

    #[test]
    fn test_softmax_and_argmax() {
        let probs = softmax(&[1.0, 3.0, 2.0]);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert_eq!(argmax(&probs), Some(1));
        assert_eq!(argmax(&[2.0, 2.0]), Some(0));
        assert_eq!(argmax(&[]), None);
        assert!(softmax(&[]).is_empty());
    }
}
