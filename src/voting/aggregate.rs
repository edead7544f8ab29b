use crate::voting::ranking::by_float;

/// Share of negative scores at or above which an option may be vetoed.
pub const VETO_NEG_SHARE: f64 = 0.33;

/// Summary statistics of one option's signed scores.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OptionStats {
    pub median: f64,
    pub p10: f64,
    pub p90: f64,
    pub mean: f64,
    pub neg_share: f64,
    pub veto: bool,
}

/// Maps a slider position in [0, 1] onto [-1, 1], 0.5 being neutral.
pub fn to_signed(value: f64) -> f64 {
    2.0 * value - 1.0
}

/// Linearly interpolated percentile of an ascending slice, `p` in [0, 1].
/// Returns 0 for an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }

    let rank = p * (n - 1) as f64;
    let lower = (rank.floor() as usize).min(n - 1);
    let upper = (lower + 1).min(n - 1);
    let frac = rank - lower as f64;

    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

pub fn is_vetoed(neg_share: f64, median: f64) -> bool {
    neg_share >= VETO_NEG_SHARE && median <= 0.0
}

/// Computes the statistics of a set of signed scores, veto flag included.
pub fn compute_stats(mut signed: Vec<f64>) -> OptionStats {
    if signed.is_empty() {
        return OptionStats::default();
    }

    signed.sort_by(by_float);

    let n = signed.len() as f64;
    let median = percentile(&signed, 0.5);
    let negatives = signed.iter().filter(|s| **s < 0.0).count();
    let neg_share = negatives as f64 / n;

    OptionStats {
        median,
        p10: percentile(&signed, 0.1),
        p90: percentile(&signed, 0.9),
        mean: signed.iter().sum::<f64>() / n,
        neg_share,
        veto: is_vetoed(neg_share, median),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn signed_conversion_covers_range() {
        assert!(close(to_signed(0.0), -1.0));
        assert!(close(to_signed(0.5), 0.0));
        assert!(close(to_signed(1.0), 1.0));
        assert!(close(to_signed(0.75), 0.5));
    }

    #[test]
    fn percentile_endpoints_are_min_and_max() {
        let sorted = vec![-0.9, -0.2, 0.1, 0.4, 0.7, 1.0];
        assert!(close(percentile(&sorted, 0.0), -0.9));
        assert!(close(percentile(&sorted, 1.0), 1.0));
    }

    #[test]
    fn percentile_median_matches_standard_median() {
        let odd = vec![-0.5, 0.0, 0.25, 0.5, 1.0];
        assert!(close(percentile(&odd, 0.5), 0.25));

        let even = vec![-0.5, 0.0, 0.5, 1.0];
        assert!(close(percentile(&even, 0.5), 0.25));
    }

    #[test]
    fn percentile_interpolates_between_neighbours() {
        // rank = 0.1 * 4 = 0.4 -> 0.0 + 0.4 * (1.0 - 0.0)
        let sorted = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        assert!(close(percentile(&sorted, 0.1), 0.4));
        assert!(close(percentile(&sorted, 0.9), 3.6));
    }

    #[test]
    fn single_score_fills_every_percentile() {
        let stats = compute_stats(vec![-0.3]);
        assert!(close(stats.median, -0.3));
        assert!(close(stats.p10, -0.3));
        assert!(close(stats.p90, -0.3));
        assert!(close(stats.mean, -0.3));
        assert!(close(stats.neg_share, 1.0));
        assert!(stats.veto);
    }

    #[test]
    fn empty_scores_yield_zero_stats() {
        let stats = compute_stats(Vec::new());
        assert_eq!(stats, OptionStats::default());
        assert!(!stats.veto);
    }

    #[test]
    fn worked_example_statistics() {
        let a = compute_stats(vec![0.8, 0.6, 0.4, -0.6, 0.2]);
        let b = compute_stats(vec![-0.8, -0.6, 0.6, -0.8, -0.4]);
        let c = compute_stats(vec![0.2, -0.2, 0.0, 0.4, -0.4]);

        assert!(close(a.median, 0.4));
        assert!(!a.veto);

        assert!(close(b.median, -0.6));
        assert!(close(b.neg_share, 0.8));
        assert!(b.veto);

        assert!(close(c.median, 0.0));
        assert!(close(c.neg_share, 0.4));
        assert!(c.veto);
    }

    #[test]
    fn exactly_neutral_median_with_enough_negatives_is_vetoed() {
        assert!(is_vetoed(0.33, 0.0));
        assert!(!is_vetoed(0.32, 0.0));
        assert!(!is_vetoed(0.5, 0.01));
    }

    #[test]
    fn raising_one_score_never_creates_a_veto() {
        let base = vec![-0.6, -0.2, 0.1, 0.3, 0.5, -0.1];
        let before = compute_stats(base.clone());

        for i in 0..base.len() {
            for bump in [0.05, 0.3, 1.0] {
                let mut raised = base.clone();
                raised[i] = (raised[i] + bump).min(1.0);
                let after = compute_stats(raised);

                assert!(after.neg_share <= before.neg_share + EPS);
                assert!(after.median >= before.median - EPS);
                assert!(!after.veto || before.veto);
            }
        }
    }
}
