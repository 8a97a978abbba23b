//! Cross-sectional relative strength.
//!
//! Ranks every row of one date by its 1-month change. Ties share the average of
//! their 1-based ranks, so equal changes always get equal percentiles.

use crate::domain::metric_row::DailyMetricRow;

/// Fills `rs_percentile`, `vars_score` and `varw_score` on every row.
///
/// Rows without a 1-month change are left out of the population and keep
/// `None` for all three fields.
pub fn apply_relative_strength(rows: &mut [DailyMetricRow]) {
    let mut population: Vec<(usize, f64)> = rows
        .iter()
        .enumerate()
        .filter_map(|(i, r)| r.change_1m_percent.map(|c| (i, c)))
        .collect();

    population.sort_by(|a, b| {
        a.1.total_cmp(&b.1)
            .then_with(|| rows[a.0].symbol.cmp(&rows[b.0].symbol))
    });

    let percentiles = average_rank_percentiles(&population.iter().map(|p| p.1).collect::<Vec<_>>());

    for ((index, _), pct) in population.iter().zip(percentiles) {
        let row = &mut rows[*index];
        row.rs_percentile = Some(pct);
        row.vars_score = volatility_adjusted(pct, row.atr_percent);
        row.varw_score = volatility_adjusted(100.0 - pct, row.atr_percent);
    }
}

/// Percentile of each value in an ascending-sorted slice, in 0..=100.
pub fn average_rank_percentiles(sorted: &[f64]) -> Vec<f64> {
    let n = sorted.len();
    if n == 1 {
        return vec![50.0];
    }
    let mut out = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && sorted[end].total_cmp(&sorted[start]).is_eq() {
            end += 1;
        }
        // 1-based ranks start+1..=end
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        let pct = (avg_rank - 1.0) / (n - 1) as f64 * 100.0;
        out[start..end].fill(pct);
        start = end;
    }
    out
}

fn volatility_adjusted(score: f64, atr_percent: Option<f64>) -> Option<f64> {
    let atr_percent = atr_percent?;
    if atr_percent == 0.0 {
        None
    } else {
        Some(score / atr_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn distinct_values_spread_evenly() {
        let pct = average_rank_percentiles(&[-2.0, 0.0, 5.0, 10.0, 20.0]);
        assert_eq!(pct, vec![0.0, 25.0, 50.0, 75.0, 100.0]);
    }

    #[test]
    fn ties_share_the_average_rank() {
        let pct = average_rank_percentiles(&[1.0, 3.0, 3.0, 7.0]);
        assert_abs_diff_eq!(pct[0], 0.0);
        assert_abs_diff_eq!(pct[1], 50.0);
        assert_abs_diff_eq!(pct[2], 50.0);
        assert_abs_diff_eq!(pct[3], 100.0);
    }

    #[test]
    fn single_member_is_fiftieth_percentile() {
        assert_eq!(average_rank_percentiles(&[4.2]), vec![50.0]);
        assert!(average_rank_percentiles(&[]).is_empty());
    }

    proptest! {
        #[test]
        fn percentiles_stay_in_bounds(mut values in prop::collection::vec(-100.0f64..100.0, 1..200)) {
            values.sort_by(f64::total_cmp);
            let pct = average_rank_percentiles(&values);
            prop_assert_eq!(pct.len(), values.len());
            for w in pct.windows(2) {
                prop_assert!(w[0] <= w[1]);
            }
            for p in pct {
                prop_assert!((0.0..=100.0).contains(&p));
            }
        }
    }
}
