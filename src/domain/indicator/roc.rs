//! ROC (Rate of Change) at the last value.
//!
//! ROC(n) = ((x[last] - x[last-n]) / x[last-n]) * 100
//! Undefined (None) when x[last-n] == 0 or fewer than n+1 values exist.

/// Percent change from `period` values back to the last value.
pub fn trailing_change_percent(inputs: &[f64], period: usize) -> Option<f64> {
    if period == 0 || inputs.len() <= period {
        return None;
    }
    let last = inputs.len() - 1;
    let prev = inputs[last - period];
    if prev == 0.0 {
        return None;
    }
    Some((inputs[last] - prev) / prev * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_over_period() {
        let out = trailing_change_percent(&[100.0, 110.0, 99.0], 1).unwrap();
        assert!((out - -10.0).abs() < 1e-12);
        let out = trailing_change_percent(&[100.0, 110.0, 99.0], 2).unwrap();
        assert!((out - -1.0).abs() < 1e-12);
    }

    #[test]
    fn zero_base_is_none() {
        assert_eq!(trailing_change_percent(&[0.0, 5.0], 1), None);
        assert_eq!(trailing_change_percent(&[5.0, 1.0], 0), None);
    }

    #[test]
    fn trailing_change_needs_period_plus_one_values() {
        assert_eq!(trailing_change_percent(&[100.0, 104.0], 1), Some(4.0));
        assert_eq!(trailing_change_percent(&[100.0, 104.0], 2), None);
    }
}
