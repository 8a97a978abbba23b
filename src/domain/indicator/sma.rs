//! Simple Moving Average over the trailing window.
//!
//! SMA(n) = mean(x[last-n+1..=last]). The window is summed directly so the
//! value does not depend on how much earlier history was loaded.

/// SMA of the trailing `period` values ending at the last element.
pub fn trailing_mean(inputs: &[f64], period: usize) -> Option<f64> {
    if period == 0 || inputs.len() < period {
        return None;
    }
    Some(inputs[inputs.len() - period..].iter().sum::<f64>() / period as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_mean_uses_last_window() {
        assert_eq!(trailing_mean(&[10.0, 1.0, 2.0, 3.0], 3), Some(2.0));
        assert_eq!(trailing_mean(&[1.0, 2.0], 3), None);
    }

    #[test]
    fn trailing_mean_zero_period() {
        assert_eq!(trailing_mean(&[1.0, 2.0], 0), None);
    }
}
