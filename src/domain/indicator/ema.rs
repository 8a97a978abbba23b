//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) bars are invalid.

pub fn ema_values(inputs: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; inputs.len()];
    if period == 0 || inputs.len() < period {
        return out;
    }

    let mut ema = inputs[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(ema);

    for (i, &x) in inputs.iter().enumerate().skip(period) {
        ema = ema_step(ema, x, period);
        out[i] = Some(ema);
    }

    out
}

/// One EMA update with k = 2/(n+1).
pub fn ema_step(prev: f64, value: f64, period: usize) -> f64 {
    let k = 2.0 / (period as f64 + 1.0);
    value * k + prev * (1.0 - k)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_warmup() {
        let out = ema_values(&[10.0, 20.0, 30.0, 40.0, 50.0], 3);

        assert!(out[0].is_none());
        assert!(out[1].is_none());
        assert!(out[2].is_some());
        assert!(out[4].is_some());
    }

    #[test]
    fn ema_seed_is_sma() {
        let out = ema_values(&[10.0, 20.0, 30.0], 3);
        let expected_sma = (10.0 + 20.0 + 30.0) / 3.0;
        assert!((out[2].unwrap() - expected_sma).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_recursive_calculation() {
        let out = ema_values(&[10.0, 20.0, 30.0, 40.0, 50.0], 3);

        let k = 2.0 / 4.0;
        let sma = (10.0 + 20.0 + 30.0) / 3.0;
        let ema_3 = 40.0 * k + sma * (1.0 - k);
        let ema_4 = 50.0 * k + ema_3 * (1.0 - k);

        assert!((out[3].unwrap() - ema_3).abs() < f64::EPSILON);
        assert!((out[4].unwrap() - ema_4).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_period_1_tracks_input() {
        let out = ema_values(&[10.0, 20.0, 30.0], 1);
        assert_eq!(out, vec![Some(10.0), Some(20.0), Some(30.0)]);
    }

    #[test]
    fn ema_equal_prices() {
        let out = ema_values(&[100.0; 5], 3);
        for v in out.iter().skip(2) {
            assert!((v.unwrap() - 100.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn ema_short_input_is_all_none() {
        assert_eq!(ema_values(&[1.0, 2.0], 3), vec![None, None]);
        assert!(ema_values(&[], 3).is_empty());
    }
}
