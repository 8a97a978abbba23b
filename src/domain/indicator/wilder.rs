//! Wilder's recursive smoothing, shared by ATR, RSI and ADX.
//!
//! - Seed: simple mean of the first n inputs (emitted at index n-1)
//! - Subsequent: S[t] = S[t-1] + (x[t] - S[t-1]) / n
//!
//! Equivalent to an EMA with weight 1/n.

pub fn wilder_values(inputs: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; inputs.len()];
    if period == 0 || inputs.len() < period {
        return out;
    }

    let n = period as f64;
    let mut smoothed = inputs[..period].iter().sum::<f64>() / n;
    out[period - 1] = Some(smoothed);

    for (i, &x) in inputs.iter().enumerate().skip(period) {
        smoothed += (x - smoothed) / n;
        out[i] = Some(smoothed);
    }

    out
}
