//! Population standard deviation.
//!
//! STDDEV = sqrt(sum((x - mean)^2) / n) over the whole window.

/// Mean and population standard deviation of a non-empty window.
pub fn mean_and_stddev(window: &[f64]) -> (f64, f64) {
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let variance = window
        .iter()
        .map(|x| {
            let diff = x - mean;
            diff * diff
        })
        .sum::<f64>()
        / n;
    (mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_window_has_zero_spread() {
        let (mean, sd) = mean_and_stddev(&[100.0; 5]);
        assert!((mean - 100.0).abs() < f64::EPSILON);
        assert!(sd.abs() < f64::EPSILON);
    }

    #[test]
    fn known_population_stddev() {
        let (_, sd) = mean_and_stddev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((sd - 2.0).abs() < 1e-10);
    }

    #[test]
    fn mean_and_stddev_pair() {
        let (mean, sd) = mean_and_stddev(&[10.0, 20.0, 30.0]);
        assert!((mean - 20.0).abs() < 1e-12);
        assert!((sd - (200.0_f64 / 3.0).sqrt()).abs() < 1e-12);
    }
}
