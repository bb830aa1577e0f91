//! Weighted Moving Average.
//!
//! O(n) sliding window.
//! WMA(n) = (1*P[i-n+1] + 2*P[i-n+2] + ... + n*P[i]) / (n*(n+1)/2)
//! Warmup: first (n-1) values are missing.

pub fn calculate_wma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }

    let divisor = (period * (period + 1)) as f64 / 2.0;
    let mut weighted_sum: f64 = 0.0;
    let mut window_sum: f64 = 0.0;

    for (i, value) in values.iter().enumerate() {
        if i < period {
            weighted_sum += (i + 1) as f64 * value;
            window_sum += value;
        } else {
            weighted_sum += period as f64 * value - window_sum;
            window_sum += value - values[i - period];
        }
        if i + 1 >= period {
            out[i] = weighted_sum / divisor;
        }
    }
    out
}
