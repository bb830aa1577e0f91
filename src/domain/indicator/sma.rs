//! Simple Moving Average.
//!
//! SMA(n)[i] = mean(P[i-n+1..=i]). Warmup: first (n-1) values are missing.

pub fn calculate_sma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let mut window_sum: f64 = values[..period].iter().sum();
    out[period - 1] = window_sum / period as f64;
    for i in period..values.len() {
        window_sum += values[i] - values[i - period];
        out[i] = window_sum / period as f64;
    }
    out
}
