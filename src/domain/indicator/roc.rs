//! Rate of Change.
//!
//! ROC(n)[i] = ((P[i] - P[i-n]) / P[i-n]) * 100, 0 when P[i-n] == 0.
//! Warmup: first n values are missing.

pub fn calculate_roc(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for i in period..values.len() {
        let prev = values[i - period];
        out[i] = if prev == 0.0 {
            0.0
        } else {
            (values[i] - prev) / prev * 100.0
        };
    }
    out
}
