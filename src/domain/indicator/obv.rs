//! On-Balance Volume.
//!
//! OBV[0] = volume[0]; then add the bar's volume on an up close, subtract it
//! on a down close, carry it on an unchanged close. No warmup.

pub fn calculate_obv(close: &[f64], volume: &[f64]) -> Vec<f64> {
    let n = close.len().min(volume.len());
    let mut out = Vec::with_capacity(n);
    let mut obv = 0.0;

    for i in 0..n {
        if i == 0 {
            obv = volume[0];
        } else if close[i] > close[i - 1] {
            obv += volume[i];
        } else if close[i] < close[i - 1] {
            obv -= volume[i];
        }
        out.push(obv);
    }
    out
}
