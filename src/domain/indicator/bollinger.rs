//! Bollinger Bands.
//!
//! - Middle: SMA over n periods
//! - Upper: Middle + (up multiplier × StdDev)
//! - Lower: Middle - (down multiplier × StdDev)
//!
//! StdDev is the population standard deviation. Warmup: first (n-1) values
//! are missing.

use super::sma::calculate_sma;
use super::stddev::calculate_stddev;

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_DEVIATIONS: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn calculate_bollinger(
    values: &[f64],
    period: usize,
    deviations_up: f64,
    deviations_down: f64,
) -> BollingerBands {
    let middle = calculate_sma(values, period);
    let stddev = calculate_stddev(values, period);

    let upper = middle
        .iter()
        .zip(&stddev)
        .map(|(m, s)| m + deviations_up * s)
        .collect();
    let lower = middle
        .iter()
        .zip(&stddev)
        .map(|(m, s)| m - deviations_down * s)
        .collect();

    BollingerBands {
        upper,
        middle,
        lower,
    }
}
