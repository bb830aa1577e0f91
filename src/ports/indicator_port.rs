//! Indicator library port trait.

use crate::domain::error::TraderError;
use crate::domain::indicator::{IndicatorOutputs, IndicatorSpec};
use crate::domain::series::PriceSeries;

pub trait IndicatorPort {
    /// Whether `function` names an indicator this library can compute.
    fn supports(&self, function: &str) -> bool;

    /// Compute `spec` over `series`. Every output has one value per row.
    fn compute(
        &self,
        series: &PriceSeries,
        spec: &IndicatorSpec,
    ) -> Result<IndicatorOutputs, TraderError>;
}
