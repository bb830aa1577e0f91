//! Price data access port trait.

use crate::domain::error::TraderError;
use crate::domain::series::PriceSeries;

pub trait DataPort {
    /// One timeframe of bars for `symbol`, ascending by time.
    fn fetch_series(&self, symbol: &str, timeframe: &str) -> Result<PriceSeries, TraderError>;

    /// Timeframes available for `symbol`.
    fn list_timeframes(&self, symbol: &str) -> Result<Vec<String>, TraderError>;
}
