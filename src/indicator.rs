pub mod rsi;
pub mod sma;

use chrono::{DateTime, Utc};

use crate::model::{Candle, IndicatorPoint, IndicatorSeries, PriceSource};

/// A technical analysis indicator computed over a single price field.
///
/// Input values must be in ascending chronological order (oldest first).
pub trait Indicator: Send + Sync {
    /// Unique name of this indicator (e.g., "rsi", "sma").
    fn name(&self) -> &str;

    /// Minimum number of candles required to produce at least one output value.
    fn required_candles(&self) -> usize;

    /// Input index the first output value is aligned with.
    fn first_index(&self) -> usize;

    /// Calculate indicator values.
    ///
    /// Output `k` belongs to input index `first_index() + k`. Inputs shorter
    /// than `required_candles()` yield an empty vector.
    fn calculate(&self, values: &[f64]) -> Vec<f64>;
}

/// One price field of a candle sequence, index-aligned with its source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    pub timestamps: Vec<DateTime<Utc>>,
    pub values: Vec<f64>,
}

impl PriceSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Project candles onto `source`, keeping order and length.
pub fn extract_series(candles: &[Candle], source: PriceSource) -> PriceSeries {
    candles
        .iter()
        .map(|c| (c.timestamp, c.price(source)))
        .unzip::<_, _, Vec<_>, Vec<_>>()
        .into()
}

impl From<(Vec<DateTime<Utc>>, Vec<f64>)> for PriceSeries {
    fn from((timestamps, values): (Vec<DateTime<Utc>>, Vec<f64>)) -> Self {
        Self { timestamps, values }
    }
}

/// Run `indicator` over `series` and pair every output with its timestamp.
pub fn assemble(symbol: &str, series: &PriceSeries, indicator: &dyn Indicator) -> IndicatorSeries {
    let values = indicator.calculate(&series.values);
    let points = series.timestamps[indicator.first_index().min(series.len())..]
        .iter()
        .zip(values)
        .map(|(&timestamp, value)| IndicatorPoint { timestamp, value })
        .collect();

    IndicatorSeries {
        symbol: symbol.to_owned(),
        points,
    }
}
