use std::num::NonZeroUsize;

use crate::indicator::Indicator;

/// Simple Moving Average.
pub struct Sma {
    window: usize,
}

impl Sma {
    pub fn new(window: NonZeroUsize) -> Self {
        Self {
            window: window.get(),
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        "sma"
    }

    fn required_candles(&self) -> usize {
        self.window
    }

    fn first_index(&self) -> usize {
        self.window - 1
    }

    fn calculate(&self, values: &[f64]) -> Vec<f64> {
        sma_values(values, self.window)
    }
}

/// Mean of every trailing `window`-sized slice of `prices`.
///
/// Returns `prices.len() - window + 1` values, or none when `window` is zero
/// or longer than the input.
pub fn sma_values(prices: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || prices.len() < window {
        return Vec::new();
    }
    prices
        .windows(window)
        .map(|w| w.iter().sum::<f64>() / window as f64)
        .collect()
}
