use std::num::NonZeroUsize;

use crate::indicator::Indicator;

/// RSI (Relative Strength Index) using Wilder's smoothing method.
pub struct Rsi {
    window: usize,
}

impl Rsi {
    pub fn new(window: NonZeroUsize) -> Self {
        Self {
            window: window.get(),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        "rsi"
    }

    fn required_candles(&self) -> usize {
        self.window + 1
    }

    fn first_index(&self) -> usize {
        self.window
    }

    fn calculate(&self, values: &[f64]) -> Vec<f64> {
        if values.len() < self.required_candles() {
            return Vec::new();
        }

        let deltas = price_deltas(values);
        let (gains, losses) = split_gains_losses(&deltas);
        let (avg_gains, avg_losses) = wilder_averages(&gains, &losses, self.window);
        let mut rsi = rsi_values(&avg_gains, &avg_losses, self.window);
        rsi.drain(..self.window);
        rsi
    }
}

/// First differences of `prices`; element 0 is always 0.
pub fn price_deltas(prices: &[f64]) -> Vec<f64> {
    let mut deltas = Vec::with_capacity(prices.len());
    if !prices.is_empty() {
        deltas.push(0.0);
        deltas.extend(prices.windows(2).map(|w| w[1] - w[0]));
    }
    deltas
}

/// Split deltas into non-negative gains and losses of the same length.
pub fn split_gains_losses(deltas: &[f64]) -> (Vec<f64>, Vec<f64>) {
    deltas
        .iter()
        .map(|&d| (d.max(0.0), (-d).max(0.0)))
        .unzip()
}

/// Wilder-smoothed average gain and loss series.
///
/// Both outputs have the input length. Indices below `window` hold 0.0 and
/// carry no meaning. Index `window` is seeded with the plain mean of
/// `gains[1..=window]` (index 0 is the always-zero first delta), later
/// indices follow `avg[i] = (avg[i-1] * (window - 1) + x[i]) / window`.
pub fn wilder_averages(gains: &[f64], losses: &[f64], window: usize) -> (Vec<f64>, Vec<f64>) {
    let n = gains.len().min(losses.len());
    let mut avg_gains = vec![0.0; n];
    let mut avg_losses = vec![0.0; n];

    if window == 0 || n <= window {
        return (avg_gains, avg_losses);
    }

    let w = window as f64;
    avg_gains[window] = gains[1..=window].iter().sum::<f64>() / w;
    avg_losses[window] = losses[1..=window].iter().sum::<f64>() / w;

    for i in window + 1..n {
        avg_gains[i] = (avg_gains[i - 1] * (w - 1.0) + gains[i]) / w;
        avg_losses[i] = (avg_losses[i - 1] * (w - 1.0) + losses[i]) / w;
    }

    (avg_gains, avg_losses)
}

/// RSI for every index from `window` on; lower indices hold 0.0.
pub fn rsi_values(avg_gains: &[f64], avg_losses: &[f64], window: usize) -> Vec<f64> {
    let n = avg_gains.len().min(avg_losses.len());
    let mut rsi = vec![0.0; n];
    for i in window.min(n)..n {
        rsi[i] = rsi_value(avg_gains[i], avg_losses[i]);
    }
    rsi
}

// A flat run (no gains, no losses) reports 100, not 50.
fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
