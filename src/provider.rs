pub mod yahoo;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::ProviderError;
use crate::model::{AssetPriceHistory, Interval, Period};
use crate::parsing::Dictionary;

/// An external market-data source, used as `dyn MarketData`.
pub trait MarketData: Send + Sync {
    /// Fetch candles for `symbol`, oldest first.
    fn fetch_price_history(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> BoxFuture<'_, Result<AssetPriceHistory, Report<ProviderError>>>;

    /// Fetch the flat descriptive dictionary for `symbol`.
    fn fetch_ticker_info(&self, symbol: &str)
    -> BoxFuture<'_, Result<Dictionary, Report<ProviderError>>>;
}
