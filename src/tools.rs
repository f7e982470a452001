//! Request-level entry points behind each remote tool.
//!
//! Every failure is resolved into a `ToolError` report here; provider
//! messages are carried through without rewording.

use std::num::NonZeroUsize;

use error_stack::{Report, ResultExt, bail};
use tracing::{debug, info};

use crate::error::{ProviderError, ToolError};
use crate::indicator::rsi::Rsi;
use crate::indicator::sma::Sma;
use crate::indicator::{Indicator, assemble, extract_series};
use crate::model::{AssetPriceHistory, IndicatorSeries, Interval, Period, PriceSource};
use crate::provider::MarketData;
use crate::ticker::{TickerInformation, parse_ticker_information};

pub const DEFAULT_RSI_WINDOW: i64 = 14;
pub const DEFAULT_SMA_WINDOW: i64 = 20;

/// Descriptive data for `symbol`.
pub async fn fetch_ticker_information(
    provider: &dyn MarketData,
    symbol: &str,
) -> Result<TickerInformation, Report<ToolError>> {
    let info = provider
        .fetch_ticker_info(symbol)
        .await
        .map_err(from_provider)?;

    parse_ticker_information(&info).map_err(|report| {
        let message = report.current_context().to_string();
        report.change_context(ToolError::MalformedRecord { message })
    })
}

/// Raw candles for `symbol` exactly as the provider returned them.
pub async fn fetch_asset_price_history(
    provider: &dyn MarketData,
    symbol: &str,
    period: Period,
    interval: Interval,
) -> Result<AssetPriceHistory, Report<ToolError>> {
    provider
        .fetch_price_history(symbol, period, interval)
        .await
        .map_err(from_provider)
}

/// Relative Strength Index over `window` candles.
///
/// Emits one point per candle from index `window` on, so `n` candles yield
/// `n - window` points, each within `[0, 100]`.
pub async fn compute_rsi(
    provider: &dyn MarketData,
    symbol: &str,
    source: PriceSource,
    period: Period,
    interval: Interval,
    window: i64,
) -> Result<IndicatorSeries, Report<ToolError>> {
    let rsi = Rsi::new(positive_window("RSI window", window)?);
    compute_indicator(
        provider,
        symbol,
        source,
        period,
        interval,
        &rsi,
        Shortfall {
            indicator: "RSI",
            remedy: "number of RSI candles",
        },
    )
    .await
}

/// Simple Moving Average over `window` candles.
///
/// Point `k` is stamped with the last candle of its window, so `n` candles
/// yield `n - window + 1` points.
pub async fn compute_sma(
    provider: &dyn MarketData,
    symbol: &str,
    source: PriceSource,
    period: Period,
    interval: Interval,
    window: i64,
) -> Result<IndicatorSeries, Report<ToolError>> {
    let sma = Sma::new(positive_window("SMA window", window)?);
    compute_indicator(
        provider,
        symbol,
        source,
        period,
        interval,
        &sma,
        Shortfall {
            indicator: "SMA",
            remedy: "SMA window",
        },
    )
    .await
}

/// Wording of the insufficient-data message for one indicator.
struct Shortfall {
    indicator: &'static str,
    remedy: &'static str,
}

async fn compute_indicator(
    provider: &dyn MarketData,
    symbol: &str,
    source: PriceSource,
    period: Period,
    interval: Interval,
    indicator: &dyn Indicator,
    shortfall: Shortfall,
) -> Result<IndicatorSeries, Report<ToolError>> {
    let history = provider
        .fetch_price_history(symbol, period, interval)
        .await
        .map_err(from_provider)?;

    let available = history.candles.len();
    let required = indicator.required_candles();
    if available < required {
        bail!(ToolError::InsufficientData {
            indicator: shortfall.indicator,
            required,
            available,
            remedy: shortfall.remedy,
        });
    }

    let series = extract_series(&history.candles, source);
    let result = assemble(symbol, &series, indicator);

    info!(
        symbol,
        indicator = indicator.name(),
        source = %source,
        candles = available,
        points = result.points.len(),
        "indicator computed"
    );

    Ok(result)
}

fn positive_window(name: &'static str, value: i64) -> Result<NonZeroUsize, Report<ToolError>> {
    usize::try_from(value)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| Report::new(ToolError::InvalidParameter { name, value }))
        .attach_with(|| format!("{name} = {value}"))
}

fn from_provider(report: Report<ProviderError>) -> Report<ToolError> {
    let message = report.current_context().to_string();
    debug!(error = ?report, "provider request failed");

    let context = match report.current_context() {
        ProviderError::MalformedRecord { .. } => ToolError::MalformedRecord { message },
        _ => ToolError::UpstreamLookup { message },
    };
    report.change_context(context)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::indicator::tests::candles_from_closes;
    use crate::model::Candle;
    use crate::parsing::Dictionary;
    use futures::future::BoxFuture;
    use serde_json::json;

    /// In-memory provider returning canned responses.
    pub(crate) enum MockProvider {
        Candles(Vec<Candle>),
        Info(Dictionary),
        Fail(fn(&str) -> ProviderError),
    }

    impl MarketData for MockProvider {
        fn fetch_price_history(
            &self,
            symbol: &str,
            period: Period,
            interval: Interval,
        ) -> BoxFuture<'_, Result<AssetPriceHistory, Report<ProviderError>>> {
            let symbol = symbol.to_owned();
            Box::pin(async move {
                match self {
                    Self::Candles(candles) => Ok(AssetPriceHistory {
                        symbol,
                        period,
                        interval,
                        candles: candles.clone(),
                    }),
                    Self::Fail(error) => Err(Report::new(error(&symbol))),
                    Self::Info(_) => Err(Report::new(ProviderError::NoData { symbol })),
                }
            })
        }

        fn fetch_ticker_info(
            &self,
            symbol: &str,
        ) -> BoxFuture<'_, Result<Dictionary, Report<ProviderError>>> {
            let symbol = symbol.to_owned();
            Box::pin(async move {
                match self {
                    Self::Info(info) => Ok(info.clone()),
                    Self::Fail(error) => Err(Report::new(error(&symbol))),
                    Self::Candles(_) => Err(Report::new(ProviderError::TickerNotFound { symbol })),
                }
            })
        }
    }

    fn no_data(symbol: &str) -> ProviderError {
        ProviderError::NoData {
            symbol: symbol.to_owned(),
        }
    }

    fn malformed(symbol: &str) -> ProviderError {
        ProviderError::MalformedRecord {
            symbol: symbol.to_owned(),
            detail: "row 3 has missing prices".into(),
        }
    }

    async fn rsi(provider: &MockProvider, window: i64) -> Result<IndicatorSeries, Report<ToolError>> {
        compute_rsi(
            provider,
            "AAPL",
            PriceSource::Close,
            Period::Month1,
            Interval::Day1,
            window,
        )
        .await
    }

    async fn sma(provider: &MockProvider, window: i64) -> Result<IndicatorSeries, Report<ToolError>> {
        compute_sma(
            provider,
            "AAPL",
            PriceSource::Close,
            Period::Month1,
            Interval::Day1,
            window,
        )
        .await
    }

    fn rising(n: usize) -> Vec<Candle> {
        let closes: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
        candles_from_closes(&closes)
    }

    #[tokio::test]
    async fn rsi_emits_points_from_window_on() {
        let candles = rising(20);
        let provider = MockProvider::Candles(candles.clone());
        let series = rsi(&provider, DEFAULT_RSI_WINDOW).await.unwrap();

        assert_eq!(series.symbol, "AAPL");
        assert_eq!(series.points.len(), 20 - 14);
        for (k, point) in series.points.iter().enumerate() {
            assert_eq!(point.timestamp, candles[14 + k].timestamp);
            assert_eq!(point.value, 100.0);
        }
    }

    #[tokio::test]
    async fn rsi_values_within_bounds() {
        let closes = [
            10.0, 11.0, 10.5, 10.2, 12.0, 11.1, 11.9, 13.0, 12.2, 12.1, 11.0, 11.5, 12.7,
        ];
        let provider = MockProvider::Candles(candles_from_closes(&closes));
        let series = rsi(&provider, 4).await.unwrap();
        assert_eq!(series.points.len(), closes.len() - 4);
        assert!(
            series
                .points
                .iter()
                .all(|p| (0.0..=100.0).contains(&p.value))
        );
    }

    #[tokio::test]
    async fn rsi_insufficient_data_reports_counts() {
        let provider = MockProvider::Candles(rising(10));
        let err = rsi(&provider, 14).await.unwrap_err();
        let message = err.current_context().to_string();

        assert!(matches!(
            err.current_context(),
            ToolError::InsufficientData {
                required: 15,
                available: 10,
                ..
            }
        ));
        assert!(message.contains("Need at least 15"), "{message}");
        assert!(message.contains("got 10"), "{message}");
        assert!(message.contains("increasing the period"));
        assert!(message.contains("reducing the interval"));
        assert!(message.contains("reducing the number of RSI candles"));
    }

    #[tokio::test]
    async fn rsi_needs_more_candles_than_window() {
        let provider = MockProvider::Candles(rising(14));
        assert!(rsi(&provider, 14).await.is_err());

        let provider = MockProvider::Candles(rising(15));
        assert_eq!(rsi(&provider, 14).await.unwrap().points.len(), 1);
    }

    #[tokio::test]
    async fn rsi_rejects_non_positive_window() {
        let provider = MockProvider::Candles(rising(30));
        for window in [0, -3] {
            let err = rsi(&provider, window).await.unwrap_err();
            assert!(matches!(
                err.current_context(),
                ToolError::InvalidParameter { value, .. } if *value == window
            ));
            assert_eq!(
                err.current_context().to_string(),
                format!("RSI window must be positive, got: {window}")
            );
        }
    }

    #[tokio::test]
    async fn sma_points_align_with_window_end() {
        let candles = candles_from_closes(&[100.0, 102.0, 105.0, 103.0, 107.0, 110.0, 108.0]);
        let provider = MockProvider::Candles(candles.clone());
        let series = sma(&provider, 3).await.unwrap();

        let expected = [102.3333, 103.3333, 105.0, 106.6667, 108.3333];
        assert_eq!(series.points.len(), expected.len());
        for (k, (point, value)) in series.points.iter().zip(expected).enumerate() {
            assert_eq!(point.timestamp, candles[k + 2].timestamp);
            assert!((point.value - value).abs() < 1e-3);
        }
    }

    #[tokio::test]
    async fn sma_uses_requested_source() {
        let candles = candles_from_closes(&[10.0, 10.0, 10.0]);
        let provider = MockProvider::Candles(candles);
        let series = compute_sma(
            &provider,
            "AAPL",
            PriceSource::High,
            Period::Day5,
            Interval::Hour1,
            3,
        )
        .await
        .unwrap();
        assert_eq!(series.points.len(), 1);
        assert_eq!(series.points[0].value, 12.0);
    }

    #[tokio::test]
    async fn sma_insufficient_data_reports_counts() {
        let provider = MockProvider::Candles(rising(4));
        let err = sma(&provider, 5).await.unwrap_err();
        let message = err.current_context().to_string();
        assert!(message.contains("Need at least 5"), "{message}");
        assert!(message.contains("got 4"), "{message}");
        assert!(message.contains("reducing the SMA window"), "{message}");

        let provider = MockProvider::Candles(rising(5));
        assert_eq!(sma(&provider, 5).await.unwrap().points.len(), 1);
    }

    #[tokio::test]
    async fn sma_rejects_non_positive_window() {
        let provider = MockProvider::Fail(no_data);
        let err = sma(&provider, 0).await.unwrap_err();
        assert_eq!(
            err.current_context().to_string(),
            "SMA window must be positive, got: 0"
        );
    }

    #[tokio::test]
    async fn provider_failure_passes_through_verbatim() {
        let provider = MockProvider::Fail(no_data);
        let err = rsi(&provider, 14).await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            ToolError::UpstreamLookup { .. }
        ));
        assert_eq!(
            err.current_context().to_string(),
            "No historical data found for ticker: AAPL"
        );

        let err = fetch_asset_price_history(&provider, "ZZZZ", Period::Year1, Interval::Week1)
            .await
            .unwrap_err();
        assert_eq!(
            err.current_context().to_string(),
            "No historical data found for ticker: ZZZZ"
        );
    }

    #[tokio::test]
    async fn malformed_upstream_record_fails_request() {
        let provider = MockProvider::Fail(malformed);
        let err = sma(&provider, 3).await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            ToolError::MalformedRecord { .. }
        ));
        assert!(err.current_context().to_string().contains("row 3"));
    }

    #[tokio::test]
    async fn price_history_returns_candles_unchanged() {
        let candles = rising(3);
        let provider = MockProvider::Candles(candles.clone());
        let history = fetch_asset_price_history(&provider, "AAPL", Period::Month1, Interval::Day1)
            .await
            .unwrap();
        assert_eq!(history.candles, candles);
        assert_eq!(history.period, Period::Month1);
    }

    #[tokio::test]
    async fn ticker_information_is_parsed() {
        let info = json!({
            "symbol": "AAPL",
            "sector": "Technology",
            "industry": "Consumer Electronics",
            "shortName": "Apple Inc.",
            "beta": 1.2
        });
        let provider = MockProvider::Info(info.as_object().cloned().unwrap());
        let ticker = fetch_ticker_information(&provider, "AAPL").await.unwrap();
        assert_eq!(ticker.sector, "Technology");
        assert_eq!(ticker.beta, Some(1.2));
    }

    #[tokio::test]
    async fn ticker_information_missing_field_is_malformed() {
        let info = json!({ "symbol": "AAPL", "sector": "Technology" });
        let provider = MockProvider::Info(info.as_object().cloned().unwrap());
        let err = fetch_ticker_information(&provider, "AAPL").await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            ToolError::MalformedRecord { .. }
        ));
        assert_eq!(
            err.current_context().to_string(),
            "Field 'industry' is missing."
        );
    }

    #[tokio::test]
    async fn unknown_ticker_passes_through() {
        let provider = MockProvider::Candles(vec![]);
        let err = fetch_ticker_information(&provider, "NOPE").await.unwrap_err();
        assert_eq!(
            err.current_context().to_string(),
            "Company ticker NOPE not found."
        );
    }
}
