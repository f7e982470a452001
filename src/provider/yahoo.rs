use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use error_stack::{Report, ResultExt, bail};
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::model::{AssetPriceHistory, Candle, Interval, Period};
use crate::parsing::Dictionary;
use crate::provider::MarketData;

const QUOTE_SUMMARY_MODULES: &str = "assetProfile,price,summaryDetail,defaultKeyStatistics";

/// Yahoo Finance chart and quote-summary endpoints.
pub struct YahooFinance {
    client: reqwest::Client,
    base_url: String,
    cookie_url: String,
}

impl YahooFinance {
    pub fn new(config: &ProviderConfig) -> Result<Self, Report<ProviderError>> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .cookie_store(true)
            .build()
            .change_context(ProviderError::Client)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            cookie_url: config.cookie_url.clone(),
        })
    }

    async fn fetch_chart(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> Result<ChartResult, Report<ProviderError>> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let request = || ProviderError::Request {
            symbol: symbol.to_owned(),
        };

        let response = self
            .client
            .get(&url)
            .query(&[
                ("range", period.as_str()),
                ("interval", interval.as_str()),
                ("events", "div,splits"),
                ("includePrePost", "false"),
            ])
            .send()
            .await
            .change_context_lazy(request)?;

        // Lookup failures come back as a JSON body with a non-2xx status.
        let status = response.status();
        let envelope: ChartEnvelope = response
            .json()
            .await
            .change_context(ProviderError::ResponseParse {
                symbol: symbol.to_owned(),
            })
            .attach_with(|| format!("HTTP status: {status}"))?;

        if let Some(error) = envelope.chart.error {
            bail!(ProviderError::Lookup {
                symbol: symbol.to_owned(),
                reason: error.reason(),
            });
        }

        envelope
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| {
                Report::new(ProviderError::NoData {
                    symbol: symbol.to_owned(),
                })
            })
    }

    async fn fetch_crumb(&self, symbol: &str) -> Result<String, Report<ProviderError>> {
        let request = || ProviderError::Request {
            symbol: symbol.to_owned(),
        };

        // Only the session cookie matters; this endpoint answers 404 regardless.
        if let Err(e) = self.client.get(&self.cookie_url).send().await {
            warn!(error = %e, "cookie request failed");
        }

        let crumb = self
            .client
            .get(format!("{}/v1/test/getcrumb", self.base_url))
            .send()
            .await
            .change_context_lazy(request)?
            .error_for_status()
            .change_context_lazy(request)?
            .text()
            .await
            .change_context_lazy(request)?;

        Ok(crumb.trim().to_owned())
    }

    async fn fetch_quote_summary(&self, symbol: &str) -> Result<Dictionary, Report<ProviderError>> {
        let crumb = self.fetch_crumb(symbol).await?;
        let url = format!("{}/v10/finance/quoteSummary/{}", self.base_url, symbol);

        let response = self
            .client
            .get(&url)
            .query(&[("modules", QUOTE_SUMMARY_MODULES), ("crumb", crumb.as_str())])
            .send()
            .await
            .change_context(ProviderError::Request {
                symbol: symbol.to_owned(),
            })?;

        let status = response.status();
        let envelope: QuoteSummaryEnvelope = response
            .json()
            .await
            .change_context(ProviderError::ResponseParse {
                symbol: symbol.to_owned(),
            })
            .attach_with(|| format!("HTTP status: {status}"))?;

        let not_found = || ProviderError::TickerNotFound {
            symbol: symbol.to_owned(),
        };

        if let Some(error) = envelope.quote_summary.error {
            return Err(Report::new(not_found()).attach(error.reason()));
        }

        envelope
            .quote_summary
            .result
            .and_then(|results| results.into_iter().next())
            .map(|modules| flatten_modules(&modules))
            .ok_or_else(|| Report::new(not_found()))
    }
}

impl MarketData for YahooFinance {
    fn fetch_price_history(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> BoxFuture<'_, Result<AssetPriceHistory, Report<ProviderError>>> {
        let symbol = symbol.to_owned();
        Box::pin(async move {
            info!(symbol = %symbol, period = %period, interval = %interval, "fetching price history");

            let chart = self.fetch_chart(&symbol, period, interval).await?;
            let candles = chart.into_candles(&symbol)?;

            if candles.is_empty() {
                bail!(ProviderError::NoData { symbol });
            }

            debug!(symbol = %symbol, candles = candles.len(), "price history fetched");

            Ok(AssetPriceHistory {
                symbol,
                period,
                interval,
                candles,
            })
        })
    }

    fn fetch_ticker_info(
        &self,
        symbol: &str,
    ) -> BoxFuture<'_, Result<Dictionary, Report<ProviderError>>> {
        let symbol = symbol.to_owned();
        Box::pin(async move {
            info!(symbol = %symbol, "fetching ticker information");
            self.fetch_quote_summary(&symbol).await
        })
    }
}

/// Merge quote-summary modules into one dictionary.
///
/// `{"raw": x, "fmt": ...}` wrappers are unwrapped to `x`, empty objects are
/// dropped and the first module defining a key wins.
fn flatten_modules(modules: &Dictionary) -> Dictionary {
    let mut flat = Dictionary::new();
    for module in modules.values().filter_map(Value::as_object) {
        for (key, value) in module {
            let value = match value {
                Value::Object(inner) if inner.is_empty() => continue,
                Value::Object(inner) if inner.contains_key("raw") => inner["raw"].clone(),
                other => other.clone(),
            };
            flat.entry(key.clone()).or_insert(value);
        }
    }
    flat
}

// ── REST response types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct UpstreamError {
    code: Option<String>,
    description: Option<String>,
}

impl UpstreamError {
    fn reason(&self) -> String {
        self.description
            .clone()
            .or_else(|| self.code.clone())
            .unwrap_or_else(|| "unknown error".into())
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<UpstreamError>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    events: ChartEvents,
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartEvents {
    #[serde(default)]
    dividends: HashMap<String, DividendEvent>,
    #[serde(default)]
    splits: HashMap<String, SplitEvent>,
}

#[derive(Debug, Deserialize)]
struct DividendEvent {
    amount: f64,
    date: i64,
}

#[derive(Debug, Deserialize)]
struct SplitEvent {
    date: i64,
    numerator: f64,
    denominator: f64,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

impl ChartResult {
    /// Zip the column arrays into candles and attach corporate actions.
    ///
    /// Bars with no prices at all are skipped. A partially filled bar or
    /// columns of unequal length reject the whole response.
    fn into_candles(self, symbol: &str) -> Result<Vec<Candle>, Report<ProviderError>> {
        let malformed = |detail: String| ProviderError::MalformedRecord {
            symbol: symbol.to_owned(),
            detail,
        };

        let quote = self.indicators.quote.into_iter().next().unwrap_or_default();
        let n = self.timestamp.len();
        for (name, len) in [
            ("open", quote.open.len()),
            ("high", quote.high.len()),
            ("low", quote.low.len()),
            ("close", quote.close.len()),
        ] {
            if len != n {
                bail!(malformed(format!(
                    "column '{name}' has {len} values for {n} timestamps"
                )));
            }
        }

        let mut candles = Vec::with_capacity(n);
        for (i, &ts) in self.timestamp.iter().enumerate() {
            let prices = [quote.open[i], quote.high[i], quote.low[i], quote.close[i]];
            let (open, high, low, close) = match prices {
                [None, None, None, None] => continue,
                [Some(o), Some(h), Some(l), Some(c)] => (o, h, l, c),
                _ => bail!(malformed(format!("row {i} has missing prices"))),
            };
            let timestamp = DateTime::<Utc>::from_timestamp(ts, 0)
                .ok_or_else(|| Report::new(malformed(format!("row {i} has timestamp {ts}"))))?;

            candles.push(Candle {
                timestamp,
                open,
                high,
                low,
                close,
                volume: quote.volume.get(i).copied().flatten().unwrap_or(0),
                dividends: 0.0,
                stock_splits: 0.0,
            });
        }

        for dividend in self.events.dividends.values() {
            if let Some(candle) = containing_candle(&mut candles, dividend.date) {
                candle.dividends += dividend.amount;
            }
        }
        for split in self.events.splits.values() {
            if split.denominator == 0.0 {
                bail!(malformed(format!("split at {} has zero denominator", split.date)));
            }
            let ratio = split.numerator / split.denominator;
            if let Some(candle) = containing_candle(&mut candles, split.date) {
                candle.stock_splits = if candle.stock_splits == 0.0 {
                    ratio
                } else {
                    candle.stock_splits * ratio
                };
            }
        }

        Ok(candles)
    }
}

/// The last candle starting at or before `date` (unix seconds).
fn containing_candle(candles: &mut [Candle], date: i64) -> Option<&mut Candle> {
    let idx = candles.partition_point(|c| c.timestamp.timestamp() <= date);
    idx.checked_sub(1).map(|i| &mut candles[i])
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryEnvelope {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummaryBody,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryBody {
    result: Option<Vec<Dictionary>>,
    error: Option<UpstreamError>,
}
