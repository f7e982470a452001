use std::sync::Arc;

use error_stack::{Report, ResultExt, bail};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::{CatalogError, ToolError};
use crate::model::{ErrorResponse, Interval, Period, PriceSource, ToolOutcome};
use crate::provider::MarketData;
use crate::tools::{self, DEFAULT_RSI_WINDOW, DEFAULT_SMA_WINDOW};

pub const GET_TICKER_INFORMATION: &str = "get_ticker_information";
pub const GET_ASSET_PRICE_HISTORY: &str = "get_asset_price_history";
pub const GET_RSI: &str = "get_rsi";
pub const GET_SMA: &str = "get_sma";

#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Structured result of one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResponse {
    pub is_error: bool,
    pub content: Value,
}

impl ToolResponse {
    /// Body of a `tools/call` result.
    pub fn into_call_result(self) -> Value {
        json!({
            "content": [{ "type": "text", "text": self.content.to_string() }],
            "structuredContent": self.content,
            "isError": self.is_error,
        })
    }
}

fn default_rsi_window() -> i64 {
    DEFAULT_RSI_WINDOW
}

fn default_sma_window() -> i64 {
    DEFAULT_SMA_WINDOW
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TickerArgs {
    ticker: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HistoryArgs {
    ticker: String,
    period: Period,
    interval: Interval,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RsiArgs {
    ticker: String,
    source: PriceSource,
    period: Period,
    interval: Interval,
    #[serde(default = "default_rsi_window", alias = "window")]
    candles: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SmaArgs {
    ticker: String,
    source: PriceSource,
    period: Period,
    interval: Interval,
    #[serde(default = "default_sma_window")]
    window: i64,
}

/// The set of tools exposed to remote callers.
pub struct ToolCatalog {
    provider: Arc<dyn MarketData>,
}

impl ToolCatalog {
    pub fn new(provider: Arc<dyn MarketData>) -> Self {
        Self { provider }
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let periods: Vec<&str> = Period::ALL.iter().map(|p| p.as_str()).collect();
        let intervals: Vec<&str> = Interval::ALL.iter().map(|i| i.as_str()).collect();
        let ticker = json!({
            "type": "string",
            "description": "Instrument symbol, e.g. \"AAPL\", \"^GSPC\" or \"BTC-USD\"."
        });
        let period = json!({
            "type": "string",
            "enum": periods,
            "description": "Time range of the history to fetch."
        });
        let interval = json!({
            "type": "string",
            "enum": intervals,
            "description": "Spacing between candles."
        });
        let source = json!({
            "type": "string",
            "enum": ["open", "high", "low", "close"],
            "description": "Candle field to compute from, typically \"close\"."
        });

        vec![
            ToolDescriptor {
                name: GET_TICKER_INFORMATION,
                description: "Get sector, industry, names, market capitalisation, valuation \
                              ratios and trading ranges of an instrument. Use it to check that \
                              a symbol exists before running any analysis on it.",
                input_schema: json!({
                    "type": "object",
                    "properties": { "ticker": ticker },
                    "required": ["ticker"],
                }),
            },
            ToolDescriptor {
                name: GET_ASSET_PRICE_HISTORY,
                description: "Get raw OHLCV candles with dividends and stock splits for an \
                              instrument. Prefer the indicator tools unless the raw history \
                              itself is needed.",
                input_schema: json!({
                    "type": "object",
                    "properties": { "ticker": ticker, "period": period, "interval": interval },
                    "required": ["ticker", "period", "interval"],
                }),
            },
            ToolDescriptor {
                name: GET_RSI,
                description: "Compute the Relative Strength Index, a momentum oscillator \
                              between 0 and 100 using Wilder smoothing. Values above 70 are \
                              usually read as overbought, below 30 as oversold.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "ticker": ticker,
                        "source": source,
                        "period": period,
                        "interval": interval,
                        "candles": {
                            "type": "integer",
                            "default": DEFAULT_RSI_WINDOW,
                            "description": "Lookback window in candles."
                        }
                    },
                    "required": ["ticker", "source", "period", "interval"],
                }),
            },
            ToolDescriptor {
                name: GET_SMA,
                description: "Compute the Simple Moving Average, the mean price over a \
                              trailing window. Each point is stamped with the last candle of \
                              its window.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "ticker": ticker,
                        "source": source,
                        "period": period,
                        "interval": interval,
                        "window": {
                            "type": "integer",
                            "default": DEFAULT_SMA_WINDOW,
                            "description": "Moving window in candles."
                        }
                    },
                    "required": ["ticker", "source", "period", "interval"],
                }),
            },
        ]
    }

    pub fn describe(&self, name: &str) -> Option<ToolDescriptor> {
        self.descriptors().into_iter().find(|d| d.name == name)
    }

    /// Validate `arguments` against the tool's schema and run it.
    ///
    /// Domain failures are part of a successful response; only unknown tools,
    /// invalid arguments and encoding failures are errors.
    pub async fn call(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<ToolResponse, Report<CatalogError>> {
        let provider = self.provider.as_ref();
        info!(tool = name, "tool called");

        match name {
            GET_TICKER_INFORMATION => {
                let args: TickerArgs = parse_args(name, arguments)?;
                encode(name, tools::fetch_ticker_information(provider, &args.ticker).await)
            }
            GET_ASSET_PRICE_HISTORY => {
                let args: HistoryArgs = parse_args(name, arguments)?;
                let result = tools::fetch_asset_price_history(
                    provider,
                    &args.ticker,
                    args.period,
                    args.interval,
                )
                .await;
                encode(name, result)
            }
            GET_RSI => {
                let args: RsiArgs = parse_args(name, arguments)?;
                let result = tools::compute_rsi(
                    provider,
                    &args.ticker,
                    args.source,
                    args.period,
                    args.interval,
                    args.candles,
                )
                .await;
                encode(name, result)
            }
            GET_SMA => {
                let args: SmaArgs = parse_args(name, arguments)?;
                let result = tools::compute_sma(
                    provider,
                    &args.ticker,
                    args.source,
                    args.period,
                    args.interval,
                    args.window,
                )
                .await;
                encode(name, result)
            }
            other => bail!(CatalogError::UnknownTool { name: other.into() }),
        }
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, Report<CatalogError>> {
    let arguments = match arguments {
        Value::Null => json!({}),
        other => other,
    };
    serde_json::from_value(arguments).change_context(CatalogError::InvalidArguments {
        tool: tool.into(),
    })
}

fn encode<T: Serialize>(
    tool: &str,
    result: Result<T, Report<ToolError>>,
) -> Result<ToolResponse, Report<CatalogError>> {
    let outcome = match result {
        Ok(value) => ToolOutcome::Success(value),
        Err(report) => {
            warn!(tool, error = %report.current_context(), "tool failed");
            ToolOutcome::Failure(ErrorResponse {
                message: report.current_context().to_string(),
            })
        }
    };

    let is_error = outcome.is_failure();
    let content = serde_json::to_value(&outcome)
        .change_context(CatalogError::Encode { tool: tool.into() })?;

    Ok(ToolResponse { is_error, content })
}
