use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

/// Failures reported by a market-data provider.
///
/// The `Display` text of each variant is what callers see verbatim, so it is
/// phrased for the end user rather than for logs.
#[derive(Debug, Display, Error)]
pub enum ProviderError {
    #[display("failed to build HTTP client")]
    Client,
    #[display("No historical data found for ticker: {symbol}")]
    NoData { symbol: String },
    #[display("Error fetching historical data for ticker {symbol}: {reason}")]
    Lookup { symbol: String, reason: String },
    #[display("Company ticker {symbol} not found.")]
    TickerNotFound { symbol: String },
    #[display("Request to market data provider failed for ticker {symbol}")]
    Request { symbol: String },
    #[display("Failed to parse market data response for ticker {symbol}")]
    ResponseParse { symbol: String },
    #[display("Malformed record for ticker {symbol}: {detail}")]
    MalformedRecord { symbol: String, detail: String },
}

#[derive(Debug, Display, Error)]
pub enum ParseError {
    #[display("Field '{field}' is missing.")]
    MissingField { field: String },
    #[display("Field '{field}' is not a string.")]
    NotString { field: String },
    #[display("Field '{field}' is not a float or int.")]
    NotNumber { field: String },
}

/// Domain failures of a single tool request.
#[derive(Debug, Display, Error)]
pub enum ToolError {
    #[display("{name} must be positive, got: {value}")]
    InvalidParameter { name: &'static str, value: i64 },
    #[display(
        "Insufficient data for {indicator} calculation. \
         Need at least {required} candles/samples, but got {available} points. \
         Reason: 1) The period is too short for the interval, \
         2) or the interval is too big for the period. \
         Try a) increasing the period, b) reducing the interval, \
         c) or reducing the {remedy}."
    )]
    InsufficientData {
        indicator: &'static str,
        required: usize,
        available: usize,
        remedy: &'static str,
    },
    #[display("{message}")]
    UpstreamLookup { message: String },
    #[display("{message}")]
    MalformedRecord { message: String },
}

#[derive(Debug, Display, Error)]
pub enum ServerError {
    #[display("failed to read from transport")]
    Read,
    #[display("failed to write to transport")]
    Write,
    #[display("failed to encode message")]
    Encode,
}

#[derive(Debug, Display, Error)]
pub enum CatalogError {
    #[display("unknown tool: {name}")]
    UnknownTool { name: String },
    #[display("invalid arguments for tool {tool}")]
    InvalidArguments { tool: String },
    #[display("failed to encode result of tool {tool}")]
    Encode { tool: String },
}
