use error_stack::{Report, ResultExt};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::parsing::{Dictionary, get_optional_float, get_optional_string, get_string};

/// Descriptive and fundamental data for a single instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerInformation {
    pub symbol: String,
    pub sector: String,
    pub industry: String,
    pub short_name: String,
    pub long_name: Option<String>,
    pub market_cap: Option<f64>,
    pub previous_close: Option<f64>,
    pub regular_market_open: Option<f64>,
    pub regular_market_price: Option<f64>,
    pub regular_market_volume: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub forward_pe: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub beta: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
    pub average_volume: Option<f64>,
    pub shares_outstanding: Option<f64>,
}

/// Build a `TickerInformation` from the provider's flat info dictionary.
///
/// `symbol`, `sector`, `industry` and `shortName` are mandatory; every other
/// field is optional but must have the expected type when present.
pub fn parse_ticker_information(
    info: &Dictionary,
) -> Result<TickerInformation, Report<ParseError>> {
    let symbol = get_string(info, "symbol")?;
    let float = |field: &'static str| {
        get_optional_float(info, field).attach_with(|| format!("symbol: {symbol}"))
    };

    Ok(TickerInformation {
        sector: get_string(info, "sector")?,
        industry: get_string(info, "industry")?,
        short_name: get_string(info, "shortName")?,
        long_name: get_optional_string(info, "longName")?,
        market_cap: float("marketCap")?,
        previous_close: float("previousClose")?,
        regular_market_open: float("regularMarketOpen")?,
        regular_market_price: float("regularMarketPrice")?,
        regular_market_volume: float("regularMarketVolume")?,
        trailing_pe: float("trailingPE")?,
        forward_pe: float("forwardPE")?,
        dividend_yield: float("dividendYield")?,
        beta: float("beta")?,
        fifty_two_week_high: float("fiftyTwoWeekHigh")?,
        fifty_two_week_low: float("fiftyTwoWeekLow")?,
        average_volume: float("averageVolume")?,
        shares_outstanding: float("sharesOutstanding")?,
        symbol,
    })
}
