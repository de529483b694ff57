use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of an insider filing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeType {
    Buy,
    Sell,
    /// Grants, option exercises and anything else the scraper does not map to Buy/Sell.
    Other,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Buy => "Buy",
            TradeType::Sell => "Sell",
            TradeType::Other => "Other",
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "Buy" => TradeType::Buy,
            "Sell" => TradeType::Sell,
            _ => TradeType::Other,
        })
    }
}

/// One insider filing as supplied by the trade store. Immutable input to the scoring pipeline.
///
/// Forward performance fields are fractions (0.05 == +5%) measured from the trade date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub ticker: String,
    #[serde(default)]
    pub company_name: Option<String>,
    pub insider_name: String,
    #[serde(default)]
    pub title: Option<String>,
    pub trade_type: TradeType,
    #[serde(default)]
    pub trade_flag: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub qty: Option<f64>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub filing_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub trade_date: Option<NaiveDate>,
    #[serde(default)]
    pub owned: Option<f64>,
    #[serde(default)]
    pub delta_own: Option<f64>,
    #[serde(default)]
    pub performance_1d: Option<f64>,
    #[serde(default)]
    pub performance_1w: Option<f64>,
    #[serde(default)]
    pub performance_1m: Option<f64>,
    #[serde(default)]
    pub performance_6m: Option<f64>,
}

impl TradeRecord {
    /// Minimal record; remaining fields are filled with struct update syntax.
    pub fn new(ticker: &str, insider_name: &str, trade_type: TradeType) -> Self {
        Self {
            ticker: ticker.to_string(),
            company_name: None,
            insider_name: insider_name.to_string(),
            title: None,
            trade_type,
            trade_flag: None,
            price: None,
            qty: None,
            value: None,
            filing_date: None,
            trade_date: None,
            owned: None,
            delta_own: None,
            performance_1d: None,
            performance_1w: None,
            performance_1m: None,
            performance_6m: None,
        }
    }

    pub fn is_buy(&self) -> bool {
        self.trade_type == TradeType::Buy
    }

    /// Notional value in USD: qty x price, falling back to the reported value
    /// when either leg is missing.
    pub fn notional(&self) -> f64 {
        match (self.qty, self.price) {
            (Some(qty), Some(price)) => qty * price,
            _ => self.value.unwrap_or(0.0),
        }
    }

    /// Reported value, or the computed notional when the filing omitted it.
    pub fn trade_value(&self) -> f64 {
        self.value.unwrap_or_else(|| self.notional())
    }
}

/// Parses the date formats found in the trade store (`2024-03-01` or `2024-03-01 16:05:12`).
pub fn parse_filing_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub fn parse_trade_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_filing_date(raw).map(|dt| dt.date()))
}
