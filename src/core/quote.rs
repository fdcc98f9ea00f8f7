//! Quote row and source tag types

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Display;

/// Upstream a quote row was produced by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceTag {
    Yahoo,
    CoinGecko,
    Investing,
    GoogleFinance,
    Quefondos,
    Morningstar,
    /// Unrecognized source, rendered as an empty string.
    Unknown,
}

impl SourceTag {
    pub const ALL: [SourceTag; 6] = [
        SourceTag::Yahoo,
        SourceTag::CoinGecko,
        SourceTag::Investing,
        SourceTag::GoogleFinance,
        SourceTag::Quefondos,
        SourceTag::Morningstar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Yahoo => "YAHOO",
            SourceTag::CoinGecko => "COINGECKO",
            SourceTag::Investing => "INVESTING",
            SourceTag::GoogleFinance => "GOOGLEFINANCE",
            SourceTag::Quefondos => "QUEFONDOS",
            SourceTag::Morningstar => "MORNINGSTAR",
            SourceTag::Unknown => "",
        }
    }

    /// Parses a source name case-insensitively. Anything unrecognized maps to `Unknown`.
    pub fn parse(s: &str) -> Self {
        let upper = s.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str() == upper)
            .unwrap_or(SourceTag::Unknown)
    }
}

impl Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for SourceTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SourceTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(SourceTag::parse(&s))
    }
}

/// A single normalized quote. Exactly one row is produced per resolution call.
///
/// Every field except `source` and `timestamp` may be empty. `price` is either a
/// finite number or `None`; the constructor drops NaN and infinities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRow {
    pub name: String,
    pub ticker: String,
    pub price: Option<f64>,
    pub currency: String,
    pub source: SourceTag,
    pub timestamp: DateTime<Utc>,
}

impl QuoteRow {
    pub fn new(
        source: SourceTag,
        name: impl Into<String>,
        ticker: impl Into<String>,
        price: Option<f64>,
        currency: impl AsRef<str>,
    ) -> Self {
        Self {
            name: name.into().trim().to_string(),
            ticker: ticker.into().trim().to_string(),
            price: price.filter(|p| p.is_finite()),
            currency: currency.as_ref().trim().to_uppercase(),
            source,
            timestamp: Utc::now(),
        }
    }

    /// All-empty row carrying only the source tag and the current time.
    pub fn empty(source: SourceTag) -> Self {
        Self::new(source, "", "", None, "")
    }

    /// Price and currency are both present.
    pub fn is_complete(&self) -> bool {
        self.price.is_some() && !self.currency.is_empty()
    }

    pub fn has_data(&self) -> bool {
        self.price.is_some() || !self.name.is_empty()
    }

    /// Six-column rendering: Name, Ticker, Price, Currency, Source, ISO timestamp.
    pub fn to_columns(&self) -> [String; 6] {
        [
            self.name.clone(),
            self.ticker.clone(),
            self.price.map(|p| p.to_string()).unwrap_or_default(),
            self.currency.clone(),
            self.source.to_string(),
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        ]
    }
}
