use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::core::cache::{KeyValueCollection, YAHOO_TTL, cache_get, cache_put};
use crate::core::numeric::to_number;
use crate::core::quote::{QuoteRow, SourceTag};
use crate::core::source::QuoteSource;
use crate::providers::util::HttpFetcher;

/// Search hit types that only win when nothing better-typed is available.
const DEPRIORITIZED_TYPES: [&str; 4] = ["FUTURE", "OPTION", "INDEX", "CURRENCY"];

pub struct YahooFinanceProvider {
    base_url: String,
    http: HttpFetcher,
    cache: Arc<dyn KeyValueCollection>,
}

impl YahooFinanceProvider {
    pub fn new(base_url: &str, http: HttpFetcher, cache: Arc<dyn KeyValueCollection>) -> Self {
        YahooFinanceProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            cache,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct YahooQuoteResponse {
    quote_response: Option<QuoteResponseBody>,
}

#[derive(Deserialize, Debug)]
struct QuoteResponseBody {
    #[serde(default)]
    result: Vec<YahooQuote>,
}

// Numeric fields stay untyped: the endpoint sometimes wraps them as {"raw", "fmt"}.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct YahooQuote {
    symbol: Option<String>,
    long_name: Option<String>,
    short_name: Option<String>,
    regular_market_price: Option<Value>,
    post_market_price: Option<Value>,
    pre_market_price: Option<Value>,
    currency: Option<String>,
}

impl YahooQuote {
    fn price(&self) -> Option<f64> {
        [
            &self.regular_market_price,
            &self.post_market_price,
            &self.pre_market_price,
        ]
        .into_iter()
        .find_map(|field| field.as_ref().and_then(to_number))
    }

    fn name(&self) -> String {
        [&self.long_name, &self.short_name]
            .into_iter()
            .flatten()
            .map(|n| n.trim())
            .find(|n| !n.is_empty())
            .unwrap_or_default()
            .to_string()
    }

    fn into_row(self) -> QuoteRow {
        QuoteRow::new(
            SourceTag::Yahoo,
            self.name(),
            self.symbol.clone().unwrap_or_default(),
            self.price(),
            self.currency.as_deref().unwrap_or_default(),
        )
    }
}

#[derive(Deserialize, Debug)]
struct YahooSearchResponse {
    #[serde(default)]
    quotes: Vec<YahooSearchHit>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct YahooSearchHit {
    pub symbol: Option<String>,
    #[serde(rename = "quoteType")]
    pub quote_type: Option<String>,
}

/// First hit whose type is not deprioritized, otherwise the first hit with a symbol.
pub fn pick_search_symbol(hits: &[YahooSearchHit]) -> Option<String> {
    let with_symbol = || {
        hits.iter()
            .filter(|h| h.symbol.as_deref().is_some_and(|s| !s.trim().is_empty()))
    };
    with_symbol()
        .find(|h| {
            let kind = h.quote_type.as_deref().unwrap_or_default().to_uppercase();
            !DEPRIORITIZED_TYPES.contains(&kind.as_str())
        })
        .or_else(|| with_symbol().next())
        .and_then(|h| h.symbol.clone())
}

impl YahooFinanceProvider {
    async fn try_fetch(&self, symbol: &str) -> Result<QuoteRow> {
        let url = format!(
            "{}/v7/finance/quote?symbols={}",
            self.base_url,
            urlencoding::encode(symbol)
        );
        let data: YahooQuoteResponse = self.http.get_json(&url).await?;
        let quote = data
            .quote_response
            .and_then(|body| body.result.into_iter().next())
            .ok_or_else(|| anyhow!("No quote data found for symbol: {}", symbol))?;
        Ok(quote.into_row())
    }

    /// Symbols returned by Yahoo's search endpoint for a free-text or ISIN query.
    pub async fn search(&self, query: &str) -> Result<Vec<YahooSearchHit>> {
        let url = format!(
            "{}/v1/finance/search?q={}&quotesCount=10&newsCount=0",
            self.base_url,
            urlencoding::encode(query)
        );
        let data: YahooSearchResponse = self.http.get_json(&url).await?;
        Ok(data.quotes)
    }
}

#[async_trait]
impl QuoteSource for YahooFinanceProvider {
    fn tag(&self) -> SourceTag {
        SourceTag::Yahoo
    }

    #[instrument(name = "YahooQuoteFetch", skip(self, _currency))]
    async fn fetch_quote(&self, identifier: &str, _currency: Option<&str>) -> QuoteRow {
        let symbol = identifier.trim().to_uppercase();
        if symbol.is_empty() {
            return QuoteRow::empty(SourceTag::Yahoo);
        }
        let key = format!("yahoo:{symbol}");
        if let Some(cached) = cache_get(self.cache.as_ref(), &key).await {
            return cached;
        }

        match self.try_fetch(&symbol).await {
            Ok(row) => {
                if row.has_data() {
                    cache_put(self.cache.as_ref(), &key, &row, YAHOO_TTL).await;
                }
                row
            }
            Err(e) => {
                warn!("Yahoo quote failed for {}: {:#}", symbol, e);
                QuoteRow::empty(SourceTag::Yahoo)
            }
        }
    }

    async fn fetch_by_isin(&self, isin: &str, _hint: Option<&str>) -> QuoteRow {
        let hits = match self.search(isin).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Yahoo search failed for {}: {:#}", isin, e);
                return QuoteRow::empty(SourceTag::Yahoo);
            }
        };
        match pick_search_symbol(&hits) {
            Some(symbol) => {
                debug!("Yahoo search resolved {} to {}", isin, symbol);
                self.fetch_quote(&symbol, None).await
            }
            None => {
                debug!("Yahoo search found no symbol for {}", isin);
                QuoteRow::empty(SourceTag::Yahoo)
            }
        }
    }
}
