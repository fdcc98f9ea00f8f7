//! CoinGecko markets endpoint
//!
//! The quote currency is whatever the caller asked for; it is not re-derived from
//! the payload.

use crate::core::cache::{KeyValueCollection, QUOTE_TTL, cache_get, cache_put};
use crate::core::numeric::to_number;
use crate::core::quote::{QuoteRow, SourceTag};
use crate::core::source::QuoteSource;
use crate::providers::util::HttpFetcher;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

const DEFAULT_VS_CURRENCY: &str = "EUR";

#[derive(Debug, Deserialize)]
struct CoinMarket {
    name: Option<String>,
    symbol: Option<String>,
    current_price: Option<Value>,
}

pub struct CoinGeckoProvider {
    base_url: String,
    http: HttpFetcher,
    cache: Arc<dyn KeyValueCollection>,
}

impl CoinGeckoProvider {
    pub fn new(base_url: &str, http: HttpFetcher, cache: Arc<dyn KeyValueCollection>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            cache,
        }
    }

    async fn try_fetch(&self, coin_id: &str, currency: &str) -> Result<QuoteRow> {
        let url = format!(
            "{}/coins/markets?vs_currency={}&ids={}",
            self.base_url,
            urlencoding::encode(&currency.to_lowercase()),
            urlencoding::encode(coin_id)
        );
        let markets: Vec<CoinMarket> = self.http.get_json(&url).await?;
        let coin = markets
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Coin {} not found in response", coin_id))?;

        Ok(QuoteRow::new(
            SourceTag::CoinGecko,
            coin.name.unwrap_or_default(),
            coin.symbol.unwrap_or_default().to_uppercase(),
            coin.current_price.as_ref().and_then(to_number),
            currency,
        ))
    }
}

#[async_trait]
impl QuoteSource for CoinGeckoProvider {
    fn tag(&self) -> SourceTag {
        SourceTag::CoinGecko
    }

    async fn fetch_quote(&self, identifier: &str, currency: Option<&str>) -> QuoteRow {
        let coin_id = identifier.trim().to_lowercase();
        if coin_id.is_empty() {
            return QuoteRow::empty(SourceTag::CoinGecko);
        }
        let currency = currency
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_VS_CURRENCY)
            .to_uppercase();

        let key = format!("coingecko:{coin_id}:{currency}");
        if let Some(cached) = cache_get(self.cache.as_ref(), &key).await {
            return cached;
        }

        match self.try_fetch(&coin_id, &currency).await {
            Ok(row) => {
                if row.has_data() {
                    cache_put(self.cache.as_ref(), &key, &row, QUOTE_TTL).await;
                }
                row
            }
            Err(e) => {
                warn!("CoinGecko quote failed for {}: {:#}", coin_id, e);
                QuoteRow::empty(SourceTag::CoinGecko)
            }
        }
    }
}
