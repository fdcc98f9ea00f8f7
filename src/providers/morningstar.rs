//! Morningstar security screener, used as a secondary fund source

use crate::core::cache::{KeyValueCollection, QUOTE_TTL, cache_get, cache_put};
use crate::core::identifier::normalize_isin;
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

const DATA_POINTS: &str = "SecId%7CName%7CClosePrice%7CPriceCurrency%7CIsin";

#[derive(Debug, Deserialize)]
struct ScreenerResponse {
    #[serde(default)]
    rows: Vec<ScreenerRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ScreenerRow {
    sec_id: Option<String>,
    name: Option<String>,
    close_price: Option<Value>,
    price_currency: Option<String>,
    isin: Option<String>,
}

impl ScreenerRow {
    fn into_row(self) -> QuoteRow {
        let ticker = self.isin.or(self.sec_id).unwrap_or_default();
        QuoteRow::new(
            SourceTag::Morningstar,
            self.name.unwrap_or_default(),
            ticker,
            self.close_price.as_ref().and_then(to_number),
            self.price_currency.unwrap_or_default(),
        )
    }
}

pub struct MorningstarProvider {
    base_url: String,
    http: HttpFetcher,
    cache: Arc<dyn KeyValueCollection>,
}

impl MorningstarProvider {
    pub fn new(base_url: &str, http: HttpFetcher, cache: Arc<dyn KeyValueCollection>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            cache,
        }
    }

    async fn try_fetch(&self, term: &str) -> Result<QuoteRow> {
        let url = format!(
            "{}/security/screener?outputType=json&version=1&languageId=es-ES&securityDataPoints={}&term={}",
            self.base_url,
            DATA_POINTS,
            urlencoding::encode(term)
        );
        let response: ScreenerResponse = self.http.get_json(&url).await?;
        // Prefer the row whose ISIN matches exactly; the screener also returns fuzzy hits
        let mut rows = response.rows;
        let exact = rows.iter().position(|row| {
            row.isin
                .as_deref()
                .is_some_and(|isin| isin.eq_ignore_ascii_case(term))
        });
        let row = match exact {
            Some(idx) => rows.swap_remove(idx),
            None => rows
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("No screener rows for {}", term))?,
        };
        Ok(row.into_row())
    }
}

#[async_trait]
impl QuoteSource for MorningstarProvider {
    fn tag(&self) -> SourceTag {
        SourceTag::Morningstar
    }

    async fn fetch_quote(&self, identifier: &str, _currency: Option<&str>) -> QuoteRow {
        let term = normalize_isin(identifier);
        if term.is_empty() {
            return QuoteRow::empty(SourceTag::Morningstar);
        }
        let key = format!("morningstar:{term}");
        if let Some(cached) = cache_get(self.cache.as_ref(), &key).await {
            return cached;
        }

        match self.try_fetch(&term).await {
            Ok(row) => {
                if row.has_data() {
                    cache_put(self.cache.as_ref(), &key, &row, QUOTE_TTL).await;
                }
                row
            }
            Err(e) => {
                warn!("Morningstar lookup failed for {}: {:#}", term, e);
                QuoteRow::empty(SourceTag::Morningstar)
            }
        }
    }
}
