//! Google Finance quote page scraper

use crate::core::cache::{KeyValueCollection, QUOTE_TTL, cache_get, cache_put};
use crate::core::html::{Matcher, capture_text, first_match};
use crate::core::numeric::{first_number_like, parse_european_number, to_number_str};
use crate::core::quote::{QuoteRow, SourceTag};
use crate::core::source::QuoteSource;
use crate::providers::util::HttpFetcher;
use anyhow::{Result, bail};
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

static NAME_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""name"\s*:\s*"([^"]{1,200})""#).expect("valid name field regex")
});
static NAME_DIV_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"class="zzDege"[^>]*>([^<]+)<"#).expect("valid name div regex")
});
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title regex"));
static TITLE_TICKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]*\)\s*$").expect("valid title ticker regex"));

static CURRENCY_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"data-currency-code="([A-Za-z]{3})""#).expect("valid currency attr regex")
});
static CURRENCY_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""currency"\s*:\s*"([A-Za-z]{3})""#).expect("valid currency field regex")
});
static CURRENCY_SYMBOL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([€$£])\s?\d|\d\s?([€$£])").expect("valid currency symbol regex")
});

static PRICE_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"data-last-price="([^"]+)""#).expect("valid price attr regex")
});
static PRICE_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""price"\s*:\s*"?(-?[0-9][0-9.,]*)"#).expect("valid price field regex")
});
static PRICE_SYMBOL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[€$£]\s?(-?\d[\d.,]*)|(-?\d[\d.,]*)\s?[€$£]").expect("valid symbol price regex")
});

fn name_from_field(html: &str) -> Option<String> {
    capture_text(&NAME_FIELD_RE, html)
}

fn name_from_div(html: &str) -> Option<String> {
    capture_text(&NAME_DIV_RE, html)
}

fn name_from_title(html: &str) -> Option<String> {
    let title = capture_text(&TITLE_RE, html)?;
    let title = title.split(" - Google Finance").next().unwrap_or_default();
    let title = title.split(" Stock Price").next().unwrap_or_default();
    let title = TITLE_TICKER_RE.replace(title, "");
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

const NAME_MATCHERS: [Matcher<String>; 3] = [name_from_field, name_from_div, name_from_title];

fn currency_from_attr(html: &str) -> Option<String> {
    capture_text(&CURRENCY_ATTR_RE, html).map(|c| c.to_uppercase())
}

fn currency_from_field(html: &str) -> Option<String> {
    capture_text(&CURRENCY_FIELD_RE, html).map(|c| c.to_uppercase())
}

fn currency_from_symbol(html: &str) -> Option<String> {
    let caps = CURRENCY_SYMBOL_RE.captures(html)?;
    let symbol = caps.get(1).or_else(|| caps.get(2))?.as_str();
    let code = match symbol {
        "€" => "EUR",
        "$" => "USD",
        "£" => "GBP",
        _ => return None,
    };
    Some(code.to_string())
}

const CURRENCY_MATCHERS: [Matcher<String>; 3] =
    [currency_from_attr, currency_from_field, currency_from_symbol];

fn price_from_attr(html: &str) -> Option<f64> {
    PRICE_ATTR_RE
        .captures(html)
        .and_then(|caps| to_number_str(&caps[1]))
}

fn price_from_field(html: &str) -> Option<f64> {
    PRICE_FIELD_RE
        .captures(html)
        .and_then(|caps| to_number_str(&caps[1]))
}

fn price_near_symbol(html: &str) -> Option<f64> {
    PRICE_SYMBOL_RE.captures_iter(html).find_map(|caps| {
        let amount = caps.get(1).or_else(|| caps.get(2))?;
        parse_european_number(amount.as_str())
    })
}

const PRICE_MATCHERS: [Matcher<f64>; 4] = [
    price_from_attr,
    price_from_field,
    price_near_symbol,
    first_number_like,
];

/// Symbol forms to try: as given, then `TICKER:EXCH` swapped from `EXCH:TICKER`.
pub fn symbol_attempts(symbol: &str) -> Vec<String> {
    let mut attempts = vec![symbol.to_string()];
    if let Some((left, right)) = symbol.split_once(':')
        && !left.is_empty()
        && !right.is_empty()
    {
        attempts.push(format!("{right}:{left}"));
    }
    attempts
}

/// Extracts a row from a quote page. The ticker is the symbol form that was fetched.
pub fn parse_quote_page(html: &str, symbol: &str) -> QuoteRow {
    QuoteRow::new(
        SourceTag::GoogleFinance,
        first_match(html, &NAME_MATCHERS).unwrap_or_default(),
        symbol,
        first_match(html, &PRICE_MATCHERS),
        first_match(html, &CURRENCY_MATCHERS).unwrap_or_default(),
    )
}

pub struct GoogleFinanceProvider {
    base_url: String,
    http: HttpFetcher,
    cache: Arc<dyn KeyValueCollection>,
}

impl GoogleFinanceProvider {
    pub fn new(
        base_url: &str,
        http: HttpFetcher,
        cache: Arc<dyn KeyValueCollection>,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            cache,
        }
    }

    async fn try_fetch(&self, symbol: &str) -> Result<QuoteRow> {
        let mut last_error = None;
        for attempt in symbol_attempts(symbol) {
            let url = format!(
                "{}/quote/{}?hl=en",
                self.base_url,
                urlencoding::encode(&attempt).replace("%3A", ":")
            );
            match self.http.get_html(&url).await {
                Ok(html) => {
                    let row = parse_quote_page(&html, &attempt);
                    if row.has_data() {
                        return Ok(row);
                    }
                    debug!("Google Finance page for {} had no name or price", attempt);
                }
                Err(e) => last_error = Some(e),
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => bail!("No usable Google Finance page for {}", symbol),
        }
    }
}

#[async_trait]
impl QuoteSource for GoogleFinanceProvider {
    fn tag(&self) -> SourceTag {
        SourceTag::GoogleFinance
    }

    async fn fetch_quote(&self, identifier: &str, _currency: Option<&str>) -> QuoteRow {
        let symbol = identifier.trim().to_uppercase();
        if symbol.is_empty() {
            return QuoteRow::empty(SourceTag::GoogleFinance);
        }
        let key = format!("gf:{symbol}");
        if let Some(cached) = cache_get(self.cache.as_ref(), &key).await {
            return cached;
        }

        match self.try_fetch(&symbol).await {
            Ok(row) => {
                cache_put(self.cache.as_ref(), &key, &row, QUOTE_TTL).await;
                row
            }
            Err(e) => {
                warn!("Google Finance quote failed for {}: {:#}", symbol, e);
                QuoteRow::empty(SourceTag::GoogleFinance)
            }
        }
    }
}
