//! Investing.com instrument pages
//!
//! There is no API. Pages are located through the site search (ranked with
//! [`crate::core::ranking`]) and every field is recovered from markup with ordered
//! matcher lists. Currency detection is anchored on the price element so that
//! unrelated currency mentions elsewhere on the page are not picked up.

use crate::core::cache::{
    KeyValueCollection, QUOTE_TTL, RESOLVED_URL_TTL, cache_get, cache_put,
};
use crate::core::html::{Matcher, capture_text, first_match, head, window};
use crate::core::identifier::{Identifier, classify, find_isin};
use crate::core::numeric::{first_number_like, parse_european_number};
use crate::core::quote::{QuoteRow, SourceTag};
use crate::core::ranking::{hint_key, pick_best_link};
use crate::core::source::QuoteSource;
use crate::providers::util::{HttpFetcher, host_variants};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, instrument, warn};
use url::Url;

const WINDOW_BEFORE: usize = 600;
const WINDOW_AFTER: usize = 900;
const LABEL_SCAN_LIMIT: usize = 30_000;

const ISO_CODES: &str = "EUR|USD|GBP|CHF|JPY|CAD|AUD|NZD|SEK|NOK|DKK|PLN|CZK|HUF|RON|TRY|RUB|CNY|HKD|SGD|INR|KRW|MXN|BRL|ARS|CLP|ZAR|ILS";

static H1_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").expect("valid h1 regex"));
static NAME_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""name"\s*:\s*"([^"]{1,200})""#).expect("valid name field regex")
});
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title regex"));
static TITLE_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*[-|–]\s*Investing\.com.*$").expect("valid title suffix regex")
});

// Price anchors in priority order.
static PRICE_ANCHORS: LazyLock<[Regex; 5]> = LazyLock::new(|| {
    [
        r#"data-test="instrument-price-last"[^>]*>\s*([^<]+)<"#,
        r#"id="last_last"[^>]*>\s*([^<]+)<"#,
        r#"class="[^"]*instrument-price_last[^"]*"[^>]*>\s*([^<]+)<"#,
        r#"class="[^"]*pid-\d+-last[^"]*"[^>]*>\s*([^<]+)<"#,
        r#"itemprop="price"[^>]*content="([^"]+)""#,
    ]
    .map(|pattern| Regex::new(pattern).expect("valid price anchor regex"))
});

static STRUCTURED_CURRENCY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#""(?:priceCurrency|currency|quoted_currency)"\s*:\s*"([A-Za-z]{3})"|itemprop=["']priceCurrency["'][^>]*content=["']([A-Za-z]{3})["']"#,
    )
    .expect("valid structured currency regex")
});
static WINDOW_CURRENCY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b({ISO_CODES})\b|(€|£|¥|\$)")).expect("valid window currency regex")
});
static LABEL_CURRENCY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?s)(?i:Divisa|Moneda|Currency).{{0,40}}?\b({ISO_CODES})\b|\b({ISO_CODES})\b.{{0,40}}?(?i:Divisa|Moneda|Currency)"
    ))
    .expect("valid label currency regex")
});

static SYMBOL_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""symbol"\s*:\s*"([^"]{1,20})"|data-symbol="([^"]{1,20})""#)
        .expect("valid symbol regex")
});
static SLUG_LIKE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]+$").expect("valid slug regex"));

fn name_from_h1(html: &str) -> Option<String> {
    capture_text(&H1_RE, html)
}

fn name_from_field(html: &str) -> Option<String> {
    capture_text(&NAME_FIELD_RE, html)
}

fn name_from_title(html: &str) -> Option<String> {
    let title = capture_text(&TITLE_RE, html)?;
    let title = TITLE_SUFFIX_RE.replace(&title, "").trim().to_string();
    (!title.is_empty()).then_some(title)
}

const NAME_MATCHERS: [Matcher<String>; 3] = [name_from_h1, name_from_field, name_from_title];

fn price_from_anchor<const N: usize>(html: &str) -> Option<f64> {
    PRICE_ANCHORS[N]
        .captures(html)
        .and_then(|caps| parse_european_number(&caps[1]))
}

const PRICE_MATCHERS: [Matcher<f64>; 6] = [
    price_from_anchor::<0>,
    price_from_anchor::<1>,
    price_from_anchor::<2>,
    price_from_anchor::<3>,
    price_from_anchor::<4>,
    first_number_like,
];

/// Byte span of the highest priority price anchor present in the page.
fn price_anchor_span(html: &str) -> Option<(usize, usize)> {
    PRICE_ANCHORS
        .iter()
        .find_map(|re| re.find(html))
        .map(|m| (m.start(), m.end()))
}

fn symbol_to_code(symbol: &str) -> Option<&'static str> {
    match symbol {
        "€" => Some("EUR"),
        "$" => Some("USD"),
        "£" => Some("GBP"),
        "¥" => Some("JPY"),
        _ => None,
    }
}

fn currency_from_structured(html: &str) -> Option<String> {
    let caps = STRUCTURED_CURRENCY_RE.captures(html)?;
    let code = caps.get(1).or_else(|| caps.get(2))?;
    Some(code.as_str().to_uppercase())
}

fn currency_near_price(html: &str) -> Option<String> {
    let (start, end) = price_anchor_span(html)?;
    let around = window(html, start, end, WINDOW_BEFORE, WINDOW_AFTER);
    let caps = WINDOW_CURRENCY_RE.captures(around)?;
    match (caps.get(1), caps.get(2)) {
        (Some(code), _) => Some(code.as_str().to_string()),
        (None, Some(symbol)) => symbol_to_code(symbol.as_str()).map(str::to_string),
        _ => None,
    }
}

fn currency_from_label(html: &str) -> Option<String> {
    let caps = LABEL_CURRENCY_RE.captures(head(html, LABEL_SCAN_LIMIT))?;
    let code = caps.get(1).or_else(|| caps.get(2))?;
    Some(code.as_str().to_string())
}

const CURRENCY_MATCHERS: [Matcher<String>; 3] =
    [currency_from_structured, currency_near_price, currency_from_label];

fn symbol_from_markup(html: &str) -> Option<String> {
    let caps = SYMBOL_FIELD_RE.captures(html)?;
    let symbol = caps.get(1).or_else(|| caps.get(2))?.as_str().trim();
    (!symbol.is_empty()).then(|| symbol.to_string())
}

fn ticker_for(html: &str, page_url: &str) -> Option<String> {
    let url_path = Url::parse(page_url)
        .map(|u| u.path().to_uppercase())
        .unwrap_or_default();
    find_isin(html)
        .or_else(|| find_isin(&url_path))
        .or_else(|| symbol_from_markup(html))
}

/// Extracts a row from an instrument page fetched from `page_url`. An empty currency is
/// returned rather than a guess when the page carries no currency signal.
pub fn parse_instrument_page(html: &str, page_url: &str) -> QuoteRow {
    QuoteRow::new(
        SourceTag::Investing,
        first_match(html, &NAME_MATCHERS).unwrap_or_default(),
        ticker_for(html, page_url).unwrap_or_default(),
        first_match(html, &PRICE_MATCHERS),
        first_match(html, &CURRENCY_MATCHERS).unwrap_or_default(),
    )
}

pub struct InvestingProvider {
    base_url: String,
    http: HttpFetcher,
    cache: Arc<dyn KeyValueCollection>,
}

impl InvestingProvider {
    pub fn new(base_url: &str, http: HttpFetcher, cache: Arc<dyn KeyValueCollection>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            cache,
        }
    }

    fn absolutize(&self, href: &str) -> Result<String> {
        let base = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid Investing base URL: {}", self.base_url))?;
        Ok(base.join(href)?.to_string())
    }

    /// Best instrument page from the site search, if any.
    async fn search_best_link(&self, query: &str, isin: &str, hint: &str) -> Option<String> {
        let url = format!(
            "{}/search/?q={}",
            self.base_url,
            urlencoding::encode(query)
        );
        let html = match self.http.get_html(&url).await {
            Ok(html) => html,
            Err(e) => {
                debug!("Investing search failed for {}: {:#}", query, e);
                return None;
            }
        };
        let href = pick_best_link(&html, isin, hint)?;
        match self.absolutize(&href) {
            Ok(absolute) => Some(absolute),
            Err(e) => {
                debug!("Could not absolutize {}: {:#}", href, e);
                None
            }
        }
    }

    async fn resolve_isin(&self, isin: &str, hint: &str) -> String {
        let key = format!("investing:url:{}:{}", isin, hint_key(hint));
        if let Some(url) = cache_get::<String>(self.cache.as_ref(), &key).await {
            return url;
        }
        match self.search_best_link(isin, isin, hint).await {
            Some(url) => {
                info!("Resolved {} to {}", isin, url);
                cache_put(self.cache.as_ref(), &key, &url, RESOLVED_URL_TTL).await;
                url
            }
            None => {
                debug!("No search match for {}, guessing fund page", isin);
                format!("{}/funds/{}", self.base_url, isin)
            }
        }
    }

    async fn resolve_free_text(&self, text: &str) -> Result<String> {
        if let Some(url) = self.search_best_link(text, "", text).await {
            return Ok(url);
        }
        if SLUG_LIKE_RE.is_match(text) {
            return Ok(format!("{}/funds/{}", self.base_url, text));
        }
        bail!("No Investing page found for {:?}", text)
    }

    /// Page URL for an identifier. ISINs and free text go through the site search.
    pub async fn resolve_url(&self, identifier: &str, hint: Option<&str>) -> Result<String> {
        match classify(identifier) {
            Identifier::Url(url) => Ok(url),
            Identifier::Isin(isin) => Ok(self.resolve_isin(&isin, hint.unwrap_or_default()).await),
            Identifier::Slug(slug) => Ok(format!(
                "{}/{}",
                self.base_url,
                slug.trim_start_matches('/')
            )),
            Identifier::FreeText(text) if text.is_empty() => bail!("Empty identifier"),
            Identifier::FreeText(text) => self.resolve_free_text(&text).await,
        }
    }

    async fn try_fetch(&self, url: &str) -> Result<QuoteRow> {
        let (page_url, html) = self.http.get_first_ok(&host_variants(url)).await?;
        Ok(parse_instrument_page(&html, &page_url))
    }

    #[instrument(name = "InvestingQuote", skip(self))]
    async fn quote_for(&self, identifier: &str, hint: Option<&str>) -> QuoteRow {
        let url = match self.resolve_url(identifier, hint).await {
            Ok(url) => url,
            Err(e) => {
                warn!("Investing could not resolve {}: {:#}", identifier, e);
                return QuoteRow::empty(SourceTag::Investing);
            }
        };

        let key = format!("investing:{url}");
        if let Some(cached) = cache_get(self.cache.as_ref(), &key).await {
            return cached;
        }

        match self.try_fetch(&url).await {
            Ok(row) => {
                if row.has_data() {
                    cache_put(self.cache.as_ref(), &key, &row, QUOTE_TTL).await;
                }
                row
            }
            Err(e) => {
                warn!("Investing quote failed for {}: {:#}", url, e);
                QuoteRow::empty(SourceTag::Investing)
            }
        }
    }
}

#[async_trait]
impl QuoteSource for InvestingProvider {
    fn tag(&self) -> SourceTag {
        SourceTag::Investing
    }

    async fn fetch_quote(&self, identifier: &str, _currency: Option<&str>) -> QuoteRow {
        self.quote_for(identifier.trim(), None).await
    }

    async fn fetch_by_isin(&self, isin: &str, hint: Option<&str>) -> QuoteRow {
        self.quote_for(isin.trim(), hint).await
    }

    fn owns_url(&self, url: &str) -> bool {
        let url = url.trim();
        let on_site = Url::parse(url).ok().is_some_and(|parsed| {
            parsed
                .host_str()
                .is_some_and(|host| host == "investing.com" || host.ends_with(".investing.com"))
        });
        on_site || (url.starts_with("http") && url.starts_with(&self.base_url))
    }
}
