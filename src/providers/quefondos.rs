//! Quefondos fund and pension plan pages
//!
//! Pages are Spanish-language and laid out as label/value pairs, so every field is
//! anchored on its label ("Valor liquidativo", "Divisa", "Código DGS").

use crate::core::cache::{KeyValueCollection, QUOTE_TTL, cache_get, cache_put};
use crate::core::html::{Matcher, capture_text, clean_text, first_match};
use crate::core::identifier::{Identifier, classify, find_isin};
use crate::core::numeric::parse_european_number;
use crate::core::quote::{QuoteRow, SourceTag};
use crate::core::source::QuoteSource;
use crate::providers::util::HttpFetcher;
use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};
use url::Url;

static PLAN_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^N\d{3,6}$").expect("valid plan code regex"));

static H2_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h2[^>]*>(.*?)</h2>").expect("valid h2 regex"));
static H1_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").expect("valid h1 regex"));
static OG_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta[^>]+property=["']og:title["'][^>]*content=["']([^"']+)["']"#)
        .expect("valid og:title regex")
});
static GENERIC_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)informe|report").expect("valid heading filter regex"));

static NAV_SPAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)Valor\s+liquidativo\s*:?\s*</span>\s*<span[^>]*>\s*([^<]+)<")
        .expect("valid NAV span regex")
});
static NAV_BARE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)Valor\s+liquidativo\s*:?\s*(-?\d[\d.,]*)").expect("valid NAV regex")
});
static NAV_CELL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)Valor\s+liquidativo[^<]{0,40}</t[dh]>\s*<td[^>]*>\s*([^<]+)<")
        .expect("valid NAV cell regex")
});

static DIVISA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Divisa\s*:?\s*(?:<[^>]+>\s*)*([A-Z]{3})\b").expect("valid divisa regex")
});
static NAV_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(?i:Valor\s+liquidativo)\s*:?\s*(?:<[^>]+>\s*)*-?\d[\d.,]*\s*([A-Z]{3})\b")
        .expect("valid NAV currency regex")
});
static CURRENCY_CELL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<t[dh][^>]*>\s*(?i:Moneda|Currency)\s*:?\s*</t[dh]>\s*<td[^>]*>\s*([A-Z]{3})\s*</td>")
        .expect("valid currency cell regex")
});

static DGS_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(?i:C(?:o|ó|&oacute;)digo\s+DGS)\s*:?\s*(?:<[^>]+>\s*)*(N\d{3,6})")
        .expect("valid DGS code regex")
});

fn qualifying_heading(re: &Regex, html: &str) -> Option<String> {
    re.captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| clean_text(m.as_str()))
        .find(|text| !text.is_empty() && !GENERIC_HEADING_RE.is_match(text))
}

fn name_from_h2(html: &str) -> Option<String> {
    qualifying_heading(&H2_RE, html)
}

fn name_from_og_title(html: &str) -> Option<String> {
    capture_text(&OG_TITLE_RE, html)
}

fn name_from_h1(html: &str) -> Option<String> {
    qualifying_heading(&H1_RE, html)
}

const NAME_MATCHERS: [Matcher<String>; 3] = [name_from_h2, name_from_og_title, name_from_h1];

fn captured_number(re: &Regex, html: &str) -> Option<f64> {
    re.captures(html)
        .and_then(|caps| parse_european_number(&caps[1]))
}

fn price_from_span(html: &str) -> Option<f64> {
    captured_number(&NAV_SPAN_RE, html)
}

fn price_from_label(html: &str) -> Option<f64> {
    captured_number(&NAV_BARE_RE, html)
}

fn price_from_cell(html: &str) -> Option<f64> {
    captured_number(&NAV_CELL_RE, html)
}

const PRICE_MATCHERS: [Matcher<f64>; 3] = [price_from_span, price_from_label, price_from_cell];

fn currency_from_label(html: &str) -> Option<String> {
    capture_text(&DIVISA_RE, html)
}

fn currency_after_nav(html: &str) -> Option<String> {
    capture_text(&NAV_CODE_RE, html)
}

fn currency_from_cell(html: &str) -> Option<String> {
    capture_text(&CURRENCY_CELL_RE, html)
}

const CURRENCY_MATCHERS: [Matcher<String>; 3] =
    [currency_from_label, currency_after_nav, currency_from_cell];

fn code_from_dgs_label(html: &str) -> Option<String> {
    capture_text(&DGS_CODE_RE, html)
}

const CODE_MATCHERS: [Matcher<String>; 2] = [find_isin, code_from_dgs_label];

fn isin_query_param(url: &str) -> Option<String> {
    Url::parse(url).ok()?.query_pairs().find_map(|(key, value)| {
        (key == "isin" && !value.trim().is_empty()).then(|| value.trim().to_uppercase())
    })
}

/// Extracts a row from a fund or plan page fetched from `url`.
pub fn parse_fund_page(html: &str, url: &str) -> QuoteRow {
    let code = first_match(html, &CODE_MATCHERS).or_else(|| isin_query_param(url));
    QuoteRow::new(
        SourceTag::Quefondos,
        first_match(html, &NAME_MATCHERS).unwrap_or_default(),
        code.unwrap_or_default(),
        first_match(html, &PRICE_MATCHERS),
        first_match(html, &CURRENCY_MATCHERS).unwrap_or_default(),
    )
}

pub struct QuefondosProvider {
    base_url: String,
    http: HttpFetcher,
    cache: Arc<dyn KeyValueCollection>,
}

impl QuefondosProvider {
    pub fn new(base_url: &str, http: HttpFetcher, cache: Arc<dyn KeyValueCollection>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            cache,
        }
    }

    /// Page URL for an identifier: URLs as-is, `N1234` codes as pension plans,
    /// everything else as a fund ISIN.
    pub fn resolve_url(&self, identifier: &str) -> String {
        let fund_page = |code: &str| {
            format!(
                "{}/es/fondos/ficha/index.html?isin={}",
                self.base_url,
                urlencoding::encode(code)
            )
        };
        match classify(identifier) {
            Identifier::Url(url) => url,
            Identifier::Isin(isin) => fund_page(&isin),
            other => {
                let code = other.as_str().to_uppercase();
                if PLAN_CODE_RE.is_match(&code) {
                    format!("{}/es/planes/ficha/index.html?isin={}", self.base_url, code)
                } else {
                    fund_page(other.as_str())
                }
            }
        }
    }

    async fn try_fetch(&self, identifier: &str) -> Result<QuoteRow> {
        let url = self.resolve_url(identifier);
        let html = self.http.get_html(&url).await?;
        let row = parse_fund_page(&html, &url);
        debug!(url = %url, complete = row.is_complete(), "Parsed Quefondos page");
        Ok(row)
    }
}

#[async_trait]
impl QuoteSource for QuefondosProvider {
    fn tag(&self) -> SourceTag {
        SourceTag::Quefondos
    }

    async fn fetch_quote(&self, identifier: &str, _currency: Option<&str>) -> QuoteRow {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return QuoteRow::empty(SourceTag::Quefondos);
        }
        let key = format!("quefondos:{identifier}");
        if let Some(cached) = cache_get(self.cache.as_ref(), &key).await {
            return cached;
        }

        match self.try_fetch(identifier).await {
            Ok(row) => {
                if row.has_data() {
                    cache_put(self.cache.as_ref(), &key, &row, QUOTE_TTL).await;
                }
                row
            }
            Err(e) => {
                warn!("Quefondos quote failed for {}: {:#}", identifier, e);
                QuoteRow::empty(SourceTag::Quefondos)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::HttpConfig;
    use crate::store::memory::MemoryCollection;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FUND_PAGE: &str = r#"<html><head>
        <meta property="og:title" content="Quefondos - Ficha del fondo">
        </head><body>
        <h2>Informe del fondo</h2>
        <h2>Bestinver Internacional, FI</h2>
        <p><span class="floatleft">Valor liquidativo: </span><span class="floatright">45,123456 EUR</span></p>
        <p><span class="floatleft">Divisa:</span> <span class="floatright">EUR</span></p>
        <p>ISIN: ES0114638036</p>
        </body></html>"#;

    const PLAN_PAGE: &str = r#"<html><head>
        <meta property="og:title" content="Plan Pensiones Ejemplo">
        </head><body>
        <table>
          <tr><th>Valor liquidativo</th><td>12,87</td></tr>
          <tr><td>Moneda</td><td>EUR</td></tr>
        </table>
        <p>C&oacute;digo DGS: <b>N1234</b></p>
        </body></html>"#;

    fn provider(base_url: &str) -> QuefondosProvider {
        QuefondosProvider::new(
            base_url,
            HttpFetcher::new(&HttpConfig::default()).unwrap(),
            Arc::new(MemoryCollection::new()),
        )
    }

    #[test]
    fn test_resolve_url_by_identifier_kind() {
        let provider = provider("https://www.quefondos.com/");
        assert_eq!(
            provider.resolve_url("es0114638036"),
            "https://www.quefondos.com/es/fondos/ficha/index.html?isin=ES0114638036"
        );
        assert_eq!(
            provider.resolve_url("n1234"),
            "https://www.quefondos.com/es/planes/ficha/index.html?isin=N1234"
        );
        assert_eq!(
            provider.resolve_url("https://www.quefondos.com/es/fondos/ficha/x.html"),
            "https://www.quefondos.com/es/fondos/ficha/x.html"
        );
        assert_eq!(
            provider.resolve_url("fondo raro"),
            "https://www.quefondos.com/es/fondos/ficha/index.html?isin=fondo%20raro"
        );
    }

    #[test]
    fn test_parse_fund_page() {
        let row = parse_fund_page(FUND_PAGE, "https://www.quefondos.com/x");
        assert_eq!(row.name, "Bestinver Internacional, FI");
        assert_eq!(row.price, Some(45.123456));
        assert_eq!(row.currency, "EUR");
        assert_eq!(row.ticker, "ES0114638036");
    }

    #[test]
    fn test_parse_plan_page_with_table_cells() {
        let row = parse_fund_page(
            PLAN_PAGE,
            "https://www.quefondos.com/es/planes/ficha/index.html?isin=N1234",
        );
        assert_eq!(row.name, "Plan Pensiones Ejemplo");
        assert_eq!(row.price, Some(12.87));
        assert_eq!(row.currency, "EUR");
        assert_eq!(row.ticker, "N1234");
    }

    #[test]
    fn test_currency_trailing_valuation() {
        let html = "<p>Valor liquidativo: 9,50 USD</p>";
        assert_eq!(first_match(html, &CURRENCY_MATCHERS).as_deref(), Some("USD"));
        assert_eq!(first_match(html, &PRICE_MATCHERS), Some(9.5));
    }

    #[test]
    fn test_code_falls_back_to_url_param() {
        let row = parse_fund_page(
            "<h1>Fondo sin codigo</h1>",
            "https://www.quefondos.com/es/fondos/ficha/index.html?isin=lu0996182563",
        );
        assert_eq!(row.name, "Fondo sin codigo");
        assert_eq!(row.ticker, "LU0996182563");
        assert!(row.price.is_none());
        assert!(row.currency.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_quote_by_isin() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/es/fondos/ficha/index.html"))
            .and(query_param("isin", "ES0114638036"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FUND_PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(&server.uri());
        let row = provider.fetch_quote("ES0114638036", None).await;
        assert!(row.is_complete());
        assert_eq!(row.source, SourceTag::Quefondos);
        assert_eq!(provider.fetch_quote("ES0114638036", None).await, row);
    }
}
