//! Quote resolution entry points
//!
//! [`QuoteResolver::resolve_quote`] dispatches straight to one source.
//! [`QuoteResolver::resolve_quote_by_isin`] walks an ordered fallback chain and
//! accepts the first row that has both a price and a currency.

use crate::core::cache::{FALLBACK_TTL, KeyValueCollection, cache_get, cache_put};
use crate::core::identifier::normalize_isin;
use crate::core::quote::{QuoteRow, SourceTag};
use crate::core::ranking::hint_key;
use crate::core::source::QuoteSource;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const DEFAULT_CURRENCY: &str = "EUR";

/// Tried after Investing when funds are not required.
const OPEN_CHAIN: [SourceTag; 3] = [
    SourceTag::Quefondos,
    SourceTag::Yahoo,
    SourceTag::GoogleFinance,
];
/// Tried after Investing in strict-funds mode.
const FUNDS_CHAIN: [SourceTag; 2] = [SourceTag::Quefondos, SourceTag::Morningstar];

pub struct QuoteResolver {
    sources: HashMap<SourceTag, Arc<dyn QuoteSource>>,
    cache: Arc<dyn KeyValueCollection>,
    default_currency: String,
}

impl QuoteResolver {
    pub fn new(cache: Arc<dyn KeyValueCollection>) -> Self {
        Self {
            sources: HashMap::new(),
            cache,
            default_currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    /// Registers a source under its own tag, replacing any previous one.
    pub fn with_source(mut self, source: Arc<dyn QuoteSource>) -> Self {
        self.sources.insert(source.tag(), source);
        self
    }

    pub fn with_sources(self, sources: impl IntoIterator<Item = Arc<dyn QuoteSource>>) -> Self {
        sources.into_iter().fold(self, Self::with_source)
    }

    pub fn with_default_currency(mut self, currency: &str) -> Self {
        let currency = currency.trim();
        if !currency.is_empty() {
            self.default_currency = currency.to_uppercase();
        }
        self
    }

    /// Direct dispatch by source name. An unknown name yields an empty row with an
    /// empty source tag.
    pub async fn resolve_quote(
        &self,
        source: &str,
        identifier: &str,
        currency: Option<&str>,
    ) -> QuoteRow {
        let tag = SourceTag::parse(source);
        let Some(adapter) = self.sources.get(&tag) else {
            warn!("No quote source registered for {:?}", source);
            return QuoteRow::empty(SourceTag::Unknown);
        };
        let currency = currency
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(&self.default_currency);
        adapter.fetch_quote(identifier, Some(currency)).await
    }

    /// Resolves an ISIN through the fallback chain. Every outcome, including an
    /// incomplete one, is cached.
    #[instrument(name = "ResolveByIsin", skip(self))]
    pub async fn resolve_quote_by_isin(
        &self,
        isin: &str,
        hint: Option<&str>,
        strict_funds: bool,
    ) -> QuoteRow {
        let isin = normalize_isin(isin);
        let hint = hint.map(str::trim).filter(|h| !h.is_empty());
        let key = format!(
            "byisin:{}:{}:{}",
            isin,
            hint_key(hint.unwrap_or_default()),
            strict_funds
        );
        if let Some(cached) = cache_get(self.cache.as_ref(), &key).await {
            return cached;
        }

        let row = self.run_chain(&isin, hint, strict_funds).await;
        cache_put(self.cache.as_ref(), &key, &row, FALLBACK_TTL).await;
        row
    }

    async fn run_chain(&self, isin: &str, hint: Option<&str>, strict_funds: bool) -> QuoteRow {
        let investing = self.sources.get(&SourceTag::Investing);

        if let (Some(investing), Some(url)) = (investing, hint)
            && investing.owns_url(url)
        {
            debug!("Hint is an Investing page, fetching it directly");
            return investing.fetch_quote(url, None).await;
        }

        let first = match investing {
            Some(investing) => investing.fetch_by_isin(isin, hint).await,
            None => QuoteRow::empty(SourceTag::Investing),
        };

        let chain: &[SourceTag] = if strict_funds {
            // Any price or currency from Investing is good enough for funds
            if first.price.is_some() || !first.currency.is_empty() {
                return first;
            }
            &FUNDS_CHAIN
        } else {
            if first.is_complete() {
                return first;
            }
            &OPEN_CHAIN
        };

        for tag in chain {
            let Some(source) = self.sources.get(tag) else {
                continue;
            };
            let row = source.fetch_by_isin(isin, hint).await;
            if row.is_complete() {
                info!("Resolved {} via {}", isin, tag);
                return row;
            }
            debug!("{} had no complete quote for {}", tag, isin);
        }

        debug!("Falling back to the Investing row for {}", isin);
        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryCollection;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSource {
        tag: SourceTag,
        price: Option<f64>,
        currency: &'static str,
        url_prefix: Option<&'static str>,
        calls: AtomicUsize,
        seen: Mutex<Vec<(String, Option<String>)>>,
    }

    impl FakeSource {
        fn new(tag: SourceTag, price: Option<f64>, currency: &'static str) -> Arc<Self> {
            Arc::new(Self {
                tag,
                price,
                currency,
                url_prefix: None,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QuoteSource for FakeSource {
        fn tag(&self) -> SourceTag {
            self.tag
        }

        async fn fetch_quote(&self, identifier: &str, currency: Option<&str>) -> QuoteRow {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push((identifier.to_string(), currency.map(str::to_string)));
            QuoteRow::new(self.tag, "Fund", identifier, self.price, self.currency)
        }

        fn owns_url(&self, url: &str) -> bool {
            self.url_prefix.is_some_and(|prefix| url.starts_with(prefix))
        }
    }

    struct Chain {
        investing: Arc<FakeSource>,
        quefondos: Arc<FakeSource>,
        yahoo: Arc<FakeSource>,
        google: Arc<FakeSource>,
        morningstar: Arc<FakeSource>,
    }

    impl Chain {
        fn resolver(&self) -> QuoteResolver {
            QuoteResolver::new(Arc::new(MemoryCollection::new()))
                .with_source(self.investing.clone())
                .with_source(self.quefondos.clone())
                .with_source(self.yahoo.clone())
                .with_source(self.google.clone())
                .with_source(self.morningstar.clone())
        }
    }

    fn chain(
        investing: (Option<f64>, &'static str),
        quefondos: (Option<f64>, &'static str),
    ) -> Chain {
        Chain {
            investing: FakeSource::new(SourceTag::Investing, investing.0, investing.1),
            quefondos: FakeSource::new(SourceTag::Quefondos, quefondos.0, quefondos.1),
            yahoo: FakeSource::new(SourceTag::Yahoo, Some(3.0), "USD"),
            google: FakeSource::new(SourceTag::GoogleFinance, Some(4.0), "USD"),
            morningstar: FakeSource::new(SourceTag::Morningstar, Some(5.0), "EUR"),
        }
    }

    #[tokio::test]
    async fn test_resolve_quote_dispatch() {
        let coingecko = FakeSource::new(SourceTag::CoinGecko, Some(50000.0), "EUR");
        let resolver =
            QuoteResolver::new(Arc::new(MemoryCollection::new())).with_source(coingecko.clone());

        let row = resolver.resolve_quote("coingecko", "bitcoin", None).await;
        assert_eq!(row.source, SourceTag::CoinGecko);
        assert_eq!(row.price, Some(50000.0));
        // Currency defaults to EUR
        assert_eq!(
            coingecko.seen.lock().unwrap()[0],
            ("bitcoin".to_string(), Some("EUR".to_string()))
        );

        let unknown = resolver.resolve_quote("BLOOMBERG", "AAPL", None).await;
        assert_eq!(unknown.source, SourceTag::Unknown);
        assert_eq!(unknown.to_columns()[..5], ["", "", "", "", ""]);
        assert_eq!(coingecko.calls(), 1);
    }

    #[tokio::test]
    async fn test_complete_investing_row_short_circuits() {
        let chain = chain((Some(1.0), "EUR"), (Some(2.0), "EUR"));
        let row = chain
            .resolver()
            .resolve_quote_by_isin("es0114638036", None, false)
            .await;

        assert_eq!(row.source, SourceTag::Investing);
        assert_eq!(row.ticker, "ES0114638036");
        assert_eq!(chain.quefondos.calls(), 0);
        assert_eq!(chain.yahoo.calls(), 0);
        assert_eq!(chain.google.calls(), 0);
    }

    #[tokio::test]
    async fn test_quefondos_answer_stops_before_yahoo() {
        let chain = chain((Some(1.0), ""), (Some(2.0), "EUR"));
        let row = chain
            .resolver()
            .resolve_quote_by_isin("ES0114638036", None, false)
            .await;

        assert_eq!(row.source, SourceTag::Quefondos);
        assert_eq!(chain.investing.calls(), 1);
        assert_eq!(chain.yahoo.calls(), 0);
        assert_eq!(chain.google.calls(), 0);
    }

    #[tokio::test]
    async fn test_open_chain_order_and_final_fallback() {
        let mut chain = chain((None, "EUR"), (None, ""));
        chain.yahoo = FakeSource::new(SourceTag::Yahoo, None, "");
        chain.google = FakeSource::new(SourceTag::GoogleFinance, Some(9.0), "");
        let row = chain
            .resolver()
            .resolve_quote_by_isin("ES0114638036", None, false)
            .await;

        assert_eq!(row.source, SourceTag::Investing);
        assert_eq!(row.currency, "EUR");
        assert_eq!(chain.quefondos.calls(), 1);
        assert_eq!(chain.yahoo.calls(), 1);
        assert_eq!(chain.google.calls(), 1);
        assert_eq!(chain.morningstar.calls(), 0);
    }

    #[tokio::test]
    async fn test_strict_funds_accepts_partial_investing_row() {
        let chain = chain((None, "EUR"), (Some(2.0), "EUR"));
        let row = chain
            .resolver()
            .resolve_quote_by_isin("ES0114638036", None, true)
            .await;

        assert_eq!(row.source, SourceTag::Investing);
        assert_eq!(chain.quefondos.calls(), 0);
        assert_eq!(chain.morningstar.calls(), 0);
    }

    #[tokio::test]
    async fn test_strict_funds_falls_through_to_morningstar() {
        let chain = chain((None, ""), (Some(2.0), ""));
        let row = chain
            .resolver()
            .resolve_quote_by_isin("ES0114638036", None, true)
            .await;

        assert_eq!(row.source, SourceTag::Morningstar);
        assert_eq!(chain.quefondos.calls(), 1);
        assert_eq!(chain.yahoo.calls(), 0);
        assert_eq!(chain.google.calls(), 0);
    }

    #[tokio::test]
    async fn test_investing_url_hint_bypasses_search() {
        let mut chain = chain((Some(1.0), "EUR"), (Some(2.0), "EUR"));
        chain.investing = Arc::new(FakeSource {
            url_prefix: Some("https://es.investing.com/"),
            ..Arc::into_inner(chain.investing).unwrap()
        });
        let hint = "https://es.investing.com/funds/bestinver-internacional-fi";
        let row = chain
            .resolver()
            .resolve_quote_by_isin("ES0114638036", Some(hint), false)
            .await;

        assert_eq!(row.ticker, hint);
        assert_eq!(chain.investing.seen.lock().unwrap()[0].0, hint);
        assert_eq!(chain.quefondos.calls(), 0);
    }

    #[tokio::test]
    async fn test_outcome_is_cached_per_isin_hint_and_mode() {
        let chain = chain((None, ""), (None, ""));
        let resolver = chain.resolver();

        let first = resolver
            .resolve_quote_by_isin("ES0114638036", Some("Bestinver Internacional"), false)
            .await;
        let second = resolver
            .resolve_quote_by_isin(" es0114638036 ", Some("bestinver  internacional"), false)
            .await;
        assert_eq!(first, second);
        assert_eq!(chain.investing.calls(), 1);
        assert_eq!(chain.yahoo.calls(), 1);

        // A different mode is a different key
        resolver
            .resolve_quote_by_isin("ES0114638036", Some("Bestinver Internacional"), true)
            .await;
        assert_eq!(chain.investing.calls(), 2);
    }
}
