pub mod coingecko;
pub mod google_finance;
pub mod investing;
pub mod morningstar;
pub mod quefondos;
pub mod util;
pub mod yahoo_finance;

use crate::core::cache::KeyValueCollection;
use crate::core::config::AppConfig;
use crate::core::quote::SourceTag;
use crate::core::source::QuoteSource;
use anyhow::Result;
use std::sync::Arc;
use util::HttpFetcher;

/// One adapter per known source, all sharing a single HTTP client and cache.
pub fn default_sources(
    config: &AppConfig,
    cache: Arc<dyn KeyValueCollection>,
) -> Result<Vec<Arc<dyn QuoteSource>>> {
    let http = HttpFetcher::new(&config.http)?;
    let base = |source: SourceTag| config.base_url(source);

    Ok(vec![
        Arc::new(yahoo_finance::YahooFinanceProvider::new(
            &base(SourceTag::Yahoo),
            http.clone(),
            Arc::clone(&cache),
        )),
        Arc::new(coingecko::CoinGeckoProvider::new(
            &base(SourceTag::CoinGecko),
            http.clone(),
            Arc::clone(&cache),
        )),
        Arc::new(investing::InvestingProvider::new(
            &base(SourceTag::Investing),
            http.clone(),
            Arc::clone(&cache),
        )),
        Arc::new(google_finance::GoogleFinanceProvider::new(
            &base(SourceTag::GoogleFinance),
            http.clone(),
            Arc::clone(&cache),
        )),
        Arc::new(quefondos::QuefondosProvider::new(
            &base(SourceTag::Quefondos),
            http.clone(),
            Arc::clone(&cache),
        )),
        Arc::new(morningstar::MorningstarProvider::new(
            &base(SourceTag::Morningstar),
            http,
            cache,
        )),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryCollection;

    #[test]
    fn test_default_sources_cover_every_tag() {
        let sources =
            default_sources(&AppConfig::default(), Arc::new(MemoryCollection::new())).unwrap();
        let tags: Vec<SourceTag> = sources.iter().map(|s| s.tag()).collect();
        for tag in SourceTag::ALL {
            assert!(tags.contains(&tag), "missing source {tag}");
        }
    }
}
