//! Quote source abstraction

use crate::core::quote::{QuoteRow, SourceTag};
use async_trait::async_trait;

/// A single upstream that can turn an identifier into a [`QuoteRow`].
///
/// `fetch_quote` never fails. Transport and parse errors degrade to empty fields on a
/// row that still carries the source tag and the current timestamp.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    fn tag(&self) -> SourceTag;

    async fn fetch_quote(&self, identifier: &str, currency: Option<&str>) -> QuoteRow;

    /// Lookup by ISIN with an optional free-text hint, used by the fallback chain.
    async fn fetch_by_isin(&self, isin: &str, _hint: Option<&str>) -> QuoteRow {
        self.fetch_quote(isin, None).await
    }

    /// Whether `url` is a page of this source that can be fetched directly.
    fn owns_url(&self, _url: &str) -> bool {
        false
    }
}
