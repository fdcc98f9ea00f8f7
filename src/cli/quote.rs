use super::ui;
use crate::core::{QuoteResolver, QuoteRow};
use anyhow::{Result, bail};
use futures::future::join_all;

pub async fn run_quote(
    resolver: &QuoteResolver,
    source: &str,
    identifier: &str,
    currency: Option<&str>,
    json: bool,
) -> Result<()> {
    let row = resolver.resolve_quote(source, identifier, currency).await;
    println!("{}", ui::render_rows(&[row], json)?);
    Ok(())
}

pub async fn run_isin(
    resolver: &QuoteResolver,
    isin: &str,
    hint: Option<&str>,
    strict_funds: bool,
    json: bool,
) -> Result<()> {
    let row = resolver
        .resolve_quote_by_isin(isin, hint, strict_funds)
        .await;
    println!("{}", ui::render_rows(&[row], json)?);
    Ok(())
}

/// Splits `SOURCE:IDENTIFIER` at the first colon, so identifiers may contain colons
/// themselves (`GOOGLEFINANCE:NASDAQ:AAPL`, `INVESTING:https://...`).
pub fn parse_batch_request(request: &str) -> Result<(String, String)> {
    match request.split_once(':') {
        Some((source, identifier)) if !source.trim().is_empty() && !identifier.trim().is_empty() => {
            Ok((source.trim().to_string(), identifier.trim().to_string()))
        }
        _ => bail!(
            "Invalid batch request {:?}, expected SOURCE:IDENTIFIER",
            request
        ),
    }
}

/// Resolves every request concurrently. Rows keep the order of the requests.
pub async fn resolve_batch(
    resolver: &QuoteResolver,
    requests: &[String],
    currency: Option<&str>,
) -> Result<Vec<QuoteRow>> {
    let parsed = requests
        .iter()
        .map(|r| parse_batch_request(r))
        .collect::<Result<Vec<_>>>()?;

    let pb = ui::new_progress_bar(parsed.len() as u64, true);
    pb.set_message("Fetching quotes...");

    let futures = parsed.iter().map(|(source, identifier)| {
        let pb_clone = pb.clone();
        async move {
            let row = resolver.resolve_quote(source, identifier, currency).await;
            pb_clone.inc(1);
            row
        }
    });
    let rows = join_all(futures).await;
    pb.finish_and_clear();
    Ok(rows)
}

pub async fn run_batch(
    resolver: &QuoteResolver,
    requests: &[String],
    currency: Option<&str>,
    json: bool,
) -> Result<()> {
    let rows = resolve_batch(resolver, requests, currency).await?;
    if !json {
        println!(
            "{}\n",
            ui::style_text(&format!("Quotes ({})", rows.len()), ui::StyleType::Title)
        );
    }
    println!("{}", ui::render_rows(&rows, json)?);
    Ok(())
}
