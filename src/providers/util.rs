use crate::core::config::HttpConfig;
use anyhow::{Context, Result, anyhow, bail};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::{Host, Url};

/// Upper bound on host variants tried for a single page.
pub const MAX_HOST_ATTEMPTS: usize = 3;

/// Shared HTTP client for all sources. Cheap to clone.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    accept_language: String,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            accept_language: config.accept_language.clone(),
        })
    }

    async fn send(&self, url: &str, html: bool) -> Result<reqwest::Response> {
        debug!("Requesting {}", url);
        let mut request = self.client.get(url);
        if html {
            request = request
                .header(ACCEPT, "text/html,application/xhtml+xml")
                .header(ACCEPT_LANGUAGE, &self.accept_language);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("Request failed for URL: {url}"))?;

        if response.status() != StatusCode::OK {
            bail!("HTTP error: {} for URL: {}", response.status(), url);
        }
        Ok(response)
    }

    /// GET a JSON document and decode it.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.send(url, false)
            .await?
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse JSON response from {url}"))
    }

    /// GET an HTML page with browser-like headers.
    pub async fn get_html(&self, url: &str) -> Result<String> {
        let text = self
            .send(url, true)
            .await?
            .text()
            .await
            .with_context(|| format!("Failed to read response body for URL: {url}"))?;
        if text.trim().is_empty() {
            bail!("Received empty response for URL: {}", url);
        }
        Ok(text)
    }

    /// Tries each candidate in order and stops at the first 200 with a non-empty body.
    /// Returns the URL that answered together with its body.
    pub async fn get_first_ok(&self, candidates: &[String]) -> Result<(String, String)> {
        let mut last_error = anyhow!("No candidate URLs to fetch");
        for url in candidates.iter().take(MAX_HOST_ATTEMPTS) {
            match self.get_html(url).await {
                Ok(body) => return Ok((url.clone(), body)),
                Err(e) => {
                    debug!("Attempt for {} failed: {}. Trying next host...", url, e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}

/// The URL itself followed by its mobile (`m.`) and `www.` host substitutions.
/// Hosts that are IP addresses or unparsable URLs yield only the original.
pub fn host_variants(raw: &str) -> Vec<String> {
    let mut variants = vec![raw.to_string()];
    let Ok(parsed) = Url::parse(raw) else {
        return variants;
    };
    let Some(Host::Domain(host)) = parsed.host() else {
        return variants;
    };

    let labels: Vec<&str> = host.split('.').collect();
    let registrable = if labels.len() >= 3 {
        labels[1..].join(".")
    } else {
        host.to_string()
    };

    for prefix in ["m", "www"] {
        let mut variant = parsed.clone();
        if variant
            .set_host(Some(&format!("{prefix}.{registrable}")))
            .is_ok()
        {
            let variant = variant.to_string();
            if !variants.contains(&variant) {
                variants.push(variant);
            }
        }
    }
    variants.truncate(MAX_HOST_ATTEMPTS);
    variants
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(&HttpConfig::default()).unwrap()
    }

    #[test]
    fn test_host_variants_for_region_host() {
        assert_eq!(
            host_variants("https://es.investing.com/funds/abc?x=1"),
            vec![
                "https://es.investing.com/funds/abc?x=1",
                "https://m.investing.com/funds/abc?x=1",
                "https://www.investing.com/funds/abc?x=1",
            ]
        );
    }

    #[test]
    fn test_host_variants_skip_duplicates() {
        assert_eq!(
            host_variants("https://www.investing.com/etfs/x"),
            vec![
                "https://www.investing.com/etfs/x",
                "https://m.investing.com/etfs/x",
            ]
        );
    }

    #[test]
    fn test_host_variants_for_ip_hosts() {
        assert_eq!(
            host_variants("http://127.0.0.1:8080/funds/x"),
            vec!["http://127.0.0.1:8080/funds/x"]
        );
        assert_eq!(host_variants("not a url"), vec!["not a url"]);
    }

    #[tokio::test]
    async fn test_get_html_sends_browser_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header_exists("accept-language"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let body = fetcher()
            .get_html(&format!("{}/page", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_get_first_ok_stops_at_first_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/c"))
            .respond_with(ResponseTemplate::new(200).set_body_string("body"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/d"))
            .respond_with(ResponseTemplate::new(200).set_body_string("never"))
            .expect(0)
            .mount(&server)
            .await;

        let candidates: Vec<String> = ["/a", "/b", "/c", "/d"]
            .iter()
            .map(|p| format!("{}{p}", server.uri()))
            .collect();
        let (url, body) = fetcher().get_first_ok(&candidates).await.unwrap();
        assert!(url.ends_with("/c"));
        assert_eq!(body, "body");
    }

    #[tokio::test]
    async fn test_get_first_ok_reports_last_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = fetcher()
            .get_first_ok(&[format!("{}/missing", server.uri())])
            .await;
        assert!(
            result
                .unwrap_err()
                .to_string()
                .starts_with("HTTP error: 404 Not Found")
        );
    }

    #[tokio::test]
    async fn test_get_json_reports_parse_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let result: Result<serde_json::Value> = fetcher()
            .get_json(&format!("{}/json", server.uri()))
            .await;
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse JSON response")
        );
    }
}
