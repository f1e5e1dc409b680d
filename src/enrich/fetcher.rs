use std::sync::Arc;
use std::time::Duration;

use log::warn;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::time::sleep;

use crate::config::ApiConfig;
use crate::enrich::{symbols, LookupCache};
use crate::error::{Context, Result};
use crate::records::EnrichmentResult;

/// Linear backoff: attempt `n` sleeps `base_delay × n` before the next try.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Per-symbol profile lookup against the market-data API, with cache
/// short-circuiting, quota reservation before every outbound call, and a
/// per-status retry policy. `fetch` never fails: a symbol that cannot be
/// enriched yields a null-valued result.
pub struct EnrichmentFetcher {
    client: Client,
    api: ApiConfig,
    cache: Arc<LookupCache>,
    retry: RetryPolicy,
}

impl EnrichmentFetcher {
    pub fn new(api: ApiConfig, cache: Arc<LookupCache>) -> Result<Self> {
        let client = Client::builder()
            .timeout(api.timeout)
            .build()
            .context("Failed to construct enrichment HTTP client")?;
        let retry = RetryPolicy {
            attempts: api.retries,
            base_delay: api.retry_delay,
        };

        Ok(Self {
            client,
            api,
            cache,
            retry,
        })
    }

    pub fn resolves_isin(&self) -> bool {
        self.api.resolve_isin
    }

    /// Look up the profile for one symbol. ISIN-shaped symbols go through
    /// resolution first (or come back null when resolution is disabled).
    pub async fn fetch(&self, raw_symbol: &str) -> EnrichmentResult {
        let mut symbol = raw_symbol.to_string();

        if symbols::is_isin(&symbol) {
            if !self.api.resolve_isin {
                return EnrichmentResult::default();
            }
            match self.resolve_isin(&symbol).await {
                Some(resolved) => symbol = resolved,
                None => return EnrichmentResult::default(),
            }
        }
        if symbol.is_empty() {
            return EnrichmentResult::default();
        }

        if let Some(hit) = self.cache.get(&symbol) {
            return hit;
        }

        let url = format!(
            "{}/profile?symbol={}&apikey={}",
            self.api.base_url, symbol, self.api.key
        );

        for attempt in 1..=self.retry.attempts {
            if !self.cache.reserve_slot() {
                return EnrichmentResult::default();
            }

            let response = match self.client.get(&url).send().await {
                Ok(response) => response,
                Err(err) => {
                    warn!("Request error for {}: {}, attempt {}", symbol, err, attempt);
                    sleep(self.retry.backoff(attempt)).await;
                    continue;
                }
            };

            match response.status() {
                StatusCode::OK => {
                    let body = match response.text().await {
                        Ok(body) => body,
                        Err(err) => {
                            warn!("Failed to read body for {}: {}, attempt {}", symbol, err, attempt);
                            sleep(self.retry.backoff(attempt)).await;
                            continue;
                        }
                    };

                    match parse_profile_payload(&body) {
                        Some(result) => {
                            self.cache.put(&symbol, &result);
                            return result;
                        }
                        None => {
                            warn!("Empty profile payload for {}, attempt {}", symbol, attempt);
                            sleep(self.retry.backoff(attempt)).await;
                        }
                    }
                }
                StatusCode::FORBIDDEN => {
                    // Credential or permission problem; retrying cannot help.
                    warn!("Got 403 for {}: API key invalid or lacks permission", symbol);
                    return EnrichmentResult::default();
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    warn!("Rate limited for {}, attempt {}", symbol, attempt);
                    sleep(self.retry.backoff(attempt)).await;
                }
                status => {
                    warn!("Got {} for {}, attempt {}", status, symbol, attempt);
                    sleep(self.retry.backoff(attempt)).await;
                }
            }
        }

        EnrichmentResult::default()
    }

    /// Resolve an ISIN to a tradable symbol through the search endpoint.
    /// Best effort: one attempt, cached on success, `None` on any failure.
    pub async fn resolve_isin(&self, isin: &str) -> Option<String> {
        if let Some(hit) = self.cache.get_isin(isin) {
            return Some(hit);
        }

        if !self.cache.reserve_slot() {
            return None;
        }

        let url = format!(
            "{}/search-symbol?query={}&apikey={}",
            self.api.base_url, isin, self.api.key
        );

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!("ISIN resolution failed for {}: {}", isin, err);
                return None;
            }
        };
        if response.status() != StatusCode::OK {
            warn!("ISIN resolution got {} for {}", response.status(), isin);
            return None;
        }

        let body = response.text().await.ok()?;
        let symbol = parse_search_payload(&body)?;
        self.cache.put_isin(isin, &symbol);
        Some(symbol)
    }
}

/// Extract an enrichment result from the profile endpoint's JSON array.
/// Returns `None` for an empty or non-array payload, which callers treat as
/// transient.
fn parse_profile_payload(body: &str) -> Option<EnrichmentResult> {
    let value: Value = serde_json::from_str(body).ok()?;
    let profile = value.as_array()?.first()?;

    Some(EnrichmentResult {
        market_cap: field_as_string(profile.get("mktCap")),
        sector: field_as_string(profile.get("sector")),
        industry: field_as_string(profile.get("industry")),
        pe_ratio: field_as_string(profile.get("trailingPE")),
    })
}

fn parse_search_payload(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let symbol = value.as_array()?.first()?.get("symbol")?;
    field_as_string(Some(symbol))
}

/// Numbers are rendered verbatim; blank strings and nulls collapse to `None`.
fn field_as_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Number(num) => Some(num.to_string()),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const PROFILE_BODY: &str =
        r#"[{"mktCap":100,"sector":"Tech","industry":"Software","trailingPE":12.3}]"#;

    /// Serve one canned HTTP response per incoming connection, in order.
    async fn spawn_stub(responses: Vec<(u16, &'static str)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(_) => return,
                };
                let mut request = [0u8; 2048];
                let _ = socket.read(&mut request).await;

                let reason = match status {
                    200 => "OK",
                    403 => "Forbidden",
                    429 => "Too Many Requests",
                    _ => "Error",
                };
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reason,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });

        format!("http://{}", addr)
    }

    fn test_api(base_url: String) -> ApiConfig {
        ApiConfig {
            key: "test-key".to_string(),
            base_url,
            resolve_isin: false,
            daily_limit: 1000,
            cache_path: None,
            timeout: Duration::from_secs(2),
            retries: 3,
            retry_delay: Duration::from_millis(10),
        }
    }

    fn fetcher_with(api: ApiConfig, cache: Arc<LookupCache>) -> EnrichmentFetcher {
        EnrichmentFetcher::new(api, cache).unwrap()
    }

    #[test]
    fn parses_full_profile_payload() {
        let result = parse_profile_payload(PROFILE_BODY).unwrap();
        assert_eq!(result.market_cap.as_deref(), Some("100"));
        assert_eq!(result.sector.as_deref(), Some("Tech"));
        assert_eq!(result.industry.as_deref(), Some("Software"));
        assert_eq!(result.pe_ratio.as_deref(), Some("12.3"));
    }

    #[test]
    fn missing_profile_fields_become_none() {
        let result = parse_profile_payload(r#"[{"sector":"Tech"}]"#).unwrap();
        assert_eq!(result.sector.as_deref(), Some("Tech"));
        assert!(result.market_cap.is_none());
        assert!(result.pe_ratio.is_none());
    }

    #[test]
    fn empty_payload_is_transient() {
        assert!(parse_profile_payload("[]").is_none());
        assert!(parse_profile_payload("null").is_none());
        assert!(parse_profile_payload("not json").is_none());
    }

    #[test]
    fn parses_search_payload() {
        assert_eq!(
            parse_search_payload(r#"[{"symbol":"AAPL","name":"Apple"}]"#),
            Some("AAPL".to_string())
        );
        assert!(parse_search_payload("[]").is_none());
    }

    #[test]
    fn backoff_grows_linearly() {
        let policy = RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn second_fetch_is_served_from_cache() {
        let base = spawn_stub(vec![(200, PROFILE_BODY)]).await;
        let cache = Arc::new(LookupCache::load(None, 1000));
        let fetcher = fetcher_with(test_api(base), cache.clone());

        let first = fetcher.fetch("ACM").await;
        let second = fetcher.fetch("ACM").await;

        assert_eq!(first, second);
        assert_eq!(first.sector.as_deref(), Some("Tech"));
        assert_eq!(cache.requests_today(), 1);
    }

    #[tokio::test]
    async fn forbidden_is_terminal_after_one_attempt() {
        let base = spawn_stub(vec![(403, "")]).await;
        let cache = Arc::new(LookupCache::load(None, 1000));
        let fetcher = fetcher_with(test_api(base), cache.clone());

        let result = fetcher.fetch("BAD").await;

        assert!(result.is_empty());
        assert_eq!(cache.requests_today(), 1);
    }

    #[tokio::test]
    async fn rate_limit_retries_with_growing_backoff() {
        let base = spawn_stub(vec![(429, ""), (429, ""), (200, PROFILE_BODY)]).await;
        let cache = Arc::new(LookupCache::load(None, 1000));
        let fetcher = fetcher_with(test_api(base), cache.clone());

        let started = Instant::now();
        let result = fetcher.fetch("SLOW").await;

        // Two sleeps: base × 1 + base × 2.
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert_eq!(result.market_cap.as_deref(), Some("100"));
        assert_eq!(cache.requests_today(), 3);
    }

    #[tokio::test]
    async fn retries_exhausted_yields_null_result() {
        let base = spawn_stub(vec![(500, ""), (500, ""), (500, "")]).await;
        let cache = Arc::new(LookupCache::load(None, 1000));
        let fetcher = fetcher_with(test_api(base), cache.clone());

        let result = fetcher.fetch("ERR").await;

        assert!(result.is_empty());
        assert_eq!(cache.requests_today(), 3);
    }

    #[tokio::test]
    async fn quota_exhaustion_short_circuits_without_network() {
        let base = spawn_stub(vec![(200, PROFILE_BODY)]).await;
        let cache = Arc::new(LookupCache::load(None, 1));
        let fetcher = fetcher_with(test_api(base), cache.clone());

        let first = fetcher.fetch("ACM").await;
        let second = fetcher.fetch("OTHER").await;

        assert_eq!(first.sector.as_deref(), Some("Tech"));
        assert!(second.is_empty());
        assert_eq!(cache.requests_today(), 1);
    }

    #[tokio::test]
    async fn isin_is_unresolvable_when_resolution_disabled() {
        let cache = Arc::new(LookupCache::load(None, 1000));
        let api = test_api("http://127.0.0.1:1".to_string());
        let fetcher = fetcher_with(api, cache.clone());

        let result = fetcher.fetch("US0378331005").await;

        assert!(result.is_empty());
        assert_eq!(cache.requests_today(), 0);
    }

    #[tokio::test]
    async fn resolves_isin_then_fetches_profile() {
        let base = spawn_stub(vec![
            (200, r#"[{"symbol":"AAPL"}]"#),
            (200, PROFILE_BODY),
        ])
        .await;
        let cache = Arc::new(LookupCache::load(None, 1000));
        let mut api = test_api(base);
        api.resolve_isin = true;
        let fetcher = fetcher_with(api, cache.clone());

        let result = fetcher.fetch("US0378331005").await;

        assert_eq!(result.sector.as_deref(), Some("Tech"));
        assert_eq!(cache.get_isin("US0378331005"), Some("AAPL".to_string()));
        assert_eq!(cache.requests_today(), 2);
    }

    #[tokio::test]
    async fn failed_isin_resolution_yields_null_result() {
        let base = spawn_stub(vec![(200, "[]")]).await;
        let cache = Arc::new(LookupCache::load(None, 1000));
        let mut api = test_api(base);
        api.resolve_isin = true;
        let fetcher = fetcher_with(api, cache.clone());

        let result = fetcher.fetch("US0378331005").await;

        assert!(result.is_empty());
        assert_eq!(cache.requests_today(), 1);
    }
}
