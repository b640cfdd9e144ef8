//! OpenAlex REST API client.
//!
//! Endpoints used:
//!   concepts: https://api.openalex.org/concepts?search={label}
//!   works:    https://api.openalex.org/works?filter=concepts.id:{id},...
//!
//! The works listing uses cursor pagination (`meta.next_cursor`), filtered
//! to works published on or after the configured cutoff and sorted by
//! descending citation count. Requests are paced by a fixed inter-page
//! delay; page fetches get bounded retries with exponential backoff.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use citemill_common::net::NetClient;
use citemill_common::Result;
use citemill_config::Config;

use super::{FetchOutcome, WorksSource};

const CONCEPTS_URL: &str = "https://api.openalex.org/concepts";
const WORKS_URL:    &str = "https://api.openalex.org/works";

/// Bounded exponential backoff for page fetches.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retrying after the given (1-based) failed attempt:
    /// base, 2*base, 4*base, ...
    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

pub struct OpenAlexClient {
    client: NetClient,
    concepts_url: String,
    works_url: String,
    page_size: usize,
    page_delay: Duration,
    from_publication_date: NaiveDate,
    retry: RetryPolicy,
}

impl OpenAlexClient {
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = NetClient::new(
            &config.http.user_agent,
            Duration::from_secs(config.http.timeout_secs),
        )?;
        Ok(Self {
            client,
            concepts_url: CONCEPTS_URL.to_string(),
            works_url: WORKS_URL.to_string(),
            page_size: config.ingestion.page_size,
            page_delay: Duration::from_millis(config.ingestion.page_delay_ms),
            from_publication_date: config.ingestion.from_publication_date,
            retry: RetryPolicy {
                max_attempts: config.ingestion.retry.max_attempts,
                base_delay: Duration::from_millis(config.ingestion.retry.base_delay_ms),
            },
        })
    }

    /// Point the client at a different works/concepts host (test servers).
    pub fn with_base_url(mut self, base: &str) -> Self {
        self.concepts_url = format!("{}/concepts", base.trim_end_matches('/'));
        self.works_url = format!("{}/works", base.trim_end_matches('/'));
        self
    }

    /// GET a JSON document, retrying transport errors and 5xx responses
    /// up to the configured attempt budget. Any other non-success status
    /// is a hard failure for this request.
    async fn get_json(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> anyhow::Result<serde_json::Value> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.client.get(url)?.query(params).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(resp.json::<serde_json::Value>().await?);
                }
                Ok(resp) if resp.status().is_server_error()
                    && attempt < self.retry.max_attempts =>
                {
                    warn!(status = %resp.status(), attempt, "server error, backing off");
                }
                Ok(resp) => {
                    anyhow::bail!("request failed: HTTP {}", resp.status());
                }
                Err(e) if attempt < self.retry.max_attempts => {
                    warn!(error = %e, attempt, "request error, backing off");
                }
                Err(e) => return Err(e.into()),
            }
            tokio::time::sleep(self.retry.delay_for(attempt)).await;
        }
    }
}

#[async_trait]
impl WorksSource for OpenAlexClient {
    #[instrument(skip(self))]
    async fn resolve_concept(&self, topic: &str) -> anyhow::Result<Option<String>> {
        let body = self
            .get_json(&self.concepts_url, &[("search", topic.to_string())])
            .await?;

        let id = body["results"]
            .as_array()
            .and_then(|r| r.first())
            .and_then(|c| c["id"].as_str())
            .map(String::from);

        debug!(topic, concept_id = ?id, "concept search result");
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn fetch_works(
        &self,
        concept_id: &str,
        limit: usize,
    ) -> anyhow::Result<FetchOutcome> {
        let filter = format!(
            "concepts.id:{},from_publication_date:{}",
            concept_id, self.from_publication_date
        );

        let mut works: Vec<serde_json::Value> = Vec::new();
        let mut cursor = Some("*".to_string());
        let mut pages = 0usize;
        let mut complete = true;

        while works.len() < limit {
            let Some(current) = cursor.take() else { break };

            let params = [
                ("filter", filter.clone()),
                ("per-page", self.page_size.to_string()),
                ("sort", "cited_by_count:desc".to_string()),
                ("cursor", current),
            ];

            let body = match self.get_json(&self.works_url, &params).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(error = %e, fetched = works.len(),
                        "page fetch failed, keeping partial results");
                    complete = false;
                    break;
                }
            };
            pages += 1;

            let results = body["results"].as_array().cloned().unwrap_or_default();
            if results.is_empty() {
                break;
            }
            works.extend(results);
            cursor = body["meta"]["next_cursor"].as_str().map(String::from);

            debug!(fetched = works.len(), pages, "accumulated works");

            // Be nice to the API
            tokio::time::sleep(self.page_delay).await;
        }

        Ok(FetchOutcome { works, pages, complete })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let retry = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        };
        assert_eq!(retry.delay_for(1), Duration::from_millis(500));
        assert_eq!(retry.delay_for(2), Duration::from_millis(1000));
        assert_eq!(retry.delay_for(3), Duration::from_millis(2000));
    }

    #[test]
    fn test_base_url_override_rewrites_both_endpoints() {
        let client = OpenAlexClient::from_config(&Config::default())
            .unwrap()
            .with_base_url("http://localhost:9999/");
        assert_eq!(client.concepts_url, "http://localhost:9999/concepts");
        assert_eq!(client.works_url, "http://localhost:9999/works");
    }
}
