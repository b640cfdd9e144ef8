//! Scholarly-works source clients.

pub mod openalex;

use async_trait::async_trait;

/// What one paged fetch produced. `complete` is false when pagination
/// stopped early on a fetch failure; the accumulated records are still
/// usable partial results.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub works: Vec<serde_json::Value>,
    pub pages: usize,
    pub complete: bool,
}

/// Common interface for scholarly-works sources.
#[async_trait]
pub trait WorksSource: Send + Sync {
    /// Resolve a human topic label to a source-side concept id.
    /// `Ok(None)` means the source has no matching concept.
    async fn resolve_concept(&self, topic: &str) -> anyhow::Result<Option<String>>;

    /// Accumulate raw work records for a resolved concept until at least
    /// `limit` are gathered or the source runs out of pages.
    async fn fetch_works(&self, concept_id: &str, limit: usize)
        -> anyhow::Result<FetchOutcome>;
}
