//! Bronze stage: per-topic raw batch persistence.
//!
//! Each run writes one immutable JSON file per topic under the bronze
//! area. Provenance lives in the filename (topic, UTC timestamp, short
//! random disambiguator), so concurrent or same-day runs never collide
//! and re-runs simply add batches for the flattener to merge.

use chrono::Utc;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use citemill_common::Result;
use citemill_config::Config;

use crate::sources::WorksSource;

/// Summary of one per-topic ingestion run.
#[derive(Debug, Clone)]
pub struct IngestionReport {
    pub topic: String,
    pub concept_id: String,
    pub pages: usize,
    pub works_persisted: usize,
    pub complete: bool,
    pub path: PathBuf,
    pub duration_ms: u64,
}

/// Fetch and persist one topic's raw batch.
///
/// Returns `Ok(None)` when the topic cannot be resolved to a concept or
/// the source errors before any page is fetched; nothing is written and
/// other topics are unaffected. Partial paginations are persisted.
/// Storage failures are the only errors that propagate.
#[instrument(skip(source, config))]
pub async fn fetch_topic(
    source: &dyn WorksSource,
    config: &Config,
    topic: &str,
) -> Result<Option<IngestionReport>> {
    let t0 = Instant::now();

    let concept_id = match source.resolve_concept(topic).await {
        Ok(Some(id)) => id,
        Ok(None) => {
            warn!(topic, "no matching concept, skipping topic");
            return Ok(None);
        }
        Err(e) => {
            warn!(topic, error = %e, "concept resolution failed, skipping topic");
            return Ok(None);
        }
    };
    info!(topic, concept_id = %concept_id, "resolved concept");

    let limit = config.ingestion.works_per_topic;
    let mut outcome = match source.fetch_works(&concept_id, limit).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(topic, error = %e, "works fetch failed, skipping topic");
            return Ok(None);
        }
    };
    outcome.works.truncate(limit);

    std::fs::create_dir_all(&config.storage.bronze_dir)?;
    let path = config.storage.bronze_dir.join(batch_filename(topic));
    let payload = serde_json::to_string_pretty(&outcome.works)?;
    std::fs::write(&path, payload)?;

    let report = IngestionReport {
        topic: topic.to_string(),
        concept_id,
        pages: outcome.pages,
        works_persisted: outcome.works.len(),
        complete: outcome.complete,
        path,
        duration_ms: t0.elapsed().as_millis() as u64,
    };
    info!(
        topic,
        works = report.works_persisted,
        pages = report.pages,
        complete = report.complete,
        path = %report.path.display(),
        "bronze batch persisted"
    );
    Ok(Some(report))
}

/// `works_{topic}_{YYYYmmdd_HHMMSS}_{8-char-suffix}.json`
fn batch_filename(topic: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "works_{}_{}_{}.json",
        sanitize_topic(topic),
        timestamp,
        &suffix[..8]
    )
}

fn sanitize_topic(topic: &str) -> String {
    topic
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::FetchOutcome;
    use async_trait::async_trait;

    struct StubSource {
        concept: Option<String>,
        works: Vec<serde_json::Value>,
    }

    #[async_trait]
    impl WorksSource for StubSource {
        async fn resolve_concept(&self, _topic: &str) -> anyhow::Result<Option<String>> {
            Ok(self.concept.clone())
        }

        async fn fetch_works(
            &self,
            _concept_id: &str,
            _limit: usize,
        ) -> anyhow::Result<FetchOutcome> {
            Ok(FetchOutcome {
                works: self.works.clone(),
                pages: 1,
                complete: true,
            })
        }
    }

    fn test_config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.storage.bronze_dir = dir.join("bronze");
        config.ingestion.works_per_topic = 3;
        config
    }

    #[tokio::test]
    async fn test_unresolved_concept_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let source = StubSource { concept: None, works: vec![] };

        let report = fetch_topic(&source, &config, "No Such Topic").await.unwrap();
        assert!(report.is_none());
        assert!(!config.storage.bronze_dir.exists());
    }

    #[tokio::test]
    async fn test_batch_persisted_and_truncated_to_limit() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let works = (0..5)
            .map(|i| serde_json::json!({ "id": format!("https://openalex.org/W{i}") }))
            .collect();
        let source = StubSource {
            concept: Some("https://openalex.org/C1".to_string()),
            works,
        };

        let report = fetch_topic(&source, &config, "Artificial intelligence")
            .await
            .unwrap()
            .expect("report");
        assert_eq!(report.works_persisted, 3);

        let text = std::fs::read_to_string(&report.path).unwrap();
        let persisted: Vec<serde_json::Value> = serde_json::from_str(&text).unwrap();
        assert_eq!(persisted.len(), 3);

        let name = report.path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("works_Artificial_intelligence_"));
        assert!(name.ends_with(".json"));
    }

    #[test]
    fn test_same_second_batches_get_distinct_names() {
        let a = batch_filename("Physics");
        let b = batch_filename("Physics");
        assert_ne!(a, b);
    }

    #[test]
    fn test_sanitize_topic_collapses_whitespace() {
        assert_eq!(sanitize_topic("Artificial  intelligence"), "Artificial_intelligence");
        assert_eq!(sanitize_topic("Physics"), "Physics");
    }
}
