//! Test concept resolution and works paging against the real OpenAlex API.
//!
//! Run with: cargo test --package citemill-ingestion --test test_openalex_live -- --ignored --nocapture

use citemill_config::Config;
use citemill_ingestion::sources::openalex::OpenAlexClient;
use citemill_ingestion::sources::WorksSource;

#[tokio::test]
#[ignore] // Requires network access
async fn test_resolve_and_fetch_artificial_intelligence() {
    let mut config = Config::default();
    config.ingestion.works_per_topic = 5;
    config.ingestion.page_size = 5;

    let client = OpenAlexClient::from_config(&config).expect("client build failed");

    let concept_id = client
        .resolve_concept("Artificial intelligence")
        .await
        .expect("concept search failed")
        .expect("concept should resolve");
    println!("Concept: {concept_id}");
    assert!(concept_id.contains("openalex.org"));

    let outcome = client
        .fetch_works(&concept_id, 5)
        .await
        .expect("works fetch failed");
    println!("Fetched {} works over {} pages", outcome.works.len(), outcome.pages);
    for work in &outcome.works {
        println!("- {:?} ({:?} citations)", work["title"], work["cited_by_count"]);
    }

    assert!(!outcome.works.is_empty(), "Should fetch at least one work");
}

#[tokio::test]
#[ignore] // Requires network access
async fn test_unresolvable_topic_returns_none() {
    let config = Config::default();
    let client = OpenAlexClient::from_config(&config).expect("client build failed");

    let concept = client
        .resolve_concept("zzzz-no-such-concept-zzzz")
        .await
        .expect("concept search failed");
    assert!(concept.is_none());
}
