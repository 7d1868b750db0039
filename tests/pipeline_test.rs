use std::sync::Arc;

use magician_scraper::domain::{RawListing, RawLocation};
use magician_scraper::pipeline::load::Loader;
use magician_scraper::pipeline::orchestrator::PipelineOrchestrator;
use magician_scraper::storage::{InMemoryStorage, SqliteStorage, Storage};

fn raw(name: &str, city: &str, state: &str, source: &str) -> RawListing {
    RawListing {
        name: name.to_string(),
        business_name: None,
        location: RawLocation {
            city: city.to_string(),
            state: state.to_string(),
        },
        website: None,
        phone: None,
        email: None,
        source: source.to_string(),
        source_url: format!("https://{}.example/{}", source.to_lowercase(), name),
        listing_url: None,
        description: None,
        services: None,
        price_range: None,
        rating: None,
        review_count: None,
    }
}

fn orchestrator(storage: Arc<dyn Storage>, review_path: &std::path::Path) -> PipelineOrchestrator {
    // No enricher: the offline path every external outage degrades to.
    PipelineOrchestrator::new(None, Loader::new(storage), review_path)
}

#[tokio::test]
async fn offline_run_loads_listings_without_coordinates() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(InMemoryStorage::new());
    let orch = orchestrator(storage.clone(), &dir.path().join("invalid.json"));

    let batch = vec![
        raw("Dave Wonder", "Miami", "FL", "SiteA"),
        raw("Luna Marvel", "Orlando", "FL", "SiteA"),
    ];
    let summary = orch.run(batch).await.unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.valid, 2);
    assert_eq!(summary.loaded, 2);
    assert_eq!(summary.failed_to_load, 0);
    assert_eq!(summary.enriched, 0);
    assert_eq!(storage.count_listings().await.unwrap(), 2);

    let listings = storage.all_listings();
    assert!(listings.iter().all(|l| l.location.coordinates.is_none()));
}

#[tokio::test]
async fn duplicate_across_sources_merges_provenance_and_description() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(InMemoryStorage::new());
    let orch = orchestrator(storage.clone(), &dir.path().join("invalid.json"));

    let mut first = raw("Dave Wonder", "Miami", "FL", "SiteA");
    first.description = Some("Close-up magician.".to_string());
    let mut second = raw("dave wonder", "MIAMI", "FL", "SiteB");
    second.description =
        Some("Close-up magician performing at corporate events across South Florida.".to_string());
    second.phone = Some("305-555-1234".to_string());

    let (listings, summary) = orch.process_only(vec![first, second]).await.unwrap();

    assert_eq!(summary.merged_duplicates, 1);
    assert_eq!(listings.len(), 1);
    let merged = &listings[0];
    assert_eq!(merged.sources.len(), 2);
    assert!(merged.description.contains("South Florida"));
    assert_eq!(merged.contact.phone.as_deref(), Some("(305) 555-1234"));
}

#[tokio::test]
async fn same_source_duplicates_keep_one_provenance_entry_per_record() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(InMemoryStorage::new());
    let orch = orchestrator(storage.clone(), &dir.path().join("invalid.json"));

    // The same record scraped twice from the same source.
    let batch = vec![
        raw("Dave Wonder", "Miami", "FL", "SiteA"),
        raw("Dave Wonder", "Miami", "FL", "SiteA"),
    ];
    let (listings, summary) = orch.process_only(batch).await.unwrap();

    assert_eq!(summary.merged_duplicates, 1);
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].sources.len(), 2);
}

#[tokio::test]
async fn clean_run_removes_stale_review_file() {
    let dir = tempfile::tempdir().unwrap();
    let review_path = dir.path().join("invalid.json");
    let storage = Arc::new(InMemoryStorage::new());
    let orch = orchestrator(storage.clone(), &review_path);

    // First run rejects a record and writes the review file.
    orch.run(vec![raw("X", "Smallville", "Krypton", "SiteB")])
        .await
        .unwrap();
    assert!(review_path.exists());

    // A following clean run must not leave it behind.
    orch.run(vec![raw("Dave Wonder", "Miami", "FL", "SiteA")])
        .await
        .unwrap();
    assert!(!review_path.exists());
}

#[tokio::test]
async fn rerunning_the_pipeline_does_not_duplicate_database_rows() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let orch = orchestrator(storage.clone(), &dir.path().join("invalid.json"));

    let batch = vec![
        raw("Dave Wonder", "Miami", "FL", "SiteA"),
        raw("Luna Marvel", "Orlando", "FL", "SiteA"),
    ];
    orch.run(batch.clone()).await.unwrap();
    let count_after_first = storage.count_listings().await.unwrap();
    let summary = orch.run(batch).await.unwrap();

    assert_eq!(summary.loaded, 2);
    assert_eq!(storage.count_listings().await.unwrap(), count_after_first);
}

#[tokio::test]
async fn invalid_records_go_to_the_review_file_not_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let review_path = dir.path().join("invalid.json");
    let storage = Arc::new(InMemoryStorage::new());
    let orch = orchestrator(storage.clone(), &review_path);

    let batch = vec![
        raw("Dave Wonder", "Miami", "FL", "SiteA"),
        // Fictional state, single-letter name.
        raw("X", "Smallville", "Krypton", "SiteB"),
    ];
    let summary = orch.run(batch).await.unwrap();

    assert_eq!(summary.valid, 1);
    assert_eq!(summary.invalid, 1);
    assert_eq!(storage.count_listings().await.unwrap(), 1);

    let review = std::fs::read_to_string(&review_path).unwrap();
    let entries: serde_json::Value = serde_json::from_str(&review).unwrap();
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    let violations = entries[0]["violations"].as_array().unwrap();
    assert!(violations.iter().any(|v| v.as_str().unwrap().contains("state")));
}

#[tokio::test]
async fn full_state_names_are_repaired_before_validation() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(InMemoryStorage::new());
    let orch = orchestrator(storage.clone(), &dir.path().join("invalid.json"));

    let batch = vec![raw("Dave Wonder", "Miami", "Florida", "SiteA")];
    let (listings, summary) = orch.process_only(batch).await.unwrap();

    assert_eq!(summary.invalid, 0);
    assert_eq!(listings[0].location.state, "FL");
}
