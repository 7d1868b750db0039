use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::domain::{Listing, LoadRun};
use crate::storage::Storage;

/// Availability written for every listing; the directory treats all scraped
/// magicians as bookable by appointment until they claim their profile.
const DEFAULT_AVAILABILITY: &str = "By Appointment";

/// Summary counts for one loader invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadReport {
    pub attempted: usize,
    pub loaded: usize,
    pub failed: usize,
}

/// Upserts final listings into the storage sink in fixed-size batches. Each
/// record's failure is independent: a parent or dependent-row error logs,
/// counts, and moves on to the next record.
pub struct Loader {
    storage: Arc<dyn Storage>,
    batch_size: usize,
}

impl Loader {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_batch_size(storage, 100)
    }

    pub fn with_batch_size(storage: Arc<dyn Storage>, batch_size: usize) -> Self {
        Self {
            storage,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn load(&self, listings: &[Listing]) -> LoadReport {
        let mut report = LoadReport::default();

        let mut run = LoadRun::begin();
        let run_tracked = match self.storage.create_load_run(&mut run).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "failed to record load run, continuing without audit row");
                false
            }
        };

        for batch in listings.chunks(self.batch_size) {
            for listing in batch {
                report.attempted += 1;
                match self.load_one(listing).await {
                    Ok(()) => report.loaded += 1,
                    Err(e) => {
                        report.failed += 1;
                        error!(
                            name = %listing.name,
                            city = %listing.location.city,
                            state = %listing.location.state,
                            error = %e,
                            "failed to load listing, skipping"
                        );
                    }
                }
            }
            info!(
                "Progress: {} of {} listings attempted, {} loaded, {} failed",
                report.attempted,
                listings.len(),
                report.loaded,
                report.failed
            );
        }

        if run_tracked {
            run.attempted = report.attempted as u64;
            run.loaded = report.loaded as u64;
            run.failed = report.failed as u64;
            run.finished_at = Some(Utc::now());
            if let Err(e) = self.storage.finish_load_run(&run).await {
                error!(error = %e, "failed to finalize load run audit row");
            }
        }

        report
    }

    /// Parent row first, then dependents. Any failure skips the record.
    async fn load_one(&self, listing: &Listing) -> crate::common::error::Result<()> {
        let id = self.storage.upsert_listing(listing).await?;
        self.storage.upsert_location(id, &listing.location).await?;
        self.storage.upsert_services(id, &listing.services).await?;
        self.storage
            .upsert_availability(id, DEFAULT_AVAILABILITY)
            .await?;
        self.storage
            .upsert_rating(id, listing.rating, listing.review_count)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Contact, Location, SourceRef};
    use crate::storage::InMemoryStorage;

    fn listing(name: &str, city: &str) -> Listing {
        Listing {
            id: None,
            name: name.to_string(),
            business_name: None,
            location: Location {
                city: city.to_string(),
                state: "FL".to_string(),
                coordinates: None,
            },
            contact: Contact::default(),
            services: vec!["Close-up Magic".to_string()],
            description: String::new(),
            verified: false,
            rating: Some(4.5),
            review_count: Some(12),
            social_media: None,
            sources: vec![SourceRef {
                name: "SiteA".to_string(),
                url: "https://site-a.example".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn loads_every_listing_with_dependents() {
        let storage = Arc::new(InMemoryStorage::new());
        let loader = Loader::new(storage.clone());

        let listings = vec![listing("Dave Wonder", "Miami"), listing("Luna Marvel", "Orlando")];
        let report = loader.load(&listings).await;

        assert_eq!(report.attempted, 2);
        assert_eq!(report.loaded, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(storage.count_listings().await.unwrap(), 2);

        let id = listings[0].natural_id();
        assert_eq!(
            storage.get_availability(id).as_deref(),
            Some("By Appointment")
        );
        assert_eq!(
            storage.get_services(id),
            Some(vec!["Close-up Magic".to_string()])
        );
        assert_eq!(storage.load_run_count(), 1);
    }

    #[tokio::test]
    async fn reload_does_not_duplicate_rows() {
        let storage = Arc::new(InMemoryStorage::new());
        let loader = Loader::new(storage.clone());
        let listings = vec![listing("Dave Wonder", "Miami")];

        loader.load(&listings).await;
        let count_after_first = storage.count_listings().await.unwrap();
        loader.load(&listings).await;

        assert_eq!(storage.count_listings().await.unwrap(), count_after_first);
    }

    #[tokio::test]
    async fn small_batches_cover_all_records() {
        let storage = Arc::new(InMemoryStorage::new());
        let loader = Loader::with_batch_size(storage.clone(), 2);

        let listings: Vec<Listing> = (0..5)
            .map(|i| listing(&format!("Magician Number {}", i), "Miami"))
            .collect();
        let report = loader.load(&listings).await;

        assert_eq!(report.loaded, 5);
        assert_eq!(storage.count_listings().await.unwrap(), 5);
    }
}
