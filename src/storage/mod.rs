mod in_memory;
mod sqlite;

pub use in_memory::InMemoryStorage;
pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use uuid::Uuid;

use crate::common::error::Result;
use crate::domain::{Listing, LoadRun, Location};

/// Storage sink contract for the loader. Every operation is an upsert keyed
/// on the listing's stable natural id, so re-running a load against data
/// already in the sink updates rows instead of duplicating them. Each
/// operation reports success or failure independently; the loader decides
/// what a dependent-row failure means for the record.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upsert the parent listing row and return its id.
    async fn upsert_listing(&self, listing: &Listing) -> Result<Uuid>;

    /// Upsert the listing's location row (city, state, coordinates).
    async fn upsert_location(&self, listing_id: Uuid, location: &Location) -> Result<()>;

    /// Replace the listing's service tag rows with the given set.
    async fn upsert_services(&self, listing_id: Uuid, services: &[String]) -> Result<()>;

    /// Upsert the listing's availability row.
    async fn upsert_availability(&self, listing_id: Uuid, availability: &str) -> Result<()>;

    /// Upsert rating and review-count fields on the listing.
    async fn upsert_rating(
        &self,
        listing_id: Uuid,
        rating: Option<f64>,
        review_count: Option<u32>,
    ) -> Result<()>;

    /// Record the start of a loader invocation; assigns `run.id`.
    async fn create_load_run(&self, run: &mut LoadRun) -> Result<()>;

    /// Record final counts for a loader invocation.
    async fn finish_load_run(&self, run: &LoadRun) -> Result<()>;

    /// Number of parent listing rows currently in the sink.
    async fn count_listings(&self) -> Result<usize>;
}
