use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

use super::Storage;
use crate::common::error::{PipelineError, Result};
use crate::domain::{Listing, LoadRun, Location};

/// In-memory storage implementation for development and testing. Mirrors the
/// upsert semantics of the real sink: writes are keyed on listing id, so
/// repeated loads leave row counts unchanged.
#[derive(Default)]
pub struct InMemoryStorage {
    listings: Arc<Mutex<HashMap<Uuid, Listing>>>,
    locations: Arc<Mutex<HashMap<Uuid, Location>>>,
    services: Arc<Mutex<HashMap<Uuid, Vec<String>>>>,
    availability: Arc<Mutex<HashMap<Uuid, String>>>,
    load_runs: Arc<Mutex<HashMap<Uuid, LoadRun>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_listing(&self, id: Uuid) -> Option<Listing> {
        self.listings.lock().unwrap().get(&id).cloned()
    }

    pub fn get_location(&self, id: Uuid) -> Option<Location> {
        self.locations.lock().unwrap().get(&id).cloned()
    }

    pub fn get_services(&self, id: Uuid) -> Option<Vec<String>> {
        self.services.lock().unwrap().get(&id).cloned()
    }

    pub fn get_availability(&self, id: Uuid) -> Option<String> {
        self.availability.lock().unwrap().get(&id).cloned()
    }

    pub fn all_listings(&self) -> Vec<Listing> {
        self.listings.lock().unwrap().values().cloned().collect()
    }

    pub fn load_run_count(&self) -> usize {
        self.load_runs.lock().unwrap().len()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn upsert_listing(&self, listing: &Listing) -> Result<Uuid> {
        let id = listing.id.unwrap_or_else(|| listing.natural_id());
        let mut stored = listing.clone();
        stored.id = Some(id);

        let mut listings = self.listings.lock().unwrap();
        listings.insert(id, stored);

        debug!("Upserted listing: {} with id {}", listing.name, id);
        Ok(id)
    }

    async fn upsert_location(&self, listing_id: Uuid, location: &Location) -> Result<()> {
        let mut locations = self.locations.lock().unwrap();
        locations.insert(listing_id, location.clone());
        Ok(())
    }

    async fn upsert_services(&self, listing_id: Uuid, services: &[String]) -> Result<()> {
        let mut stored = self.services.lock().unwrap();
        stored.insert(listing_id, services.to_vec());
        Ok(())
    }

    async fn upsert_availability(&self, listing_id: Uuid, availability: &str) -> Result<()> {
        let mut stored = self.availability.lock().unwrap();
        stored.insert(listing_id, availability.to_string());
        Ok(())
    }

    async fn upsert_rating(
        &self,
        listing_id: Uuid,
        rating: Option<f64>,
        review_count: Option<u32>,
    ) -> Result<()> {
        let mut listings = self.listings.lock().unwrap();
        let listing = listings.get_mut(&listing_id).ok_or_else(|| {
            PipelineError::SinkWrite(format!("no listing with id {}", listing_id))
        })?;
        listing.rating = rating;
        listing.review_count = review_count;
        Ok(())
    }

    async fn create_load_run(&self, run: &mut LoadRun) -> Result<()> {
        let id = Uuid::new_v4();
        run.id = Some(id);

        let mut runs = self.load_runs.lock().unwrap();
        runs.insert(id, run.clone());
        Ok(())
    }

    async fn finish_load_run(&self, run: &LoadRun) -> Result<()> {
        let id = run.id.ok_or_else(|| {
            PipelineError::SinkWrite("cannot finish a load run without an id".to_string())
        })?;

        let mut runs = self.load_runs.lock().unwrap();
        runs.insert(id, run.clone());
        Ok(())
    }

    async fn count_listings(&self) -> Result<usize> {
        Ok(self.listings.lock().unwrap().len())
    }
}
