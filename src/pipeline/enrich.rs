use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::common::error::Result;
use crate::domain::{Coordinates, Listing, SocialProfiles};
use crate::infra::pacer::Pacer;

/// Geocoding lookup boundary. Implementations must distinguish "no result"
/// (Ok(None)) from transport failure (Err).
#[async_trait]
pub trait GeocodePort: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>>;
}

/// Business metadata returned by a places details lookup. Empty strings are
/// treated as absent by the enricher.
#[derive(Debug, Clone, Default)]
pub struct PlaceDetails {
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
    pub website: Option<String>,
    pub phone: Option<String>,
}

/// Places lookup boundary: text search resolves a query to a place id, then
/// a details request fetches the metadata fields.
#[async_trait]
pub trait PlacesPort: Send + Sync {
    async fn search(&self, query: &str) -> Result<Option<String>>;
    async fn details(&self, place_id: &str) -> Result<Option<PlaceDetails>>;
}

/// Which enrichment sub-steps landed for a record. Used by the orchestrator
/// to count fully vs partially enriched listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnrichmentStatus {
    pub geocoded: bool,
    pub business_details: bool,
    pub social_profiles: bool,
}

impl EnrichmentStatus {
    pub fn any(&self) -> bool {
        self.geocoded || self.business_details || self.social_profiles
    }
}

/// Augments normalized listings with coordinates and third-party business
/// metadata. Every sub-step is best-effort: lookups that fail are logged and
/// skipped, and a record that gains nothing is returned unmodified.
pub struct Enricher {
    geocoder: Arc<dyn GeocodePort>,
    places: Option<Arc<dyn PlacesPort>>,
    geocode_pacer: Pacer,
}

impl Enricher {
    pub fn new(geocoder: Arc<dyn GeocodePort>, places: Option<Arc<dyn PlacesPort>>) -> Self {
        Self::with_geocode_delay(geocoder, places, Duration::from_millis(1000))
    }

    pub fn with_geocode_delay(
        geocoder: Arc<dyn GeocodePort>,
        places: Option<Arc<dyn PlacesPort>>,
        geocode_delay: Duration,
    ) -> Self {
        Self {
            geocoder,
            places,
            geocode_pacer: Pacer::new(geocode_delay),
        }
    }

    pub async fn enrich(&self, mut listing: Listing) -> (Listing, EnrichmentStatus) {
        let mut status = EnrichmentStatus::default();

        status.geocoded = self.attach_coordinates(&mut listing).await;
        status.business_details = self.attach_business_details(&mut listing).await;
        status.social_profiles = self.attach_social_profiles(&mut listing).await;

        (listing, status)
    }

    /// Geocode "city, ST, USA". Serialized through the pacer to respect the
    /// lookup service's usage policy.
    async fn attach_coordinates(&self, listing: &mut Listing) -> bool {
        let address = format!("{}, {}, USA", listing.location.city, listing.location.state);
        self.geocode_pacer.pause().await;
        match self.geocoder.geocode(&address).await {
            Ok(Some(coordinates)) => {
                listing.location.coordinates = Some(coordinates);
                true
            }
            Ok(None) => {
                debug!(address = %address, "geocoder returned no result");
                false
            }
            Err(e) => {
                warn!(address = %address, error = %e, "geocoding failed, leaving coordinates absent");
                false
            }
        }
    }

    /// Look up the business on the places service and fold in rating, review
    /// count, website, and phone. A present field is never overwritten with
    /// an empty lookup value.
    async fn attach_business_details(&self, listing: &mut Listing) -> bool {
        let Some(places) = &self.places else {
            return false;
        };
        let Some(business_name) = listing.business_name.clone() else {
            return false;
        };

        let query = format!(
            "{} magician {} {}",
            business_name, listing.location.city, listing.location.state
        );

        let place_id = match places.search(&query).await {
            Ok(Some(place_id)) => place_id,
            Ok(None) => {
                debug!(query = %query, "places search returned no match");
                return false;
            }
            Err(e) => {
                warn!(query = %query, error = %e, "places search failed");
                return false;
            }
        };

        let details = match places.details(&place_id).await {
            Ok(Some(details)) => details,
            Ok(None) => {
                debug!(place_id = %place_id, "places details returned nothing");
                return false;
            }
            Err(e) => {
                warn!(place_id = %place_id, error = %e, "places details lookup failed");
                return false;
            }
        };

        if let Some(rating) = details.rating {
            listing.rating = Some(rating);
        }
        if let Some(review_count) = details.review_count {
            listing.review_count = Some(review_count);
        }
        if let Some(website) = non_empty(details.website) {
            listing.contact.website = Some(website);
        }
        if let Some(phone) = non_empty(details.phone) {
            listing.contact.phone = Some(phone);
        }
        true
    }

    /// Social handle discovery. No platform integration is wired up yet, so
    /// this step only reports whether a profile set is already present; it
    /// must never raise or block the pipeline.
    async fn attach_social_profiles(&self, listing: &mut Listing) -> bool {
        let query = listing
            .business_name
            .clone()
            .unwrap_or_else(|| format!("{} magician", listing.name));
        debug!(query = %query, "social profile discovery not implemented, skipping");
        listing
            .social_media
            .as_ref()
            .map(|s: &SocialProfiles| !s.is_empty())
            .unwrap_or(false)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
