use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw candidate record as produced by a collector. Untrusted free text;
/// consumed exactly once by the validator and never persisted directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawListing {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    pub location: RawLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub source: String,
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_count: Option<i64>,
}

/// City and state exactly as scraped. State may be a code, a full name,
/// or garbage; the validator decides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLocation {
    pub city: String,
    pub state: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub city: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// One source that contributed to a listing. Grows as duplicates merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub name: String,
    pub url: String,
}

/// Social profile handles discovered during enrichment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialProfiles {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facebook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
}

impl SocialProfiles {
    pub fn is_empty(&self) -> bool {
        self.facebook.is_none()
            && self.instagram.is_none()
            && self.youtube.is_none()
            && self.twitter.is_none()
    }
}

/// The schema-valid, normalized listing shape that flows from the normalizer
/// through enrichment and deduplication into the storage sink.
///
/// Invariants held by construction: `location.state` is a 2-letter code from
/// the 50-state set; `contact.phone`, if present, is "(NNN) NNN-NNNN";
/// `contact.website`, if present, starts with `https://` and has no trailing
/// slash; `services` contains no duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    pub location: Location,
    pub contact: Contact,
    pub services: Vec<String>,
    pub description: String,
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_media: Option<SocialProfiles>,
    pub sources: Vec<SourceRef>,
}

/// Lower-cased (name, city, state) triple used to detect duplicate listings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupeKey {
    pub name: String,
    pub city: String,
    pub state: String,
}

/// Namespace for deriving stable listing IDs from the dedupe key.
const LISTING_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6d, 0x61, 0x67, 0x69, 0x63, 0x69, 0x61, 0x6e, 0x2d, 0x64, 0x69, 0x72, 0x65, 0x63, 0x74,
    0x79,
]);

impl Listing {
    pub fn dedupe_key(&self) -> DedupeKey {
        DedupeKey {
            name: self.name.to_lowercase(),
            city: self.location.city.to_lowercase(),
            state: self.location.state.to_lowercase(),
        }
    }

    /// Stable natural identifier derived from the dedupe key. The same
    /// magician in the same city always maps to the same UUID, which is what
    /// makes loader re-runs upsert instead of duplicate.
    pub fn natural_id(&self) -> Uuid {
        let key = self.dedupe_key();
        let material = format!("{}|{}|{}", key.name, key.city, key.state);
        Uuid::new_v5(&LISTING_NAMESPACE, material.as_bytes())
    }
}

/// Audit row for one loader invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadRun {
    pub id: Option<Uuid>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub attempted: u64,
    pub loaded: u64,
    pub failed: u64,
}

impl LoadRun {
    pub fn begin() -> Self {
        Self {
            id: None,
            started_at: Utc::now(),
            finished_at: None,
            attempted: 0,
            loaded: 0,
            failed: 0,
        }
    }
}
