use async_trait::async_trait;
use serde::Deserialize;

use crate::common::error::{PipelineError, Result};
use crate::config::PlacesConfig;
use crate::pipeline::enrich::{PlaceDetails, PlacesPort};

/// Google Places client: text search resolves a business query to a place
/// id, details fetches rating, review count, website, and phone.
pub struct GooglePlacesClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TextSearchResponse {
    #[serde(default)]
    results: Vec<TextSearchResult>,
}

#[derive(Debug, Deserialize)]
struct TextSearchResult {
    place_id: String,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    result: Option<DetailsResult>,
}

#[derive(Debug, Deserialize)]
struct DetailsResult {
    rating: Option<f64>,
    user_ratings_total: Option<u32>,
    website: Option<String>,
    formatted_phone_number: Option<String>,
}

impl GooglePlacesClient {
    /// Returns None when no API key is configured; the enricher then skips
    /// business-detail lookups entirely.
    pub fn from_config(config: &PlacesConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        Some(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl PlacesPort for GooglePlacesClient {
    async fn search(&self, query: &str) -> Result<Option<String>> {
        let url = format!("{}/textsearch/json", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("query", query), ("key", self.api_key.as_str())])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(PipelineError::lookup(
                query,
                format!("places search returned HTTP {}", resp.status()),
            ));
        }

        let body: TextSearchResponse = resp.json().await?;
        Ok(body.results.into_iter().next().map(|r| r.place_id))
    }

    async fn details(&self, place_id: &str) -> Result<Option<PlaceDetails>> {
        let url = format!("{}/details/json", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("place_id", place_id),
                (
                    "fields",
                    "rating,user_ratings_total,website,formatted_phone_number",
                ),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(PipelineError::lookup(
                place_id,
                format!("places details returned HTTP {}", resp.status()),
            ));
        }

        let body: DetailsResponse = resp.json().await?;
        Ok(body.result.map(|r| PlaceDetails {
            rating: r.rating,
            review_count: r.user_ratings_total,
            website: r.website,
            phone: r.formatted_phone_number,
        }))
    }
}
