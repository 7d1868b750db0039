use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::common::error::{PipelineError, Result};
use crate::config::GeocodingConfig;
use crate::domain::Coordinates;
use crate::pipeline::enrich::GeocodePort;

/// Nominatim (OpenStreetMap) geocoding client. Free and keyless, which is
/// why the enricher paces calls to it instead of hammering it.
pub struct NominatimClient {
    base_url: String,
    user_agent: String,
    client: reqwest::Client,
}

/// One search hit; Nominatim returns coordinates as strings.
#[derive(Debug, Deserialize)]
struct NominatimResult {
    lat: String,
    lon: String,
}

impl NominatimClient {
    pub fn new(config: &GeocodingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
            client,
        })
    }
}

#[async_trait]
impl GeocodePort for NominatimClient {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>> {
        let url = format!("{}/search", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .header("User-Agent", &self.user_agent)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(PipelineError::lookup(
                address,
                format!("geocoder returned HTTP {}", resp.status()),
            ));
        }

        let results: Vec<NominatimResult> = resp.json().await?;
        let Some(first) = results.first() else {
            return Ok(None);
        };

        let latitude: f64 = first
            .lat
            .parse()
            .map_err(|e| PipelineError::lookup(address, format!("bad latitude: {}", e)))?;
        let longitude: f64 = first
            .lon
            .parse()
            .map_err(|e| PipelineError::lookup(address, format!("bad longitude: {}", e)))?;

        debug!(address = %address, latitude, longitude, "geocoded address");
        Ok(Some(Coordinates {
            latitude,
            longitude,
        }))
    }
}
