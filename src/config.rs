use serde::Deserialize;
use std::fs;

use crate::common::error::{PipelineError, Result};

/// Pipeline configuration loaded from `config.toml` with environment
/// overrides for credentials. A missing config file or database path is the
/// one error class that aborts the run before any records are processed.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub geocoding: GeocodingConfig,
    #[serde(default)]
    pub places: PlacesConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub review: ReviewConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingConfig {
    #[serde(default = "default_geocoding_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Minimum delay between consecutive geocode calls, per the Nominatim
    /// usage policy.
    #[serde(default = "default_geocode_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlacesConfig {
    /// Places API key. Usually supplied via the PLACES_API_KEY environment
    /// variable; when absent, business-detail enrichment is skipped.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_places_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoaderConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewConfig {
    /// Where invalid listings are written for manual review.
    #[serde(default = "default_review_path")]
    pub path: String,
}

fn default_geocoding_base_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_user_agent() -> String {
    "MagicianDirectory/1.0".to_string()
}

fn default_geocode_delay_ms() -> u64 {
    1000
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_places_base_url() -> String {
    "https://maps.googleapis.com/maps/api/place".to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_review_path() -> String {
    "data/invalid-listings.json".to_string()
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoding_base_url(),
            user_agent: default_user_agent(),
            delay_ms: default_geocode_delay_ms(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            path: default_review_path(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    pub fn load_from(config_path: &str) -> Result<Self> {
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            PipelineError::Config(format!(
                "failed to read config file '{}': {}",
                config_path, e
            ))
        })?;

        let mut config: Config = toml::from_str(&config_content)?;

        // Credentials come from the environment when set.
        if let Ok(key) = std::env::var("PLACES_API_KEY") {
            if !key.is_empty() {
                config.places.api_key = Some(key);
            }
        }
        if let Ok(path) = std::env::var("DATABASE_PATH") {
            if !path.is_empty() {
                config.database.path = path;
            }
        }

        if config.database.path.trim().is_empty() {
            return Err(PipelineError::Config(
                "database.path must be set (config.toml or DATABASE_PATH)".to_string(),
            ));
        }

        Ok(config)
    }
}
