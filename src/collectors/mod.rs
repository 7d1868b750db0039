use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::common::error::{PipelineError, Result};
use crate::domain::{RawListing, RawLocation};
use crate::pipeline::validate::US_STATES;

/// A source of raw candidate listings. Collectors are leaf components: they
/// fetch and shape records but never validate, normalize, or persist them.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Unique identifier for this source, used in provenance entries.
    fn source_name(&self) -> &str;

    /// Fetch all candidate listings from this source.
    async fn collect(&self) -> Result<Vec<RawListing>>;
}

/// Run every collector in turn, concatenating results. A failing collector
/// logs and contributes nothing; it never aborts the batch.
pub async fn collect_all(collectors: &[Box<dyn Collector>]) -> Vec<RawListing> {
    let mut listings = Vec::new();
    for collector in collectors {
        match collector.collect().await {
            Ok(batch) => {
                info!(
                    source = collector.source_name(),
                    count = batch.len(),
                    "collected raw listings"
                );
                listings.extend(batch);
            }
            Err(e) => {
                error!(
                    source = collector.source_name(),
                    error = %e,
                    "collector failed, continuing with remaining sources"
                );
            }
        }
    }
    listings
}

/// Reads raw listings from a JSON array file, the interchange format the
/// scrape scripts write.
pub struct JsonFileCollector {
    path: PathBuf,
}

impl JsonFileCollector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Collector for JsonFileCollector {
    fn source_name(&self) -> &str {
        "JSON Import"
    }

    async fn collect(&self) -> Result<Vec<RawListing>> {
        let data = tokio::fs::read_to_string(&self.path).await?;
        let listings: Vec<RawListing> = serde_json::from_str(&data)?;
        Ok(listings)
    }
}

/// One row of a listings CSV export. Services are semicolon-separated.
#[derive(Debug, Deserialize)]
struct CsvRow {
    name: String,
    #[serde(default)]
    business_name: Option<String>,
    city: String,
    state: String,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    services: Option<String>,
    source: String,
    source_url: String,
}

pub struct CsvFileCollector {
    path: PathBuf,
}

impl CsvFileCollector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Collector for CsvFileCollector {
    fn source_name(&self) -> &str {
        "CSV Import"
    }

    async fn collect(&self) -> Result<Vec<RawListing>> {
        let data = tokio::fs::read_to_string(&self.path).await?;
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let mut listings = Vec::new();
        for row in reader.deserialize::<CsvRow>() {
            // A malformed row is logged and skipped, not fatal to the file.
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "skipping malformed CSV row");
                    continue;
                }
            };
            listings.push(RawListing {
                name: row.name,
                business_name: row.business_name,
                location: RawLocation {
                    city: row.city,
                    state: row.state,
                },
                website: row.website,
                phone: row.phone,
                email: row.email,
                source: row.source,
                source_url: row.source_url,
                listing_url: None,
                description: row.description,
                services: row.services.map(|s| {
                    s.split(';')
                        .map(|t| t.trim().to_string())
                        .filter(|t| !t.is_empty())
                        .collect()
                }),
                price_range: None,
                rating: None,
                review_count: None,
            });
        }
        Ok(listings)
    }
}

/// Built-in seed records for bootstrapping an empty directory.
pub struct SeedCollector;

#[async_trait]
impl Collector for SeedCollector {
    fn source_name(&self) -> &str {
        "Seed Data"
    }

    async fn collect(&self) -> Result<Vec<RawListing>> {
        let seeds = [
            (
                "David Mysterio",
                Some("Mysterio Magic Entertainment"),
                "San Francisco",
                "CA",
                Some("https://example.com/mysterio"),
                Some("415-555-0123"),
                Some("david@mysteriomagic.com"),
                "With over 15 years of experience, David Mysterio specializes in mind-bending \
                 close-up magic and mentalism that will leave your guests speechless.",
                vec!["Close-up Magic", "Card Magic", "Mentalism"],
            ),
            (
                "Luna Wonder",
                Some("Luna Wonder Productions"),
                "Las Vegas",
                "NV",
                Some("https://example.com/lunawonder"),
                Some("702-555-0123"),
                Some("luna@wondermagic.com"),
                "Luna Wonder brings the impossible to life with spectacular stage illusions \
                 and breathtaking levitations that will amaze audiences of all sizes.",
                vec!["Stage Magic", "Levitation", "Grand Illusions"],
            ),
            (
                "Professor Whimsy",
                Some("Whimsy's Wonder Workshop"),
                "Boston",
                "MA",
                Some("https://example.com/profwhimsy"),
                Some("617-555-0123"),
                Some("prof@whimsymagic.com"),
                "Professor Whimsy brings joy and wonder to children's parties with a perfect \
                 blend of magic, comedy, and educational entertainment.",
                vec!["Children's Magic", "Comedy Magic", "Balloon Art"],
            ),
        ];

        Ok(seeds
            .into_iter()
            .map(
                |(name, business, city, state, website, phone, email, description, services)| {
                    RawListing {
                        name: name.to_string(),
                        business_name: business.map(str::to_string),
                        location: RawLocation {
                            city: city.to_string(),
                            state: state.to_string(),
                        },
                        website: website.map(str::to_string),
                        phone: phone.map(str::to_string),
                        email: email.map(str::to_string),
                        source: "Seed Data".to_string(),
                        source_url: "https://example.com/seed".to_string(),
                        listing_url: None,
                        description: Some(description.to_string()),
                        services: Some(services.into_iter().map(str::to_string).collect()),
                        price_range: None,
                        rating: None,
                        review_count: None,
                    }
                },
            )
            .collect())
    }
}

/// Business record shape returned by a directory listing API.
#[derive(Debug, Deserialize)]
struct DirectoryBusiness {
    name: String,
    city: String,
    state: String,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DirectoryResponse {
    #[serde(default)]
    businesses: Vec<DirectoryBusiness>,
}

/// Crawls a business-directory search API state by state. Individual state
/// failures are retried a couple of times, then skipped; a polite delay
/// separates consecutive requests.
pub struct DirectoryApiCollector {
    base_url: String,
    client: reqwest::Client,
    request_delay: Duration,
    max_retries: u32,
}

impl DirectoryApiCollector {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            request_delay: Duration::from_millis(2000),
            max_retries: 2,
        }
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    async fn fetch_state(&self, state: &str) -> Result<DirectoryResponse> {
        let url = format!("{}?category=magician&state={}", self.base_url, state);
        let mut attempt = 0;
        loop {
            let result = self
                .client
                .get(&url)
                .header("User-Agent", "MagicianDirectory/1.0 (contact@example.com)")
                .header("Accept", "application/json")
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(resp.json::<DirectoryResponse>().await?);
                }
                Ok(resp) => {
                    if attempt >= self.max_retries {
                        return Err(PipelineError::lookup(
                            &url,
                            format!("HTTP {}", resp.status()),
                        ));
                    }
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(e.into());
                    }
                }
            }
            attempt += 1;
            tokio::time::sleep(self.request_delay).await;
        }
    }
}

#[async_trait]
impl Collector for DirectoryApiCollector {
    fn source_name(&self) -> &str {
        "Local Directory"
    }

    async fn collect(&self) -> Result<Vec<RawListing>> {
        let mut listings = Vec::new();
        for state in US_STATES {
            let url = format!("{}?category=magician&state={}", self.base_url, state);
            match self.fetch_state(state).await {
                Ok(response) => {
                    for business in response.businesses {
                        listings.push(RawListing {
                            name: business.name,
                            business_name: None,
                            location: RawLocation {
                                city: business.city,
                                state: business.state,
                            },
                            website: business.website,
                            phone: business.phone,
                            email: None,
                            source: self.source_name().to_string(),
                            source_url: url.clone(),
                            listing_url: None,
                            description: None,
                            services: None,
                            price_range: None,
                            rating: None,
                            review_count: None,
                        });
                    }
                    info!(
                        state = state,
                        total = listings.len(),
                        "processed state, running total"
                    );
                }
                Err(e) => {
                    warn!(state = state, error = %e, "state fetch failed, skipping");
                }
            }
            tokio::time::sleep(self.request_delay).await;
        }
        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn seed_collector_yields_valid_shapes() {
        let listings = SeedCollector.collect().await.unwrap();
        assert_eq!(listings.len(), 3);
        assert!(listings.iter().all(|l| l.location.state.len() == 2));
        assert!(listings.iter().all(|l| l.source == "Seed Data"));
    }

    #[tokio::test]
    async fn json_collector_reads_camel_case_records() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{
                "name": "Dave Wonder",
                "businessName": "Wonder Magic",
                "location": {{"city": "Miami", "state": "FL"}},
                "source": "SiteA",
                "sourceUrl": "https://site-a.example/dave",
                "services": ["close up"]
            }}]"#
        )
        .unwrap();

        let listings = JsonFileCollector::new(file.path()).collect().await.unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].business_name.as_deref(), Some("Wonder Magic"));
        assert_eq!(listings[0].location.city, "Miami");
    }

    #[tokio::test]
    async fn csv_collector_splits_services_and_skips_bad_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "name,business_name,city,state,website,phone,email,description,services,source,source_url"
        )
        .unwrap();
        writeln!(
            file,
            "Dave Wonder,,Miami,FL,wondermagic.com,305.555.1234,,,close up; kids party,SiteA,https://site-a.example"
        )
        .unwrap();

        let listings = CsvFileCollector::new(file.path()).collect().await.unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(
            listings[0].services,
            Some(vec!["close up".to_string(), "kids party".to_string()])
        );
    }

    #[tokio::test]
    async fn collect_all_survives_a_failing_collector() {
        struct Failing;

        #[async_trait]
        impl Collector for Failing {
            fn source_name(&self) -> &str {
                "Failing"
            }
            async fn collect(&self) -> Result<Vec<RawListing>> {
                Err(PipelineError::lookup("failing source", "boom"))
            }
        }

        let collectors: Vec<Box<dyn Collector>> = vec![Box::new(Failing), Box::new(SeedCollector)];
        let listings = collect_all(&collectors).await;
        assert_eq!(listings.len(), 3);
    }
}
