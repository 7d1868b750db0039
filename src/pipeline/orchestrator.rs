use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::common::error::Result;
use crate::domain::{Listing, RawListing};
use crate::pipeline::dedupe::Deduper;
use crate::pipeline::enrich::Enricher;
use crate::pipeline::load::Loader;
use crate::pipeline::normalize::Normalizer;
use crate::pipeline::validate::{repair_state, InvalidListing, ValidationOutcome, Validator};

/// End-of-run summary surfaced to the operator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub enriched: usize,
    pub partially_enriched: usize,
    pub merged_duplicates: usize,
    pub loaded: usize,
    pub failed_to_load: usize,
}

/// Wires the pipeline stages together and owns the lifecycle of the storage
/// handle and external lookup clients. Stages run strictly in order over the
/// whole batch; a record that fails a stage never blocks its siblings.
pub struct PipelineOrchestrator {
    validator: Validator,
    normalizer: Normalizer,
    enricher: Option<Enricher>,
    loader: Loader,
    review_path: PathBuf,
}

impl PipelineOrchestrator {
    /// `enricher: None` runs the pipeline offline: records pass through with
    /// coordinates absent, which is also how tests simulate total external
    /// failure.
    pub fn new(enricher: Option<Enricher>, loader: Loader, review_path: impl Into<PathBuf>) -> Self {
        Self {
            validator: Validator::new(),
            normalizer: Normalizer::new(),
            enricher,
            loader,
            review_path: review_path.into(),
        }
    }

    /// Full run: validate, normalize, enrich, dedupe, load.
    pub async fn run(&self, raw_listings: Vec<RawListing>) -> Result<RunSummary> {
        info!("Pipeline starting with {} raw listings", raw_listings.len());
        let (listings, mut summary) = self.process_only(raw_listings).await?;

        let report = self.loader.load(&listings).await;
        summary.loaded = report.loaded;
        summary.failed_to_load = report.failed;

        info!(
            "Pipeline finished: {}/{} valid, {} invalid, {} enriched ({} partial), {} merged, {}/{} loaded",
            summary.valid,
            summary.total,
            summary.invalid,
            summary.enriched,
            summary.partially_enriched,
            summary.merged_duplicates,
            summary.loaded,
            listings.len()
        );
        Ok(summary)
    }

    /// Validate, normalize, enrich, and dedupe without touching the sink.
    /// Used by the `process` subcommand to produce a reviewable JSON file.
    pub async fn process_only(
        &self,
        raw_listings: Vec<RawListing>,
    ) -> Result<(Vec<Listing>, RunSummary)> {
        let mut summary = RunSummary {
            total: raw_listings.len(),
            ..Default::default()
        };

        // Validate. Full state names are repaired to codes first so a
        // scraped "Florida" is not review-file material.
        let mut valid = Vec::new();
        let mut invalid = Vec::new();
        for raw in raw_listings {
            match self.validator.validate(repair_state(raw)) {
                ValidationOutcome::Valid(record) => valid.push(record),
                ValidationOutcome::Invalid(outcome) => {
                    warn!(
                        name = %outcome.record.name,
                        violations = ?outcome.violations,
                        "listing failed validation"
                    );
                    invalid.push(outcome);
                }
            }
        }
        summary.valid = valid.len();
        summary.invalid = invalid.len();
        self.write_review_file(&invalid)?;

        // Normalize and enrich, one record at a time; external-call latency
        // dominates, so there is nothing to gain from parallelism here.
        let mut deduper = Deduper::new();
        for raw in &valid {
            let listing = self.normalizer.normalize(raw);
            let listing = match &self.enricher {
                Some(enricher) => {
                    let (enriched, status) = enricher.enrich(listing).await;
                    if status.geocoded && status.business_details {
                        summary.enriched += 1;
                    } else if status.any() {
                        summary.partially_enriched += 1;
                    }
                    enriched
                }
                None => listing,
            };
            deduper.push(listing);
        }
        summary.merged_duplicates = deduper.merged_count();

        let listings = deduper.into_listings();
        info!(
            "{} canonical listings after merging {} duplicates",
            listings.len(),
            summary.merged_duplicates
        );
        Ok((listings, summary))
    }

    /// Side channel for operators: one entry per invalid record with its
    /// violation messages. A clean run removes the file so a previous run's
    /// rejects don't linger as review work.
    fn write_review_file(&self, invalid: &[InvalidListing]) -> Result<()> {
        if invalid.is_empty() {
            if self.review_path.exists() {
                fs::remove_file(&self.review_path)?;
            }
            return Ok(());
        }
        if let Some(parent) = self.review_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(invalid)?;
        fs::write(&self.review_path, json)?;
        info!(
            "Wrote {} invalid listings to {} for review",
            invalid.len(),
            self.review_path.display()
        );
        Ok(())
    }

    pub fn review_path(&self) -> &Path {
        &self.review_path
    }
}
