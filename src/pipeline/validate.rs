use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::RawListing;

/// The 50 US postal state codes. District and territory codes are
/// deliberately excluded; listings outside the 50 states are review-file
/// material, not directory material.
pub const US_STATES: [&str; 50] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY",
];

/// Full state name to postal code, used to repair scraped records that carry
/// "Florida" instead of "FL" before they reach the validator.
static STATE_NAME_TO_CODE: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("alabama", "AL"),
        ("alaska", "AK"),
        ("arizona", "AZ"),
        ("arkansas", "AR"),
        ("california", "CA"),
        ("colorado", "CO"),
        ("connecticut", "CT"),
        ("delaware", "DE"),
        ("florida", "FL"),
        ("georgia", "GA"),
        ("hawaii", "HI"),
        ("idaho", "ID"),
        ("illinois", "IL"),
        ("indiana", "IN"),
        ("iowa", "IA"),
        ("kansas", "KS"),
        ("kentucky", "KY"),
        ("louisiana", "LA"),
        ("maine", "ME"),
        ("maryland", "MD"),
        ("massachusetts", "MA"),
        ("michigan", "MI"),
        ("minnesota", "MN"),
        ("mississippi", "MS"),
        ("missouri", "MO"),
        ("montana", "MT"),
        ("nebraska", "NE"),
        ("nevada", "NV"),
        ("new hampshire", "NH"),
        ("new jersey", "NJ"),
        ("new mexico", "NM"),
        ("new york", "NY"),
        ("north carolina", "NC"),
        ("north dakota", "ND"),
        ("ohio", "OH"),
        ("oklahoma", "OK"),
        ("oregon", "OR"),
        ("pennsylvania", "PA"),
        ("rhode island", "RI"),
        ("south carolina", "SC"),
        ("south dakota", "SD"),
        ("tennessee", "TN"),
        ("texas", "TX"),
        ("utah", "UT"),
        ("vermont", "VT"),
        ("virginia", "VA"),
        ("washington", "WA"),
        ("west virginia", "WV"),
        ("wisconsin", "WI"),
        ("wyoming", "WY"),
    ])
});

/// Pragmatic email grammar: local part, one `@`, dotted domain. Full RFC 5322
/// is not worth the trouble for scraped directory data.
pub static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("email regex")
});

/// Outcome of validating one raw listing. Invalid outcomes carry the record
/// so it can be written to the review side channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ValidationOutcome {
    Valid(RawListing),
    Invalid(InvalidListing),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidListing {
    pub record: RawListing,
    /// One `"<field>: <message>"` entry per violated constraint, in the
    /// order the constraints were checked.
    pub violations: Vec<String>,
}

/// Maps a full state name to its postal code when the scraped value is a
/// name rather than a code. Returns the input untouched otherwise, so
/// genuinely malformed states still fail validation downstream.
pub fn repair_state(raw: RawListing) -> RawListing {
    let trimmed = raw.location.state.trim();
    match STATE_NAME_TO_CODE.get(trimmed.to_lowercase().as_str()) {
        Some(code) => {
            let mut repaired = raw;
            repaired.location.state = (*code).to_string();
            repaired
        }
        None => raw,
    }
}

/// Schema validator for raw listings. Pure: never fails, never mutates, and
/// checks every constraint so the review file shows the complete picture.
#[derive(Debug, Default)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, raw: RawListing) -> ValidationOutcome {
        let mut violations = Vec::new();

        check_length("name", &raw.name, 2, 100, &mut violations);
        if let Some(business_name) = &raw.business_name {
            check_length("businessName", business_name, 2, 100, &mut violations);
        }
        check_length("location.city", &raw.location.city, 2, 100, &mut violations);

        let state = raw.location.state.trim();
        if state.len() != 2 {
            violations.push(format!(
                "location.state: expected a 2-letter state code, got '{}'",
                raw.location.state
            ));
        } else if !US_STATES.contains(&state.to_uppercase().as_str()) {
            violations.push(format!(
                "location.state: '{}' is not a US state code",
                raw.location.state
            ));
        }

        if let Some(website) = &raw.website {
            if url_with_scheme(website).is_err() {
                violations.push(format!("website: '{}' is not a valid URL", website));
            }
        }
        if let Some(email) = &raw.email {
            if !EMAIL_RE.is_match(email.trim()) {
                violations.push(format!("email: '{}' is not a valid email address", email));
            }
        }
        if let Some(listing_url) = &raw.listing_url {
            if url_with_scheme(listing_url).is_err() {
                violations.push(format!("listingUrl: '{}' is not a valid URL", listing_url));
            }
        }
        if let Some(rating) = raw.rating {
            if !(0.0..=5.0).contains(&rating) {
                violations.push(format!("rating: {} is outside the range 0-5", rating));
            }
        }
        if let Some(review_count) = raw.review_count {
            if review_count < 0 {
                violations.push(format!("reviewCount: {} is negative", review_count));
            }
        }

        if violations.is_empty() {
            ValidationOutcome::Valid(raw)
        } else {
            ValidationOutcome::Invalid(InvalidListing {
                record: raw,
                violations,
            })
        }
    }
}

fn check_length(field: &str, value: &str, min: usize, max: usize, violations: &mut Vec<String>) {
    let len = value.trim().chars().count();
    if len < min || len > max {
        violations.push(format!(
            "{}: length must be between {} and {} characters, got {}",
            field, min, max, len
        ));
    }
}

/// Scraped websites often omit the scheme; accept those by parsing with an
/// assumed https prefix, since the normalizer will add one anyway. Schemes
/// are case-insensitive, so "HTTP://" counts as already having one.
fn url_with_scheme(value: &str) -> std::result::Result<url::Url, url::ParseError> {
    let trimmed = value.trim();
    let lower = trimmed.to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        url::Url::parse(trimmed)
    } else {
        url::Url::parse(&format!("https://{}", trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RawLocation;

    fn raw(name: &str, city: &str, state: &str) -> RawListing {
        RawListing {
            name: name.to_string(),
            business_name: None,
            location: RawLocation {
                city: city.to_string(),
                state: state.to_string(),
            },
            website: None,
            phone: None,
            email: None,
            source: "Test Source".to_string(),
            source_url: "https://example.com/list".to_string(),
            listing_url: None,
            description: None,
            services: None,
            price_range: None,
            rating: None,
            review_count: None,
        }
    }

    #[test]
    fn accepts_minimal_valid_listing() {
        let outcome = Validator::new().validate(raw("Dave Wonder", "Miami", "FL"));
        assert!(matches!(outcome, ValidationOutcome::Valid(_)));
    }

    #[test]
    fn rejects_fictional_state_with_state_violation() {
        let outcome = Validator::new().validate(raw("Clark Kent", "Metropolis", "Krypton"));
        match outcome {
            ValidationOutcome::Invalid(invalid) => {
                assert!(invalid
                    .violations
                    .iter()
                    .any(|v| v.starts_with("location.state:")));
            }
            ValidationOutcome::Valid(_) => panic!("Krypton should not validate"),
        }
    }

    #[test]
    fn rejects_short_name() {
        let outcome = Validator::new().validate(raw("Al", "Metropolis", "NY"));
        match outcome {
            ValidationOutcome::Invalid(invalid) => {
                assert!(invalid.violations.iter().any(|v| v.starts_with("name:")));
            }
            ValidationOutcome::Valid(_) => panic!("one-char names should not validate"),
        }
    }

    #[test]
    fn collects_violations_in_check_order() {
        let mut record = raw("A", "B", "Nowhere");
        record.email = Some("not-an-email".to_string());
        record.rating = Some(9.0);

        let outcome = Validator::new().validate(record);
        match outcome {
            ValidationOutcome::Invalid(invalid) => {
                let fields: Vec<&str> = invalid
                    .violations
                    .iter()
                    .map(|v| v.split(':').next().unwrap())
                    .collect();
                assert_eq!(
                    fields,
                    vec!["name", "location.city", "location.state", "email", "rating"]
                );
            }
            ValidationOutcome::Valid(_) => panic!("expected violations"),
        }
    }

    #[test]
    fn repair_state_maps_full_names_to_codes() {
        let repaired = repair_state(raw("Dave Wonder", "Miami", "Florida"));
        assert_eq!(repaired.location.state, "FL");

        let untouched = repair_state(raw("Clark Kent", "Metropolis", "Krypton"));
        assert_eq!(untouched.location.state, "Krypton");
    }

    #[test]
    fn accepts_schemeless_website() {
        let mut record = raw("Dave Wonder", "Miami", "FL");
        record.website = Some("wondermagic.com".to_string());
        assert!(matches!(
            Validator::new().validate(record),
            ValidationOutcome::Valid(_)
        ));
    }

    #[test]
    fn accepts_upper_cased_scheme() {
        let mut record = raw("Dave Wonder", "Miami", "FL");
        record.website = Some("HTTP://example.com".to_string());
        assert!(matches!(
            Validator::new().validate(record),
            ValidationOutcome::Valid(_)
        ));
    }

    #[test]
    fn rejects_out_of_range_rating() {
        let mut record = raw("Dave Wonder", "Miami", "FL");
        record.rating = Some(5.5);
        assert!(matches!(
            Validator::new().validate(record),
            ValidationOutcome::Invalid(_)
        ));
    }
}
