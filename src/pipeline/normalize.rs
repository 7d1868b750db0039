use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{Contact, Listing, Location, RawListing, SourceRef};
use crate::pipeline::validate::EMAIL_RE;

const MAX_DESCRIPTION_LENGTH: usize = 1000;

/// Canonical service categories and the keywords that map a free-text tag
/// onto them. A tag matching several categories contributes all of them.
static SERVICE_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Close-up Magic",
        &["close-up", "close up", "tableside", "walk-around", "strolling"],
    ),
    (
        "Stage Magic",
        &["stage", "platform", "theater", "theatre", "illusion"],
    ),
    (
        "Children's Magic",
        &["children", "kids", "birthday", "party"],
    ),
    (
        "Mentalism",
        &["mentalism", "mind reading", "psychic", "mental"],
    ),
    (
        "Corporate Magic",
        &["corporate", "trade show", "business", "company"],
    ),
    (
        "Wedding Entertainment",
        &["wedding", "reception", "bridal"],
    ),
];

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Rewrites validated raw fields into canonical form. Field-level failures
/// degrade to absent fields; normalization itself never rejects a record.
#[derive(Debug, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, raw: &RawListing) -> Listing {
        let services = raw
            .services
            .as_deref()
            .map(categorize_services)
            .unwrap_or_default();

        let description = raw
            .description
            .as_deref()
            .map(normalize_description)
            .unwrap_or_default();

        Listing {
            id: None,
            name: raw.name.trim().to_string(),
            business_name: raw.business_name.as_ref().map(|b| b.trim().to_string()),
            location: Location {
                city: normalize_city(&raw.location.city),
                state: raw.location.state.trim().to_uppercase(),
                coordinates: None,
            },
            contact: Contact {
                website: raw.website.as_deref().map(normalize_website),
                phone: raw.phone.as_deref().and_then(normalize_phone),
                email: raw.email.as_deref().and_then(normalize_email),
            },
            services,
            description,
            verified: false,
            rating: raw.rating,
            review_count: raw.review_count.and_then(|c| u32::try_from(c).ok()),
            social_media: None,
            sources: vec![SourceRef {
                name: raw.source.clone(),
                url: raw.source_url.clone(),
            }],
        }
    }
}

/// Canonical US national format, or None when the digits don't form a
/// 10-digit number (optionally prefixed with country code 1).
pub fn normalize_phone(phone: &str) -> Option<String> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    let national = match digits.len() {
        10 => digits,
        11 if digits.starts_with('1') => digits[1..].to_string(),
        _ => return None,
    };
    Some(format!(
        "({}) {}-{}",
        &national[..3],
        &national[3..6],
        &national[6..]
    ))
}

/// Re-check against the email grammar; scraped addresses that fail are
/// dropped rather than carried through half-broken.
pub fn normalize_email(email: &str) -> Option<String> {
    let trimmed = email.trim();
    EMAIL_RE.is_match(trimmed).then(|| trimmed.to_lowercase())
}

/// Lower-case then title-case each whitespace-separated token.
pub fn normalize_city(city: &str) -> String {
    city.trim()
        .to_lowercase()
        .split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Match each tag against the category keyword lists; unmatched tags are
/// kept verbatim with a capitalized first letter. Set semantics, first-seen
/// order preserved.
pub fn categorize_services(services: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for service in services {
        let tag = service.trim();
        if tag.is_empty() {
            continue;
        }
        let lower = tag.to_lowercase();
        let mut matched = false;
        for (category, keywords) in SERVICE_CATEGORIES {
            if keywords.iter().any(|k| lower.contains(k)) {
                matched = true;
                push_unique(&mut out, (*category).to_string());
            }
        }
        if !matched {
            push_unique(&mut out, capitalize(tag));
        }
    }
    out
}

/// Collapse whitespace runs to single spaces, trim, truncate to 1000 chars.
pub fn normalize_description(description: &str) -> String {
    let collapsed = WHITESPACE_RE.replace_all(description, " ");
    collapsed.trim().chars().take(MAX_DESCRIPTION_LENGTH).collect()
}

/// Force https and strip one trailing slash. The scheme comparison is
/// case-insensitive; the rest of the URL keeps its casing.
pub fn normalize_website(website: &str) -> String {
    let trimmed = website.trim();
    let lower = trimmed.to_lowercase();
    let rest = if lower.starts_with("https://") {
        &trimmed["https://".len()..]
    } else if lower.starts_with("http://") {
        &trimmed["http://".len()..]
    } else {
        trimmed
    };
    let mut url = format!("https://{}", rest);
    if url.ends_with('/') {
        url.pop();
    }
    url
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn push_unique(out: &mut Vec<String>, value: String) {
    if !out.contains(&value) {
        out.push(value);
    }
}
