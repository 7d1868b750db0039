use std::collections::HashMap;
use tracing::debug;

use crate::domain::{DedupeKey, Listing};

/// Collapses listings that share a dedupe key into one merged entry.
/// Stateful over a whole run; output order is the first-seen order, so a
/// fixed input order yields deterministic output.
///
/// Matching is exact-string on the lower-cased key. Near-duplicates that
/// differ by punctuation or honorifics are not merged; that is a documented
/// limitation, not something to guess around.
#[derive(Debug, Default)]
pub struct Deduper {
    index: HashMap<DedupeKey, usize>,
    listings: Vec<Listing>,
    merged_count: usize,
}

impl Deduper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, listing: Listing) {
        let key = listing.dedupe_key();
        match self.index.get(&key) {
            Some(&position) => {
                debug!(name = %listing.name, city = %listing.location.city, "merging duplicate listing");
                merge(&mut self.listings[position], listing);
                self.merged_count += 1;
            }
            None => {
                self.index.insert(key, self.listings.len());
                self.listings.push(listing);
            }
        }
    }

    /// Number of inputs that were folded into an existing entry.
    pub fn merged_count(&self) -> usize {
        self.merged_count
    }

    pub fn into_listings(self) -> Vec<Listing> {
        self.listings
    }
}

/// Convenience wrapper over the stateful deduper for whole-batch callers.
pub fn dedupe(listings: Vec<Listing>) -> (Vec<Listing>, usize) {
    let mut deduper = Deduper::new();
    for listing in listings {
        deduper.push(listing);
    }
    let merged = deduper.merged_count();
    (deduper.into_listings(), merged)
}

/// Merge policy: provenance appends unconditionally (one entry per input
/// record, repeat scrapes of the same source included), service sets union,
/// the strictly longer description wins, and contact/enrichment fields take
/// the incoming value only when it is present. A present value is never
/// downgraded to absent.
fn merge(existing: &mut Listing, incoming: Listing) {
    existing.sources.extend(incoming.sources);

    for service in incoming.services {
        if !existing.services.contains(&service) {
            existing.services.push(service);
        }
    }

    if incoming.description.len() > existing.description.len() {
        existing.description = incoming.description;
    }

    if incoming.contact.website.is_some() {
        existing.contact.website = incoming.contact.website;
    }
    if incoming.contact.phone.is_some() {
        existing.contact.phone = incoming.contact.phone;
    }
    if incoming.contact.email.is_some() {
        existing.contact.email = incoming.contact.email;
    }

    if existing.business_name.is_none() {
        existing.business_name = incoming.business_name;
    }
    if existing.location.coordinates.is_none() {
        existing.location.coordinates = incoming.location.coordinates;
    }
    if incoming.rating.is_some() {
        existing.rating = incoming.rating;
    }
    if incoming.review_count.is_some() {
        existing.review_count = incoming.review_count;
    }
    if existing.social_media.is_none() {
        existing.social_media = incoming.social_media;
    }
    existing.verified = existing.verified || incoming.verified;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Contact, Location, SourceRef};

    fn listing(name: &str, source: &str) -> Listing {
        Listing {
            id: None,
            name: name.to_string(),
            business_name: None,
            location: Location {
                city: "Miami".to_string(),
                state: "FL".to_string(),
                coordinates: None,
            },
            contact: Contact::default(),
            services: Vec::new(),
            description: String::new(),
            verified: false,
            rating: None,
            review_count: None,
            social_media: None,
            sources: vec![SourceRef {
                name: source.to_string(),
                url: format!("https://{}.example/listing", source.to_lowercase()),
            }],
        }
    }

    #[test]
    fn same_key_collapses_to_one_with_full_provenance() {
        let mut a = listing("Dave Wonder", "SiteA");
        a.description = "Short bio".to_string();
        let mut b = listing("dave wonder", "SiteB");
        b.description = "A much longer biography of Dave Wonder".to_string();

        let (out, merged) = dedupe(vec![a, b]);
        assert_eq!(out.len(), 1);
        assert_eq!(merged, 1);
        assert_eq!(out[0].sources.len(), 2);
        assert_eq!(out[0].description, "A much longer biography of Dave Wonder");
        // First-seen casing is kept.
        assert_eq!(out[0].name, "Dave Wonder");
    }

    #[test]
    fn repeat_scrape_from_one_source_keeps_both_provenance_entries() {
        let a = listing("Dave Wonder", "SiteA");
        let b = listing("Dave Wonder", "SiteA");

        let (out, merged) = dedupe(vec![a, b]);
        assert_eq!(out.len(), 1);
        assert_eq!(merged, 1);
        // One provenance entry per input record that shared the key.
        assert_eq!(out[0].sources.len(), 2);
    }

    #[test]
    fn shorter_description_does_not_replace_longer() {
        let mut a = listing("Dave Wonder", "SiteA");
        a.description = "A detailed description".to_string();
        let mut b = listing("Dave Wonder", "SiteB");
        b.description = "short".to_string();

        let (out, _) = dedupe(vec![a, b]);
        assert_eq!(out[0].description, "A detailed description");
    }

    #[test]
    fn absent_contact_does_not_clobber_present() {
        let mut a = listing("Dave Wonder", "SiteA");
        a.contact.phone = Some("(305) 555-1234".to_string());
        let b = listing("Dave Wonder", "SiteB");

        let (out, _) = dedupe(vec![a, b]);
        assert_eq!(out[0].contact.phone.as_deref(), Some("(305) 555-1234"));
    }

    #[test]
    fn present_contact_overwrites_older_value() {
        let mut a = listing("Dave Wonder", "SiteA");
        a.contact.phone = Some("(305) 555-1234".to_string());
        let mut b = listing("Dave Wonder", "SiteB");
        b.contact.phone = Some("(305) 555-9999".to_string());

        let (out, _) = dedupe(vec![a, b]);
        assert_eq!(out[0].contact.phone.as_deref(), Some("(305) 555-9999"));
    }

    #[test]
    fn services_union_without_duplicates() {
        let mut a = listing("Dave Wonder", "SiteA");
        a.services = vec!["Close-up Magic".to_string(), "Mentalism".to_string()];
        let mut b = listing("Dave Wonder", "SiteB");
        b.services = vec!["Mentalism".to_string(), "Stage Magic".to_string()];

        let (out, _) = dedupe(vec![a, b]);
        assert_eq!(
            out[0].services,
            vec!["Close-up Magic", "Mentalism", "Stage Magic"]
        );
    }

    #[test]
    fn distinct_keys_preserve_input_order() {
        let a = listing("Dave Wonder", "SiteA");
        let mut b = listing("Dave Wonder", "SiteB");
        b.location.city = "Orlando".to_string();
        let c = listing("Luna Marvel", "SiteA");

        let (out, merged) = dedupe(vec![a, b, c]);
        assert_eq!(merged, 0);
        let names: Vec<(&str, &str)> = out
            .iter()
            .map(|l| (l.name.as_str(), l.location.city.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("Dave Wonder", "Miami"),
                ("Dave Wonder", "Orlando"),
                ("Luna Marvel", "Miami")
            ]
        );
    }

    #[test]
    fn punctuation_variants_are_not_merged() {
        let a = listing("Dave Wonder", "SiteA");
        let b = listing("Dave Wonder, Jr.", "SiteB");

        let (out, merged) = dedupe(vec![a, b]);
        assert_eq!(out.len(), 2);
        assert_eq!(merged, 0);
    }
}
