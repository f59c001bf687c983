//! Extracted product records and the per-job result set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use super::request::SiteTag;

/// One product/article candidate pulled out of a listing page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub title: Option<String>,

    /// Parsed price amount
    pub price: Option<f64>,

    /// Raw price text as it appeared on the page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_text: Option<String>,

    /// ISO-style currency code (JOD, SAR, AED, USD, EUR, GBP, ...)
    pub currency: Option<String>,

    pub image_url: Option<String>,

    /// Canonical item URL; the identity key when present
    pub url: Option<String>,

    /// Rating on a 0-5 scale
    pub rating: Option<f32>,
}

impl ExtractedRecord {
    /// Create a record with a title only.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Set the canonical URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the price amount and currency.
    pub fn with_price(mut self, amount: f64, currency: impl Into<String>) -> Self {
        self.price = Some(amount);
        self.currency = Some(currency.into());
        self
    }

    pub fn with_rating(mut self, rating: f32) -> Self {
        self.rating = Some(rating);
        self
    }

    /// The dedup key: the canonical URL when it is non-empty.
    pub fn identity_key(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    fn has_title(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    /// A record needs a title or an identity key to be kept.
    pub fn is_valid(&self) -> bool {
        self.has_title() || self.identity_key().is_some()
    }
}

/// A persisted record, tagged with its job and storefront.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub job_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub site: SiteTag,
    #[serde(flatten)]
    pub record: ExtractedRecord,
    pub scraped_at: DateTime<Utc>,
}

impl ProductRecord {
    pub fn new(job_id: Uuid, batch_id: Option<Uuid>, site: SiteTag, record: ExtractedRecord) -> Self {
        Self {
            job_id,
            batch_id,
            site,
            record,
            scraped_at: Utc::now(),
        }
    }
}

/// Deduplicated records for one job, in first-seen order.
///
/// Records with an identity key are unique by that key; keyless records
/// are kept as long as they carry a title. Invalid records never enter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ExtractedRecord>", into = "Vec<ExtractedRecord>")]
pub struct ResultSet {
    records: Vec<ExtractedRecord>,
    seen: HashSet<String>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record unless it is invalid or its key was already seen.
    ///
    /// Returns `true` when the record was added.
    pub fn insert(&mut self, record: ExtractedRecord) -> bool {
        if !record.is_valid() {
            return false;
        }

        if let Some(key) = record.identity_key() {
            if !self.seen.insert(key.to_string()) {
                return false;
            }
        }

        self.records.push(record);
        true
    }

    /// Truncate to `max_items` (0 = unlimited), keeping encounter order.
    pub fn finalize(&mut self, max_items: usize) {
        if max_items > 0 && self.records.len() > max_items {
            for dropped in self.records.drain(max_items..) {
                if let Some(key) = dropped.identity_key() {
                    self.seen.remove(key);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ExtractedRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtractedRecord> {
        self.records.iter()
    }

    /// Whether a record with this key is already present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn into_records(self) -> Vec<ExtractedRecord> {
        self.records
    }
}

impl From<Vec<ExtractedRecord>> for ResultSet {
    fn from(records: Vec<ExtractedRecord>) -> Self {
        let mut set = ResultSet::new();
        for record in records {
            set.insert(record);
        }
        set
    }
}

impl From<ResultSet> for Vec<ExtractedRecord> {
    fn from(set: ResultSet) -> Self {
        set.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_title_or_url_is_invalid() {
        assert!(!ExtractedRecord::default().is_valid());
        assert!(!ExtractedRecord::titled("   ").is_valid());
        assert!(ExtractedRecord::titled("Wooden Puzzle").is_valid());
        assert!(ExtractedRecord::default()
            .with_url("https://dumyah.com/p/1")
            .is_valid());
    }

    #[test]
    fn test_first_occurrence_wins() {
        let mut set = ResultSet::new();
        assert!(set.insert(ExtractedRecord::titled("First").with_url("https://a.com/p/1")));
        assert!(!set.insert(ExtractedRecord::titled("Second").with_url("https://a.com/p/1")));
        assert_eq!(set.len(), 1);
        assert_eq!(set.records()[0].title.as_deref(), Some("First"));
    }

    #[test]
    fn test_keyless_records_are_kept() {
        let mut set = ResultSet::new();
        assert!(set.insert(ExtractedRecord::titled("Same title")));
        assert!(set.insert(ExtractedRecord::titled("Same title")));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_finalize_truncates_in_order() {
        let mut set: ResultSet = (0..5)
            .map(|i| ExtractedRecord::titled(format!("Item {i}")).with_url(format!("https://a.com/{i}")))
            .collect::<Vec<_>>()
            .into();
        set.finalize(3);
        assert_eq!(set.len(), 3);
        assert_eq!(set.records()[2].title.as_deref(), Some("Item 2"));
        assert!(!set.contains_key("https://a.com/4"));

        set.finalize(0);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_serializes_as_plain_list() {
        let set: ResultSet = vec![ExtractedRecord::titled("A").with_url("https://a.com/1")].into();
        let json = serde_json::to_value(&set).unwrap();
        assert!(json.is_array());

        let back: ResultSet = serde_json::from_value(json).unwrap();
        assert!(back.contains_key("https://a.com/1"));
    }
}
