//! Cross-page deduplication and record normalization.

use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::types::record::{ExtractedRecord, ResultSet};

/// Maximum stored title length, in characters.
pub const MAX_TITLE_CHARS: usize = 500;

/// Maximum stored URL length, in characters.
pub const MAX_URL_CHARS: usize = 2048;

/// Maximum stored currency code length, in characters.
pub const MAX_CURRENCY_CHARS: usize = 10;

/// Maximum stored raw price text length, in characters.
pub const MAX_PRICE_TEXT_CHARS: usize = 100;

/// Merges per-page records into one [`ResultSet`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Deduplicator;

impl Deduplicator {
    /// Normalize every record, keep the first occurrence of each identity
    /// key, then truncate to `max_items` (0 = unlimited).
    pub fn reduce<I>(pages: I, max_items: usize) -> ResultSet
    where
        I: IntoIterator<Item = Vec<ExtractedRecord>>,
    {
        let mut set = ResultSet::new();
        let mut duplicates = 0usize;
        let mut invalid = 0usize;

        for record in pages.into_iter().flatten() {
            let record = normalize(record);
            if !record.is_valid() {
                invalid += 1;
                continue;
            }
            if !set.insert(record) {
                duplicates += 1;
            }
        }

        set.finalize(max_items);
        debug!(kept = set.len(), duplicates, invalid, max_items, "Deduplicated records");
        set
    }
}

/// Canonical stored form of a record.
///
/// Text is NFKC-normalized with whitespace collapsed; blank fields become
/// `None`.
pub fn normalize(record: ExtractedRecord) -> ExtractedRecord {
    ExtractedRecord {
        title: record.title.as_deref().and_then(|t| clean(t, MAX_TITLE_CHARS)),
        price: record.price.and_then(round_price),
        price_text: record.price_text.as_deref().and_then(|t| clean(t, MAX_PRICE_TEXT_CHARS)),
        currency: record
            .currency
            .as_deref()
            .and_then(|c| clean(c, MAX_CURRENCY_CHARS))
            .map(|c| c.to_uppercase()),
        image_url: record.image_url.as_deref().and_then(trim_url),
        url: record.url.as_deref().and_then(trim_url),
        rating: record
            .rating
            .filter(|r| r.is_finite())
            .map(|r| r.clamp(0.0, 5.0)),
    }
}

fn clean(text: &str, max_chars: usize) -> Option<String> {
    let normalized: String = text.nfkc().collect();
    let collapsed = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    Some(collapsed.chars().take(max_chars).collect())
}

fn trim_url(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    Some(url.chars().take(MAX_URL_CHARS).collect())
}

/// Round to cents. Negative and non-finite amounts are not prices.
fn round_price(price: f64) -> Option<f64> {
    if !price.is_finite() || price < 0.0 {
        return None;
    }
    Some((price * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rec(title: &str, url: Option<&str>) -> ExtractedRecord {
        let record = ExtractedRecord::titled(title);
        match url {
            Some(url) => record.with_url(url),
            None => record,
        }
    }

    #[test]
    fn test_first_occurrence_wins() {
        let pages = vec![
            vec![rec("Lego Classic Box", Some("https://dumyah.com/p/1"))],
            vec![
                rec("Lego Classic Box (again)", Some("https://dumyah.com/p/1")),
                rec("Magnetic Tiles", Some("https://dumyah.com/p/2")),
            ],
        ];
        let set = Deduplicator::reduce(pages, 0);

        assert_eq!(set.len(), 2);
        assert_eq!(set.records()[0].title.as_deref(), Some("Lego Classic Box"));
    }

    #[test]
    fn test_keyless_records_are_kept() {
        let pages = vec![vec![rec("Play Dough", None), rec("Play Dough", None)]];
        assert_eq!(Deduplicator::reduce(pages, 0).len(), 2);
    }

    #[test]
    fn test_truncation_happens_after_dedup() {
        let pages: Vec<Vec<ExtractedRecord>> = vec![
            (1..=4)
                .map(|i| rec("Duplicate Doll", Some(&format!("https://x.com/p/{}", i % 2))))
                .collect(),
            (10..15)
                .map(|i| rec("Toy", Some(&format!("https://x.com/p/{i}"))))
                .collect(),
        ];
        let set = Deduplicator::reduce(pages, 5);

        assert_eq!(set.len(), 5);
        assert_eq!(set.records()[0].url.as_deref(), Some("https://x.com/p/1"));
        assert_eq!(set.records()[1].url.as_deref(), Some("https://x.com/p/0"));
        assert_eq!(set.records()[4].url.as_deref(), Some("https://x.com/p/12"));
    }

    #[test]
    fn test_normalize_text_and_currency() {
        let record = ExtractedRecord {
            title: Some("  Ｗｏｏｄｅｎ\u{00A0}  Blocks\n".into()),
            price: Some(12.349),
            currency: Some("jod".into()),
            url: Some("  https://dumyah.com/p/9 ".into()),
            ..Default::default()
        };
        let normalized = normalize(record);

        assert_eq!(normalized.title.as_deref(), Some("Wooden Blocks"));
        assert_eq!(normalized.price, Some(12.35));
        assert_eq!(normalized.currency.as_deref(), Some("JOD"));
        assert_eq!(normalized.url.as_deref(), Some("https://dumyah.com/p/9"));
    }

    #[test]
    fn test_bad_prices_become_none() {
        for price in [f64::NAN, f64::INFINITY, -3.0] {
            let record = normalize(ExtractedRecord::titled("x").with_price(price, "USD"));
            assert_eq!(record.price, None);
        }
    }

    #[test]
    fn test_blank_title_without_url_is_dropped() {
        let pages = vec![vec![ExtractedRecord::titled(" \t ")]];
        assert!(Deduplicator::reduce(pages, 0).is_empty());
    }

    #[test]
    fn test_long_title_is_truncated() {
        let record = normalize(ExtractedRecord::titled("a".repeat(MAX_TITLE_CHARS + 20)));
        assert_eq!(record.title.map(|t| t.chars().count()), Some(MAX_TITLE_CHARS));
    }

    fn arb_record() -> impl Strategy<Value = ExtractedRecord> {
        (
            proptest::option::of("[a-zA-Z ]{0,12}"),
            proptest::option::of(0u8..6),
        )
            .prop_map(|(title, key)| ExtractedRecord {
                title,
                url: key.map(|k| format!("https://shop.example/p/{k}")),
                ..Default::default()
            })
    }

    proptest! {
        #[test]
        fn prop_surfaced_records_have_title_or_url(
            pages in proptest::collection::vec(proptest::collection::vec(arb_record(), 0..8), 0..5)
        ) {
            let set = Deduplicator::reduce(pages, 0);
            for record in set.iter() {
                let has_title = record.title.as_deref().is_some_and(|t| !t.is_empty());
                let has_url = record.url.as_deref().is_some_and(|u| !u.is_empty());
                prop_assert!(has_title || has_url);
            }
        }

        #[test]
        fn prop_keys_unique_and_first_wins(
            pages in proptest::collection::vec(proptest::collection::vec(arb_record(), 0..8), 0..5)
        ) {
            let flat: Vec<ExtractedRecord> = pages.iter().flatten().cloned().collect();
            let set = Deduplicator::reduce(pages, 0);

            let mut seen = std::collections::HashSet::new();
            for record in set.iter() {
                if let Some(url) = &record.url {
                    prop_assert!(seen.insert(url.clone()));
                    let first = flat.iter().find(|r| r.url.as_ref() == Some(url)).cloned().map(normalize);
                    prop_assert_eq!(first.and_then(|r| r.title), record.title.clone());
                }
            }
        }

        #[test]
        fn prop_max_items_bounds_result(
            pages in proptest::collection::vec(proptest::collection::vec(arb_record(), 0..8), 0..5),
            max in 1usize..10
        ) {
            prop_assert!(Deduplicator::reduce(pages, max).len() <= max);
        }
    }
}
