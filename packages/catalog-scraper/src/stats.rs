//! Numeric aggregation over persisted records.
//!
//! Never fails: empty or priceless inputs produce zeroed stats.

use std::collections::BTreeMap;

use crate::types::record::ProductRecord;
use crate::types::request::SiteTag;
use crate::types::summary::{BatchStats, NumericStats};

impl NumericStats {
    /// count/avg/min/max/median over the finite values, rounded to 2 decimals.
    pub fn from_values(values: &[f64]) -> Self {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return Self::default();
        }
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();

        Self {
            count,
            avg: round2(sum / count as f64),
            min: round2(sorted[0]),
            max: round2(sorted[count - 1]),
            median: round2(median_of_sorted(&sorted)),
        }
    }
}

/// Middle value, or the mean of the two middle values on an even count.
fn median_of_sorted(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl BatchStats {
    /// Aggregate a batch's records.
    ///
    /// Price stats cover only records with a positive price; rating stats
    /// only records with a rating. Site counts cover every record.
    pub fn compute(records: &[ProductRecord]) -> Self {
        let prices: Vec<f64> = records
            .iter()
            .filter_map(|r| r.record.price)
            .filter(|p| *p > 0.0)
            .collect();
        let ratings: Vec<f64> = records.iter().filter_map(|r| r.record.rating).map(f64::from).collect();

        let mut site_counts: BTreeMap<SiteTag, usize> = BTreeMap::new();
        let mut site_prices: BTreeMap<SiteTag, Vec<f64>> = BTreeMap::new();
        let mut currencies: BTreeMap<&str, usize> = BTreeMap::new();

        for product in records {
            *site_counts.entry(product.site).or_default() += 1;

            if let Some(price) = product.record.price.filter(|p| *p > 0.0) {
                site_prices.entry(product.site).or_default().push(price);
                if let Some(currency) = product.record.currency.as_deref() {
                    *currencies.entry(currency).or_default() += 1;
                }
            }
        }

        let site_medians = site_prices
            .into_iter()
            .map(|(site, prices)| (site, NumericStats::from_values(&prices).median))
            .collect();

        // Most frequent; alphabetical on ties.
        let currency = currencies
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(a.0)))
            .map(|(code, _)| code.to_string());

        Self {
            count: records.len(),
            price: NumericStats::from_values(&prices),
            rating: NumericStats::from_values(&ratings),
            currency,
            site_counts,
            site_medians,
        }
    }
}
