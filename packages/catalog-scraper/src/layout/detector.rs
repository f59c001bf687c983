//! Signature selection by container match count.

use scraper::Html;
use std::collections::BTreeSet;
use tracing::debug;
use url::Url;

use super::signatures::{ExtractContext, LayoutSignature, SignatureRegistry};
use crate::types::layout::{LayoutProfile, ProfileSource};
use crate::types::record::ExtractedRecord;
use crate::types::request::{Field, SiteTag};

/// Picks the layout signature that best matches a page and extracts with it.
#[derive(Debug, Clone, Default)]
pub struct LayoutDetector {
    registry: SignatureRegistry,
    fallback_currency: Option<String>,
}

impl LayoutDetector {
    pub fn new(registry: SignatureRegistry) -> Self {
        Self {
            registry,
            fallback_currency: None,
        }
    }

    /// Currency used when neither the price text nor the site implies one.
    pub fn with_fallback_currency(mut self, currency: Option<String>) -> Self {
        self.fallback_currency = currency;
        self
    }

    pub fn registry(&self) -> &SignatureRegistry {
        &self.registry
    }

    /// Per-site fallback first, then the configured one.
    pub fn fallback_currency_for(&self, page_url: &Url) -> Option<&str> {
        SiteTag::from_url(page_url)
            .fallback_currency()
            .or(self.fallback_currency.as_deref())
    }

    /// Container match count for every registered signature, in order.
    pub fn rank<'a>(&'a self, document: &Html) -> Vec<(&'a LayoutSignature, usize)> {
        self.registry
            .signatures()
            .iter()
            .map(|signature| (signature, signature.count(document)))
            .collect()
    }

    /// The signature with the strictly highest non-zero count; on a tie or
    /// no matches, the catch-all if it matches anything.
    pub fn detect<'a>(&'a self, document: &Html) -> Option<&'a LayoutSignature> {
        let ranked = self.rank(document);
        let best = ranked.iter().map(|(_, count)| *count).max().unwrap_or(0);
        let leaders: Vec<_> = ranked.iter().filter(|(_, count)| *count == best).collect();

        if best > 0 && leaders.len() == 1 {
            return Some(leaders[0].0);
        }

        debug!(best, tied = leaders.len(), "No unique signature, trying catch-all");
        self.registry
            .catch_all()
            .filter(|catch_all| catch_all.count(document) > 0)
    }

    /// Detect the layout of `markup` and extract records from it.
    ///
    /// Zero matches is not an error: the result is simply empty.
    pub fn detect_and_extract(&self, markup: &str, base_url: &Url, fields: &BTreeSet<Field>) -> Vec<ExtractedRecord> {
        self.detect_with_profile(markup, base_url, fields)
            .map(|(records, _)| records)
            .unwrap_or_default()
    }

    /// Like [`detect_and_extract`](Self::detect_and_extract), also returning
    /// the winning signature as a profile for caching.
    pub fn detect_with_profile(
        &self,
        markup: &str,
        base_url: &Url,
        fields: &BTreeSet<Field>,
    ) -> Option<(Vec<ExtractedRecord>, LayoutProfile)> {
        let document = Html::parse_document(markup);
        let signature = self.detect(&document)?;

        let ctx = ExtractContext {
            base_url,
            fields,
            fallback_currency: self.fallback_currency_for(base_url),
        };
        let records = signature.extract(&document, ctx);
        debug!(signature = signature.id(), records = records.len(), "Extracted with signature");

        let profile = LayoutProfile::new(
            base_url.host_str().unwrap_or_default().to_lowercase(),
            signature.container_css(),
            signature.rules().clone(),
            ProfileSource::Signature,
        );
        Some((records, profile))
    }
}
