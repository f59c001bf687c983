//! Per-page extraction: cached profile, then signatures, then the advisor.

use scraper::Html;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use super::advisor::validate_profile;
use super::cache::LayoutCache;
use super::detector::LayoutDetector;
use super::signatures::{compile_selector, CompiledRules, ExtractContext};
use crate::error::LayoutError;
use crate::traits::ai::SelectorAdvisor;
use crate::types::layout::{LayoutProfile, ProfileSource, GENERIC_CONTAINERS};
use crate::types::record::ExtractedRecord;
use crate::types::request::Field;

/// Turns page markup into records, learning a profile per domain.
///
/// Never fails: selector errors and advisor failures degrade to the next
/// strategy and ultimately to an empty page.
#[derive(Clone)]
pub struct PageExtractor {
    detector: LayoutDetector,
    cache: Arc<LayoutCache>,
    advisor: Option<Arc<dyn SelectorAdvisor>>,
}

impl PageExtractor {
    pub fn new(detector: LayoutDetector, cache: Arc<LayoutCache>) -> Self {
        Self {
            detector,
            cache,
            advisor: None,
        }
    }

    pub fn with_advisor(mut self, advisor: Arc<dyn SelectorAdvisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    /// Same extractor, different profile cache.
    pub fn with_cache(&self, cache: Arc<LayoutCache>) -> Self {
        Self {
            cache,
            ..self.clone()
        }
    }

    pub fn cache(&self) -> &Arc<LayoutCache> {
        &self.cache
    }

    pub fn detector(&self) -> &LayoutDetector {
        &self.detector
    }

    /// Containers of the layout in use on `domain`: the cached profile's
    /// container once one is learned, else every container the detector
    /// or the generic fallback could pick.
    pub fn container_selector(&self, domain: &str) -> String {
        if let Some(profile) = self.cache.get(domain) {
            return profile.container;
        }

        let registry = self.detector.registry();
        let mut containers: Vec<&str> = registry
            .signatures()
            .iter()
            .chain(registry.catch_all())
            .map(|signature| signature.container_css())
            .collect();
        for css in GENERIC_CONTAINERS {
            if !containers.contains(&css) {
                containers.push(css);
            }
        }
        containers.join(", ")
    }

    /// Item links inside [`container_selector`](Self::container_selector),
    /// including containers that are links themselves.
    pub fn first_item_selector(&self, domain: &str) -> String {
        item_link_selector(&self.container_selector(domain))
    }

    pub async fn extract(&self, markup: &str, page_url: &Url, fields: &BTreeSet<Field>) -> Vec<ExtractedRecord> {
        let domain = page_url.host_str().unwrap_or_default().to_lowercase();

        if let Some(profile) = self.cache.get(&domain) {
            match self.apply_profile(markup, &profile, page_url, fields) {
                Ok(records) if !records.is_empty() => return records,
                Ok(_) => {
                    debug!(domain = %domain, "Cached profile matched nothing, relearning");
                    self.cache.evict(&domain);
                }
                Err(e) => {
                    warn!(domain = %domain, error = %e, "Cached profile unusable, relearning");
                    self.cache.evict(&domain);
                }
            }
        }

        if let Some((records, profile)) = self.detector.detect_with_profile(markup, page_url, fields) {
            if !records.is_empty() {
                self.cache.insert(profile);
                return records;
            }
        }

        let profile = match &self.advisor {
            Some(advisor) => match advisor.propose(markup, page_url).await {
                Ok(Some(candidate)) => validate_profile(markup, candidate),
                Ok(None) => LayoutProfile::generic(&domain),
                Err(e) => {
                    warn!(domain = %domain, error = %e, "Selector advisor failed, using generic selectors");
                    LayoutProfile::generic(&domain)
                }
            },
            None => LayoutProfile::generic(&domain),
        };

        match self.apply_profile(markup, &profile, page_url, fields) {
            Ok(records) => {
                if !records.is_empty() {
                    self.cache.insert(profile);
                } else {
                    debug!(domain = %domain, "No layout recognized on page");
                }
                records
            }
            Err(e) => {
                warn!(domain = %domain, error = %e, "Extraction failed for page");
                Vec::new()
            }
        }
    }

    fn apply_profile(
        &self,
        markup: &str,
        profile: &LayoutProfile,
        page_url: &Url,
        fields: &BTreeSet<Field>,
    ) -> Result<Vec<ExtractedRecord>, LayoutError> {
        let rules = CompiledRules::compile(&profile.fields)?;
        let document = Html::parse_document(markup);
        let ctx = ExtractContext {
            base_url: page_url,
            fields,
            fallback_currency: self.detector.fallback_currency_for(page_url),
        };

        let container = match profile.source {
            ProfileSource::Generic => match generic_container(&document)? {
                Some(container) => container,
                None => return Ok(Vec::new()),
            },
            _ => compile_selector(&profile.container)?,
        };

        Ok(rules.extract_all(&document, &container, ctx))
    }
}

/// `.a, li.b` → `.a a[href], .a[href], li.b a[href], li.b[href]`.
fn item_link_selector(containers: &str) -> String {
    containers
        .split(',')
        .map(str::trim)
        .filter(|css| !css.is_empty())
        .flat_map(|css| [format!("{css} a[href]"), format!("{css}[href]")])
        .collect::<Vec<_>>()
        .join(", ")
}

/// First generic container with at least two matches, else the first with
/// any match.
fn generic_container(document: &Html) -> Result<Option<scraper::Selector>, LayoutError> {
    let mut single = None;
    for css in GENERIC_CONTAINERS {
        let selector = compile_selector(css)?;
        let count = document.select(&selector).count();
        if count >= 2 {
            return Ok(Some(selector));
        }
        if count == 1 && single.is_none() {
            single = Some(selector);
        }
    }
    Ok(single)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::advisor::AiSelectorAdvisor;
    use crate::testing::MockTextGenerator;
    use crate::types::layout::FieldRules;

    fn url() -> Url {
        Url::parse("https://shop.example/c/toys").unwrap()
    }

    fn tiles(n: usize) -> String {
        let body: String = (0..n)
            .map(|i| format!(r#"<div class="tile"><span class="tile-name">Building Blocks Set {i}</span><a href="/p/{i}">view</a></div>"#))
            .collect();
        format!("<html><body>{body}</body></html>")
    }

    fn extractor() -> PageExtractor {
        PageExtractor::new(LayoutDetector::default(), Arc::new(LayoutCache::default()))
    }

    #[tokio::test]
    async fn test_signature_profile_is_cached() {
        let markup = r#"<div class="product-card"><a href="/p/1">Stacking Rainbow Blocks</a></div>
                        <div class="product-card"><a href="/p/2">Wooden Train Set Deluxe</a></div>"#;
        let extractor = extractor();
        let records = extractor.extract(markup, &url(), &Field::defaults()).await;

        assert_eq!(records.len(), 2);
        let cached = extractor.cache().get("shop.example").unwrap();
        assert_eq!(cached.container, ".product-card");
        assert_eq!(cached.source, ProfileSource::Signature);
    }

    #[tokio::test]
    async fn test_advisor_used_for_unknown_layout() {
        let generator = MockTextGenerator::new()
            .with_reply(r#"{"product_container": ".tile", "title": ".tile-name", "product_url": "a"}"#);
        let advisor = AiSelectorAdvisor::new(Arc::new(generator.clone()));
        let extractor = extractor().with_advisor(Arc::new(advisor));

        let records = extractor.extract(&tiles(3), &url(), &Field::defaults()).await;
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].title.as_deref(), Some("Building Blocks Set 0"));

        // Second page reuses the cached advisor profile.
        let records = extractor.extract(&tiles(2), &url(), &Field::defaults()).await;
        assert_eq!(records.len(), 2);
        assert_eq!(generator.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_advisor_failure_uses_generic_selectors() {
        let generator = MockTextGenerator::new().failing();
        let extractor = extractor().with_advisor(Arc::new(AiSelectorAdvisor::new(Arc::new(generator))));

        let markup = r#"<ul><li class="item"><a href="/p/1">Plush Teddy Bear Large</a></li>
                           <li class="item"><a href="/p/2">Plush Bunny Rabbit Small</a></li></ul>"#;
        let records = extractor.extract(markup, &url(), &Field::defaults()).await;
        assert_eq!(records.len(), 2);
        assert_eq!(
            extractor.cache().get("shop.example").map(|p| p.source),
            Some(ProfileSource::Generic)
        );
    }

    #[tokio::test]
    async fn test_stale_cached_profile_is_relearned() {
        let extractor = extractor();
        extractor.cache().insert(LayoutProfile::new(
            "shop.example",
            ".gone",
            FieldRules::default(),
            ProfileSource::Advisor,
        ));

        let markup = r#"<div class="grid-item"><a href="/p/1">Kinetic Sand Castle Kit</a></div>"#;
        let records = extractor.extract(markup, &url(), &Field::defaults()).await;
        assert_eq!(records.len(), 1);
        assert_eq!(extractor.cache().get("shop.example").unwrap().container, ".grid-item");
    }

    #[tokio::test]
    async fn test_item_selectors_follow_learned_layout() {
        let extractor = extractor();
        let unknown = extractor.container_selector("shop.example");
        for css in [".product-card", ".product-wrapper", ".grid-item", "article", "li.item"] {
            assert!(unknown.split(", ").any(|c| c == css), "missing {css}");
        }

        let markup = r#"<div class="grid-item"><a href="/p/1">Kinetic Sand Castle Kit</a></div>"#;
        extractor.extract(markup, &url(), &Field::defaults()).await;
        assert_eq!(extractor.container_selector("shop.example"), ".grid-item");
        assert_eq!(
            extractor.first_item_selector("shop.example"),
            ".grid-item a[href], .grid-item[href]"
        );
    }

    #[test]
    fn test_item_link_selector_parses() {
        let selector = item_link_selector(&GENERIC_CONTAINERS.join(", "));
        assert!(compile_selector(&selector).is_ok());
    }

    #[tokio::test]
    async fn test_unrecognized_page_is_empty() {
        let records = extractor()
            .extract("<html><body><p>Maintenance</p></body></html>", &url(), &Field::defaults())
            .await;
        assert!(records.is_empty());
    }
}
