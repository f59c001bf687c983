//! Known listing layouts and their compiled selectors.

use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use tracing::warn;
use url::Url;

use super::fields::{
    clean_text, guess_currency, is_garbage_title, parse_price, rating_from_style,
    resolve_asset_url, resolve_item_url, MIN_ANCHOR_TITLE_CHARS,
};
use crate::error::LayoutError;
use crate::types::layout::FieldRules;
use crate::types::record::ExtractedRecord;
use crate::types::request::Field;

/// Parse a CSS selector, mapping failures to [`LayoutError`].
pub fn compile_selector(selector: &str) -> Result<Selector, LayoutError> {
    Selector::parse(selector).map_err(|e| LayoutError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// [`FieldRules`] with every selector parsed.
#[derive(Debug, Clone)]
pub struct CompiledRules {
    title: Option<Selector>,
    price: Selector,
    image: Selector,
    url: Selector,
    rating: Selector,
    anchor: Selector,
}

impl CompiledRules {
    pub fn compile(rules: &FieldRules) -> Result<Self, LayoutError> {
        Ok(Self {
            title: rules.title.as_deref().map(compile_selector).transpose()?,
            price: compile_selector(&rules.price)?,
            image: compile_selector(&rules.image)?,
            url: compile_selector(&rules.url)?,
            rating: compile_selector(&rules.rating)?,
            anchor: compile_selector("a")?,
        })
    }
}

/// What the extractor needs to know besides the markup.
#[derive(Debug, Clone, Copy)]
pub struct ExtractContext<'a> {
    pub base_url: &'a Url,
    pub fields: &'a BTreeSet<Field>,
    pub fallback_currency: Option<&'a str>,
}

impl CompiledRules {
    /// Extract one record per container. Invalid records are dropped.
    pub fn extract_all(&self, document: &Html, container: &Selector, ctx: ExtractContext<'_>) -> Vec<ExtractedRecord> {
        document
            .select(container)
            .map(|element| self.extract_one(element, ctx))
            .filter(ExtractedRecord::is_valid)
            .collect()
    }

    fn extract_one(&self, container: ElementRef<'_>, ctx: ExtractContext<'_>) -> ExtractedRecord {
        let mut record = ExtractedRecord::default();
        let wants = |field: Field| ctx.fields.contains(&field);

        if wants(Field::Title) {
            record.title = self.title(container);
        }

        if wants(Field::Price) || wants(Field::Currency) {
            let price_text = container
                .select(&self.price)
                .next()
                .map(|el| clean_text(&el.text().collect::<String>()))
                .filter(|t| !t.is_empty());

            if let Some(text) = price_text {
                if wants(Field::Price) {
                    record.price = parse_price(&text);
                }
                record.currency = guess_currency(&text)
                    .or(ctx.fallback_currency)
                    .map(String::from);
                record.price_text = Some(text);
            }
        }

        if wants(Field::Image) {
            record.image_url = container.select(&self.image).next().and_then(|img| {
                let value = img.value();
                value
                    .attr("data-src")
                    .filter(|s| !s.trim().is_empty())
                    .or_else(|| value.attr("src"))
                    .and_then(|src| resolve_asset_url(src, ctx.base_url))
            });
        }

        if wants(Field::Rating) {
            record.rating = container
                .select(&self.rating)
                .find_map(|el| el.value().attr("style").and_then(rating_from_style));
        }

        // The canonical URL is the identity key, so it is always extracted.
        record.url = self.item_url(container, ctx.base_url);

        record
    }

    /// Primary selector first, then the longest acceptable anchor text.
    fn title(&self, container: ElementRef<'_>) -> Option<String> {
        if let Some(selector) = &self.title {
            let primary = container
                .select(selector)
                .map(|el| clean_text(&el.text().collect::<String>()))
                .find(|text| !is_garbage_title(text));
            if primary.is_some() {
                return primary;
            }
        }

        container
            .select(&self.anchor)
            .map(|a| clean_text(&a.text().collect::<String>()))
            .filter(|text| text.chars().count() >= MIN_ANCHOR_TITLE_CHARS && !is_garbage_title(text))
            .max_by_key(|text| text.chars().count())
    }

    fn item_url(&self, container: ElementRef<'_>, base: &Url) -> Option<String> {
        // Containers that are themselves links (e.g. `a.product-card`).
        let own = container
            .value()
            .attr("href")
            .and_then(|href| resolve_item_url(href, base));

        own.or_else(|| {
            container
                .select(&self.url)
                .filter_map(|a| a.value().attr("href"))
                .find_map(|href| resolve_item_url(href, base))
        })
    }
}

/// A recognizable listing template: a container selector plus field rules.
#[derive(Debug, Clone)]
pub struct LayoutSignature {
    id: String,
    container_css: String,
    rules: FieldRules,
    container: Selector,
    compiled: CompiledRules,
}

impl LayoutSignature {
    pub fn new(id: impl Into<String>, container: &str, rules: FieldRules) -> Result<Self, LayoutError> {
        Ok(Self {
            id: id.into(),
            container_css: container.to_string(),
            container: compile_selector(container)?,
            compiled: CompiledRules::compile(&rules)?,
            rules,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn container_css(&self) -> &str {
        &self.container_css
    }

    pub fn rules(&self) -> &FieldRules {
        &self.rules
    }

    /// Number of containers this signature finds in a document.
    pub fn count(&self, document: &Html) -> usize {
        document.select(&self.container).count()
    }

    pub fn extract(&self, document: &Html, ctx: ExtractContext<'_>) -> Vec<ExtractedRecord> {
        self.compiled.extract_all(document, &self.container, ctx)
    }
}

/// Ordered signatures plus a catch-all used on ties or zero matches.
#[derive(Debug, Clone)]
pub struct SignatureRegistry {
    signatures: Vec<LayoutSignature>,
    catch_all: Option<LayoutSignature>,
}

impl SignatureRegistry {
    pub fn new(signatures: Vec<LayoutSignature>, catch_all: Option<LayoutSignature>) -> Self {
        Self {
            signatures,
            catch_all,
        }
    }

    /// Built-in storefront layouts: `product-card`, `product-item`,
    /// `product-wrapper`, `grid-item`, with `article` as the catch-all.
    pub fn builtin() -> Self {
        let specs = [
            (
                "product-card",
                ".product-card",
                FieldRules::default()
                    .with_title(".product-card__title, .product-title, .product-name, .title, h3, h2"),
            ),
            (
                "product-item",
                ".product-item",
                FieldRules::default()
                    .with_title(".product-item-link, .product-item-name, .product-name, .product-title, .name, h2, h3"),
            ),
            (
                "product-wrapper",
                ".product-wrapper",
                FieldRules::default().with_title(".product-name, .product-title, .title, h4, h3"),
            ),
            (
                "grid-item",
                ".grid-item",
                FieldRules::default().with_title(".grid-item__title, .grid-product__title, .title, .name, h3"),
            ),
        ];

        let signatures = specs
            .into_iter()
            .filter_map(|(id, container, rules)| match LayoutSignature::new(id, container, rules) {
                Ok(signature) => Some(signature),
                Err(e) => {
                    warn!(signature = id, error = %e, "Skipping built-in signature");
                    None
                }
            })
            .collect();

        let catch_all = LayoutSignature::new(
            "article",
            "article",
            FieldRules::default().with_title("h1, h2, h3, .entry-title, .title"),
        )
        .map_err(|e| warn!(error = %e, "Skipping catch-all signature"))
        .ok();

        Self::new(signatures, catch_all)
    }

    pub fn signatures(&self) -> &[LayoutSignature] {
        &self.signatures
    }

    pub fn catch_all(&self) -> Option<&LayoutSignature> {
        self.catch_all.as_ref()
    }
}

impl Default for SignatureRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
