//! Layout profile types: the field→selector bindings learned for a domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Selector used for prices when a profile does not name one.
pub const DEFAULT_PRICE_SELECTOR: &str = ".price, [class*='price'], .amount, b";

/// Selector used for item links when a profile does not name one.
pub const DEFAULT_URL_SELECTOR: &str = "a[href]";

/// Selector used for images when a profile does not name one.
pub const DEFAULT_IMAGE_SELECTOR: &str = "img";

/// Selector for percentage-width star bars.
pub const DEFAULT_RATING_SELECTOR: &str =
    "[class*='rating'] [style*='width'], [class*='star'] [style*='width'], [class*='rating'][style*='width']";

/// Container selectors tried when nothing better is known.
pub const GENERIC_CONTAINERS: [&str; 5] = [".product-item", ".product-card", ".item", "li.item", "article"];

/// Per-field selectors, each evaluated relative to one container.
///
/// A `None` title selector means "use the anchor-text fallback only".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRules {
    pub title: Option<String>,
    pub price: String,
    pub image: String,
    pub url: String,
    pub rating: String,
}

impl Default for FieldRules {
    fn default() -> Self {
        Self {
            title: None,
            price: DEFAULT_PRICE_SELECTOR.to_string(),
            image: DEFAULT_IMAGE_SELECTOR.to_string(),
            url: DEFAULT_URL_SELECTOR.to_string(),
            rating: DEFAULT_RATING_SELECTOR.to_string(),
        }
    }
}

impl FieldRules {
    pub fn with_title(mut self, selector: impl Into<String>) -> Self {
        self.title = Some(selector.into());
        self
    }

    pub fn with_price(mut self, selector: impl Into<String>) -> Self {
        self.price = selector.into();
        self
    }

    pub fn with_image(mut self, selector: impl Into<String>) -> Self {
        self.image = selector.into();
        self
    }

    pub fn with_url(mut self, selector: impl Into<String>) -> Self {
        self.url = selector.into();
        self
    }
}

/// Where a profile's bindings came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileSource {
    /// A built-in layout signature won the match count.
    Signature,
    /// The selector advisor proposed it and it validated.
    Advisor,
    /// The advisor's proposal failed validation; generic selectors apply.
    Generic,
}

/// Selector bindings cached per domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutProfile {
    pub domain: String,
    pub container: String,
    pub fields: FieldRules,
    pub source: ProfileSource,
    pub created_at: DateTime<Utc>,
}

impl LayoutProfile {
    pub fn new(
        domain: impl Into<String>,
        container: impl Into<String>,
        fields: FieldRules,
        source: ProfileSource,
    ) -> Self {
        Self {
            domain: domain.into(),
            container: container.into(),
            fields,
            source,
            created_at: Utc::now(),
        }
    }

    /// The fixed generic profile used when nothing validates.
    pub fn generic(domain: impl Into<String>) -> Self {
        Self::new(
            domain,
            GENERIC_CONTAINERS.join(", "),
            FieldRules::default(),
            ProfileSource::Generic,
        )
    }
}
