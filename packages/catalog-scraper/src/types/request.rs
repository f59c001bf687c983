//! Scrape request types: what to collect and how to paginate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::{Result, ScrapeError};

/// How the pagination driver advances between pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PaginationMode {
    /// Click "next" when a control is visible after the first page,
    /// otherwise fall back to infinite scroll.
    #[default]
    Auto,
    /// Click a "next" control between pages.
    NextButton,
    /// Scroll to the bottom until the document stops growing.
    InfiniteScroll,
    /// Extract the landing page only.
    SinglePage,
}

impl FromStr for PaginationMode {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "auto" => Ok(Self::Auto),
            "next-button" | "next" | "click" => Ok(Self::NextButton),
            "infinite-scroll" | "scroll" => Ok(Self::InfiniteScroll),
            "single-page" | "single" | "none" => Ok(Self::SinglePage),
            other => Err(ScrapeError::InvalidRequest {
                reason: format!("unknown pagination mode `{other}`"),
            }),
        }
    }
}

/// A record field a caller can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Price,
    Currency,
    Image,
    Url,
    Rating,
}

impl Field {
    /// The field set used when a request does not name any.
    pub fn defaults() -> BTreeSet<Field> {
        [Field::Title, Field::Price, Field::Currency, Field::Image, Field::Url]
            .into_iter()
            .collect()
    }
}

impl FromStr for Field {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "title" | "name" => Ok(Field::Title),
            "price" => Ok(Field::Price),
            "currency" => Ok(Field::Currency),
            "image" | "image_url" => Ok(Field::Image),
            "url" | "product_url" | "link" => Ok(Field::Url),
            "rating" => Ok(Field::Rating),
            other => Err(ScrapeError::InvalidRequest {
                reason: format!("unknown field `{other}`"),
            }),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Title => "title",
            Field::Price => "price",
            Field::Currency => "currency",
            Field::Image => "image",
            Field::Url => "url",
            Field::Rating => "rating",
        };
        f.write_str(name)
    }
}

/// Storefront a target URL belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SiteTag {
    Shein,
    Temu,
    Dumyah,
    #[default]
    Other,
}

impl SiteTag {
    /// Detect the storefront from a URL's host.
    pub fn from_url(url: &Url) -> Self {
        let host = url.host_str().unwrap_or_default().to_lowercase();
        if host.contains("shein.com") {
            SiteTag::Shein
        } else if host.contains("temu.com") {
            SiteTag::Temu
        } else if host.contains("dumyah.com") {
            SiteTag::Dumyah
        } else {
            SiteTag::Other
        }
    }

    /// Currency assumed when a price carries no recognizable marker.
    pub fn fallback_currency(&self) -> Option<&'static str> {
        match self {
            SiteTag::Dumyah => Some("JOD"),
            SiteTag::Shein | SiteTag::Temu => Some("USD"),
            SiteTag::Other => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SiteTag::Shein => "shein",
            SiteTag::Temu => "temu",
            SiteTag::Dumyah => "dumyah",
            SiteTag::Other => "other",
        }
    }
}

impl fmt::Display for SiteTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scrape submission. Immutable once built: the `with_*` methods
/// consume the request and return a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeRequest {
    target_url: Url,
    max_items: usize,
    max_pages: usize,
    pagination_mode: PaginationMode,
    fields: BTreeSet<Field>,
}

impl ScrapeRequest {
    /// Create a request for an absolute http(s) URL.
    ///
    /// Limits default to 0 (unlimited) and the field set to
    /// [`Field::defaults`].
    pub fn new(target_url: &str) -> Result<Self> {
        let parsed = Url::parse(target_url.trim()).map_err(|e| ScrapeError::InvalidRequest {
            reason: format!("`{target_url}` is not an absolute URL: {e}"),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(ScrapeError::InvalidRequest {
                reason: format!("`{target_url}` is not an http(s) URL"),
            });
        }

        Ok(Self {
            target_url: parsed,
            max_items: 0,
            max_pages: 0,
            pagination_mode: PaginationMode::Auto,
            fields: Field::defaults(),
        })
    }

    /// Set the item limit (0 = unlimited).
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    /// Set the page limit (0 = unlimited).
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_pagination(mut self, mode: PaginationMode) -> Self {
        self.pagination_mode = mode;
        self
    }

    /// Replace the requested field set. An empty set means the defaults.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        let fields: BTreeSet<Field> = fields.into_iter().collect();
        self.fields = if fields.is_empty() {
            Field::defaults()
        } else {
            fields
        };
        self
    }

    pub fn target_url(&self) -> &Url {
        &self.target_url
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    pub fn pagination_mode(&self) -> PaginationMode {
        self.pagination_mode
    }

    pub fn fields(&self) -> &BTreeSet<Field> {
        &self.fields
    }

    /// Whether the caller asked for a field.
    pub fn wants(&self, field: Field) -> bool {
        self.fields.contains(&field)
    }

    /// Host of the target URL, lowercased.
    pub fn domain(&self) -> String {
        self.target_url
            .host_str()
            .unwrap_or_default()
            .to_lowercase()
    }

    pub fn site(&self) -> SiteTag {
        SiteTag::from_url(&self.target_url)
    }

    /// Item limit as an option (`None` = unlimited).
    pub fn item_limit(&self) -> Option<usize> {
        (self.max_items > 0).then_some(self.max_items)
    }

    /// Page limit as an option (`None` = unlimited).
    pub fn page_limit(&self) -> Option<usize> {
        (self.max_pages > 0).then_some(self.max_pages)
    }
}
