//! Field-level parsing helpers shared by every layout.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static RE_RATING_WIDTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"width:\s*([\d.]+)%").unwrap());

/// Badge, shipping, and calendar text that shows up inside product cards.
static RE_GARBAGE_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)delivery|within \d+|hours|shipping|jod|out of stock|add to cart|save \d+|view product|\b(?:sun|mon|tues|wednes|thurs|fri|satur)day\b|\b(?:january|february|march|april|may|june|july|august|september|october|november|december)\b",
    )
    .unwrap()
});

/// Minimum length, in characters, of an anchor text used as a title.
pub const MIN_ANCHOR_TITLE_CHARS: usize = 9;

/// Extract a number from price text by keeping digits and decimal points.
///
/// `"JOD 12.50"` → `12.5`. Returns `None` when no digits remain or the
/// remaining text is not a single decimal number.
pub fn parse_price(text: &str) -> Option<f64> {
    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let digits = digits.trim_matches('.');

    if !digits.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    digits.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Best-effort currency code from price text.
pub fn guess_currency(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    if lower.contains("sar") || lower.contains('﷼') {
        Some("SAR")
    } else if lower.contains("jod") || lower.contains("jd") {
        Some("JOD")
    } else if lower.contains("aed") {
        Some("AED")
    } else if lower.contains('$') {
        Some("USD")
    } else if lower.contains('€') {
        Some("EUR")
    } else if lower.contains('£') {
        Some("GBP")
    } else {
        None
    }
}

/// Convert a star-bar style such as `width: 80%` to a 0-5 rating.
///
/// Rounded to one decimal; missing or unparseable styles give `None`.
pub fn rating_from_style(style: &str) -> Option<f32> {
    let captures = RE_RATING_WIDTH.captures(style)?;
    let percentage: f32 = captures.get(1)?.as_str().parse().ok()?;
    if !percentage.is_finite() {
        return None;
    }
    let rating = (percentage / 100.0 * 5.0).clamp(0.0, 5.0);
    Some((rating * 10.0).round() / 10.0)
}

/// Whether text is boilerplate rather than a product title.
pub fn is_garbage_title(text: &str) -> bool {
    let text = text.trim();
    text.chars().count() < 4 || RE_GARBAGE_TITLE.is_match(text)
}

/// Collapse runs of whitespace into single spaces.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve an item link to an absolute http(s) URL without fragment.
pub fn resolve_item_url(href: &str, base: &Url) -> Option<String> {
    let mut url = resolve(href, base)?;
    url.set_fragment(None);
    Some(url.into())
}

/// Resolve an image or other asset reference to an absolute http(s) URL.
pub fn resolve_asset_url(src: &str, base: &Url) -> Option<String> {
    resolve(src, base).map(String::from)
}

fn resolve(reference: &str, base: &Url) -> Option<Url> {
    let reference = reference.trim();
    if reference.is_empty() || reference.starts_with('#') {
        return None;
    }

    let url = base.join(reference).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://dumyah.com/en/toys?page=1").unwrap()
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("JOD 12.50"), Some(12.5));
        assert_eq!(parse_price("12.50 JD."), Some(12.5));
        assert_eq!(parse_price("$1,299"), Some(1299.0));
        assert_eq!(parse_price("Free"), None);
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("..."), None);
        assert_eq!(parse_price("1.2.3"), None);
    }

    #[test]
    fn test_guess_currency() {
        assert_eq!(guess_currency("12.50 JOD"), Some("JOD"));
        assert_eq!(guess_currency("12 JD"), Some("JOD"));
        assert_eq!(guess_currency("SAR 40"), Some("SAR"));
        assert_eq!(guess_currency("40 ﷼"), Some("SAR"));
        assert_eq!(guess_currency("AED 99"), Some("AED"));
        assert_eq!(guess_currency("$9.99"), Some("USD"));
        assert_eq!(guess_currency("€5"), Some("EUR"));
        assert_eq!(guess_currency("£5"), Some("GBP"));
        assert_eq!(guess_currency("12.50"), None);
    }

    #[test]
    fn test_rating_from_style() {
        assert_eq!(rating_from_style("width: 50%"), Some(2.5));
        assert_eq!(rating_from_style("width:100%;"), Some(5.0));
        assert_eq!(rating_from_style("width: 88%"), Some(4.4));
        assert_eq!(rating_from_style("height: 50%"), None);
        assert_eq!(rating_from_style(""), None);
        assert_eq!(rating_from_style("width: %"), None);
    }

    #[test]
    fn test_garbage_titles() {
        assert!(is_garbage_title("Get it within 2 days"));
        assert!(is_garbage_title("Free Shipping"));
        assert!(is_garbage_title("Delivery by Thursday"));
        assert!(is_garbage_title("ADD TO CART"));
        assert!(is_garbage_title("15 January"));
        assert!(is_garbage_title("Toy"));
        assert!(is_garbage_title("   "));
        assert!(!is_garbage_title("Wooden Stacking Rainbow"));
        assert!(!is_garbage_title("Marching Band Drum Set"));
    }

    #[test]
    fn test_resolve_item_url() {
        let base = base();
        assert_eq!(
            resolve_item_url("/en/p/lego-city#reviews", &base).as_deref(),
            Some("https://dumyah.com/en/p/lego-city")
        );
        assert_eq!(
            resolve_item_url("//cdn.dumyah.com/p/1", &base).as_deref(),
            Some("https://cdn.dumyah.com/p/1")
        );
        assert_eq!(resolve_item_url("javascript:void(0)", &base), None);
        assert_eq!(resolve_item_url("mailto:shop@dumyah.com", &base), None);
        assert_eq!(resolve_item_url("#", &base), None);
        assert_eq!(resolve_item_url("", &base), None);
    }

    #[test]
    fn test_resolve_asset_url_rejects_inline_data() {
        let base = base();
        assert_eq!(resolve_asset_url("data:image/gif;base64,R0lGOD", &base), None);
        assert_eq!(
            resolve_asset_url("img/p1.jpg", &base).as_deref(),
            Some("https://dumyah.com/en/img/p1.jpg")
        );
    }
}
