//! Model-assisted selector discovery for layouts no signature recognizes.

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Node};
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};
use url::Url;

use super::fields::clean_text;
use super::signatures::compile_selector;
use crate::error::{AiError, AiResult};
use crate::traits::ai::{SelectorAdvisor, TextGenerator};
use crate::types::layout::{FieldRules, LayoutProfile, ProfileSource};

/// Markup sent to the model is cut to this many characters.
pub const MAX_PROMPT_MARKUP_CHARS: usize = 40_000;

/// A proposal must match at least this many containers to be used.
pub const MIN_CONTAINERS: usize = 2;

/// Elements dropped, with everything inside them, before prompting.
const NOISE_ELEMENTS: [&str; 7] = ["script", "style", "noscript", "svg", "nav", "header", "footer"];

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: [&str; 8] = ["area", "br", "col", "hr", "img", "input", "meta", "link"];

static RE_JSON_OBJECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Reply shape requested from the model.
#[derive(Debug, Deserialize)]
struct ProposedSelectors {
    product_container: Option<String>,
    title: Option<String>,
    price: Option<String>,
    image: Option<String>,
    product_url: Option<String>,
}

/// Asks a [`TextGenerator`] for container and field selectors.
pub struct AiSelectorAdvisor {
    generator: Arc<dyn TextGenerator>,
}

impl AiSelectorAdvisor {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl SelectorAdvisor for AiSelectorAdvisor {
    async fn propose(&self, markup: &str, page_url: &Url) -> AiResult<Option<LayoutProfile>> {
        let prompt = selector_prompt(&strip_noise(markup), page_url);
        let reply = self.generator.generate(&prompt).await?;

        let proposal = parse_proposal(&reply)?;
        let Some(container) = proposal.product_container.filter(|c| !c.trim().is_empty()) else {
            debug!(url = %page_url, "Advisor reply had no container selector");
            return Ok(None);
        };

        let mut fields = FieldRules::default();
        fields.title = non_empty(proposal.title);
        if let Some(price) = non_empty(proposal.price) {
            fields.price = price;
        }
        if let Some(image) = non_empty(proposal.image) {
            fields.image = image;
        }
        if let Some(url) = non_empty(proposal.product_url) {
            fields.url = url;
        }

        info!(url = %page_url, container = %container, "Advisor proposed selectors");
        Ok(Some(LayoutProfile::new(
            page_url.host_str().unwrap_or_default().to_lowercase(),
            container.trim(),
            fields,
            ProfileSource::Advisor,
        )))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Re-serialize the document without script, style, and page chrome
/// elements, collapsing whitespace in text, then cut to
/// [`MAX_PROMPT_MARKUP_CHARS`].
pub fn strip_noise(markup: &str) -> String {
    let document = Html::parse_document(markup);
    let mut cleaned = String::with_capacity(markup.len().min(MAX_PROMPT_MARKUP_CHARS * 2));
    write_element(document.root_element(), &mut cleaned);

    match cleaned.char_indices().nth(MAX_PROMPT_MARKUP_CHARS) {
        Some((idx, _)) => cleaned[..idx].to_string(),
        None => cleaned,
    }
}

fn write_element(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if NOISE_ELEMENTS.contains(&name) {
        return;
    }

    out.push('<');
    out.push_str(name);
    for (attr, value) in element.value().attrs() {
        out.push_str(&format!(" {attr}=\"{}\"", value.replace('"', "&quot;")));
    }
    out.push('>');

    for child in element.children() {
        match child.value() {
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    write_element(child, out);
                }
            }
            Node::Text(text) => {
                let text = clean_text(text);
                if !text.is_empty() {
                    out.push_str(&text.replace('<', "&lt;").replace('>', "&gt;"));
                }
            }
            _ => {}
        }
    }

    if !VOID_ELEMENTS.contains(&name) {
        out.push_str("</");
        out.push_str(name);
        out.push('>');
    }
}

fn selector_prompt(markup: &str, page_url: &Url) -> String {
    format!(
        "Return ONLY a JSON object with CSS selectors for product_container, title, price, image, \
         and product_url for the e-commerce listing page {page_url}. Selectors for title, price, \
         image and product_url must be relative to one product_container element. HTML: {markup}"
    )
}

/// Parse the first `{...}` block of a model reply.
fn parse_proposal(reply: &str) -> AiResult<ProposedSelectors> {
    let json = RE_JSON_OBJECT
        .find(reply)
        .ok_or_else(|| AiError::Parse("no JSON object in reply".to_string()))?;
    serde_json::from_str(json.as_str()).map_err(|e| AiError::Parse(e.to_string()))
}

/// Accept a candidate only if its container selector parses and matches at
/// least [`MIN_CONTAINERS`] elements; otherwise use the generic profile.
pub fn validate_profile(markup: &str, candidate: LayoutProfile) -> LayoutProfile {
    let document = Html::parse_document(markup);

    let matches = match compile_selector(&candidate.container) {
        Ok(selector) => document.select(&selector).count(),
        Err(e) => {
            warn!(error = %e, "Advisor proposed an invalid container selector");
            0
        }
    };

    if matches >= MIN_CONTAINERS {
        return candidate;
    }

    warn!(
        domain = %candidate.domain,
        container = %candidate.container,
        matches,
        "Advisor proposal failed validation, using generic selectors"
    );
    LayoutProfile::generic(candidate.domain)
}
