//! External model seams.
//!
//! Both are opaque services: a text generator for batch narratives and a
//! selector advisor for unseen layouts. Neither is trusted; callers always
//! have a deterministic fallback.

use async_trait::async_trait;
use url::Url;

use crate::error::AiResult;
use crate::types::layout::LayoutProfile;

/// Free-text generation (chat-completion style).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for a single prompt.
    async fn generate(&self, prompt: &str) -> AiResult<String>;
}

/// Proposes container and field selectors for a page.
///
/// Output is a candidate only; it must be validated against the markup
/// before use.
#[async_trait]
pub trait SelectorAdvisor: Send + Sync {
    async fn propose(&self, markup: &str, page_url: &Url) -> AiResult<Option<LayoutProfile>>;
}
