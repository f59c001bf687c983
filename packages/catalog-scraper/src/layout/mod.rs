//! Layout detection and record extraction.
//!
//! A page is matched against a fixed registry of layout signatures; the
//! signature with the strictly highest container count extracts the page.
//! Profiles learned per domain are kept in an owned [`LayoutCache`], and an
//! optional [`SelectorAdvisor`](crate::traits::ai::SelectorAdvisor) proposes
//! selectors for layouts the registry does not know.

mod advisor;
mod cache;
mod detector;
mod extractor;
pub mod fields;
mod signatures;

pub use advisor::{strip_noise, validate_profile, AiSelectorAdvisor, MAX_PROMPT_MARKUP_CHARS, MIN_CONTAINERS};
pub use cache::LayoutCache;
pub use detector::LayoutDetector;
pub use extractor::PageExtractor;
pub use signatures::{compile_selector, CompiledRules, ExtractContext, LayoutSignature, SignatureRegistry};
