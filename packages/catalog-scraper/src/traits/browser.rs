//! Browser automation seam.
//!
//! Every wait takes an explicit timeout and reports [`WaitOutcome`] instead
//! of failing, so callers decide whether a timeout ends pagination or the
//! job. Only a crashed or unreachable browser surfaces as [`BrowserError`].
//!
//! [`BrowserError`]: crate::error::BrowserError

use async_trait::async_trait;
use std::time::Duration;

use crate::error::BrowserResult;

/// Result of a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready,
    TimedOut,
}

impl WaitOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, WaitOutcome::Ready)
    }

    pub fn timed_out(&self) -> bool {
        matches!(self, WaitOutcome::TimedOut)
    }
}

/// One browser tab owned by one job.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Load a URL and wait for the load event.
    async fn navigate(&self, url: &str, timeout: Duration) -> BrowserResult<WaitOutcome>;

    /// Current serialized DOM.
    async fn content(&self) -> BrowserResult<String>;

    /// URL of the current document (changes after client-side navigation).
    async fn current_url(&self) -> BrowserResult<String>;

    /// Wait until at least one element matches `selector`.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> BrowserResult<WaitOutcome>;

    /// Scroll the viewport down by `pixels`.
    async fn scroll_by(&self, pixels: i64) -> BrowserResult<()>;

    /// Scroll to the bottom of the document.
    async fn scroll_to_bottom(&self) -> BrowserResult<()>;

    /// `document.body.scrollHeight` in pixels.
    async fn document_height(&self) -> BrowserResult<u64>;

    /// First selector in `candidates` that matches a visible element.
    async fn find_visible(&self, candidates: &[String]) -> BrowserResult<Option<String>>;

    /// Scroll `selector` into view and click it through script.
    async fn click(&self, selector: &str) -> BrowserResult<()>;

    /// `href` of the first element matching `selector`, if any.
    async fn first_link(&self, selector: &str) -> BrowserResult<Option<String>>;

    /// Release the tab and its browser process.
    async fn close(&self) -> BrowserResult<()>;
}

/// Opens sessions. One session per job; sessions are never shared.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launch a session using the persistent profile for `domain`.
    async fn launch(&self, domain: &str) -> BrowserResult<Box<dyn BrowserSession>>;
}
