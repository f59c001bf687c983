//! Configuration types for pagination, orchestration, and layout caching.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::policy::CompliancePolicy;

/// Timeouts and selectors used by the pagination driver.
///
/// Every wait the driver performs is bounded by one of these durations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationSettings {
    /// Page load timeout for the landing page. Default: 90s.
    pub navigation_timeout: Duration,

    /// Containers whose appearance means "listing rendered". Default: none,
    /// the containers of the layout in use.
    pub container_selector: Option<String>,

    /// Wait for product containers before each extraction. Default: 15s.
    pub container_timeout: Duration,

    /// Pause after containers appear, before the lazy-load pass. Default: 3s.
    pub initial_settle: Duration,

    /// Incremental scrolls per page to trigger lazy loading. Default: 3.
    pub lazy_scroll_steps: usize,

    /// Pixels per incremental scroll. Default: 800.
    pub lazy_scroll_pixels: i64,

    /// Pause after each incremental scroll. Default: 1.5s.
    pub lazy_scroll_settle: Duration,

    /// Candidate "next" controls, tried in order.
    pub next_selectors: Vec<String>,

    /// Link whose `href` identifies the first item on a page. Default:
    /// none, links inside the containers of the layout in use.
    pub first_item_selector: Option<String>,

    /// Pause between scrolling the next control into view and clicking. Default: 1.5s.
    pub pre_click_settle: Duration,

    /// How long to wait for the first item to change after a click. Default: 20s.
    pub change_timeout: Duration,

    /// Polling interval while waiting for a content change. Default: 500ms.
    pub change_poll_interval: Duration,

    /// Hydration pause after a detected change. Default: 4s.
    pub post_change_settle: Duration,

    /// Pause after each scroll-to-bottom before measuring height. Default: 2s.
    pub scroll_settle: Duration,

    /// Consecutive unchanged heights that mean "bottom reached". Default: 3.
    pub unchanged_height_limit: usize,

    /// Upper bound on scroll-to-bottom rounds when no page limit is set. Default: 100.
    pub max_scroll_rounds: usize,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(90),
            container_selector: None,
            container_timeout: Duration::from_secs(15),
            initial_settle: Duration::from_secs(3),
            lazy_scroll_steps: 3,
            lazy_scroll_pixels: 800,
            lazy_scroll_settle: Duration::from_millis(1500),
            next_selectors: [
                ".pagination-next",
                "a[rel='next']",
                "li.next > a",
                "a.next",
                ".pagination__next",
                "button[aria-label='Next']",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            first_item_selector: None,
            pre_click_settle: Duration::from_millis(1500),
            change_timeout: Duration::from_secs(20),
            change_poll_interval: Duration::from_millis(500),
            post_change_settle: Duration::from_secs(4),
            scroll_settle: Duration::from_secs(2),
            unchanged_height_limit: 3,
            max_scroll_rounds: 100,
        }
    }
}

impl PaginationSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings with every pause set to zero and short timeouts.
    ///
    /// Intended for scripted sessions where nothing actually renders.
    pub fn immediate() -> Self {
        Self {
            navigation_timeout: Duration::from_millis(50),
            container_timeout: Duration::from_millis(50),
            initial_settle: Duration::ZERO,
            lazy_scroll_settle: Duration::ZERO,
            pre_click_settle: Duration::ZERO,
            change_timeout: Duration::from_millis(50),
            change_poll_interval: Duration::from_millis(5),
            post_change_settle: Duration::ZERO,
            scroll_settle: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Replace the candidate "next" selectors.
    pub fn with_next_selectors<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.next_selectors = selectors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_container_selector(mut self, selector: impl Into<String>) -> Self {
        self.container_selector = Some(selector.into());
        self
    }

    pub fn with_first_item_selector(mut self, selector: impl Into<String>) -> Self {
        self.first_item_selector = Some(selector.into());
        self
    }

    pub fn with_change_timeout(mut self, timeout: Duration) -> Self {
        self.change_timeout = timeout;
        self
    }

    pub fn with_unchanged_height_limit(mut self, limit: usize) -> Self {
        self.unchanged_height_limit = limit.max(1);
        self
    }

    pub fn with_max_scroll_rounds(mut self, rounds: usize) -> Self {
        self.max_scroll_rounds = rounds.max(1);
        self
    }
}

/// Layout profile caching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutCacheConfig {
    /// Domains kept before the oldest is evicted. Default: 256.
    pub capacity: usize,

    /// Reuse learned profiles across jobs. When false, each job starts
    /// with an empty cache. Default: true.
    pub share_across_jobs: bool,
}

impl Default for LayoutCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            share_across_jobs: true,
        }
    }
}

impl LayoutCacheConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn with_share_across_jobs(mut self, share: bool) -> Self {
        self.share_across_jobs = share;
        self
    }
}

/// Job runner and worker pool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Retries after the first attempt, for retryable failures only. Default: 3.
    pub max_retries: u32,

    /// Delay before the first retry; doubles each retry. Default: 60s.
    pub retry_backoff: Duration,

    /// Upper bound on a single backoff delay. Default: 10 minutes.
    pub max_backoff: Duration,

    /// Jobs running at once in a worker pool. Default: 2.
    pub max_concurrent_jobs: usize,

    /// Currency assumed when neither the page nor the site says. Default: JOD.
    pub fallback_currency: Option<String>,

    pub policy: CompliancePolicy,
    pub pagination: PaginationSettings,
    pub layout_cache: LayoutCacheConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff: Duration::from_secs(60),
            max_backoff: Duration::from_secs(600),
            max_concurrent_jobs: 2,
            fallback_currency: Some("JOD".to_string()),
            policy: CompliancePolicy::default(),
            pagination: PaginationSettings::default(),
            layout_cache: LayoutCacheConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_max_concurrent_jobs(mut self, jobs: usize) -> Self {
        self.max_concurrent_jobs = jobs.max(1);
        self
    }

    pub fn with_fallback_currency(mut self, currency: Option<String>) -> Self {
        self.fallback_currency = currency;
        self
    }

    pub fn with_policy(mut self, policy: CompliancePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_pagination(mut self, pagination: PaginationSettings) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn with_layout_cache(mut self, layout_cache: LayoutCacheConfig) -> Self {
        self.layout_cache = layout_cache;
        self
    }

    /// Backoff before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
    /// capped at `max_backoff`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.retry_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.backoff_for(1), Duration::from_secs(60));
        assert_eq!(config.backoff_for(2), Duration::from_secs(120));
        assert_eq!(config.backoff_for(3), Duration::from_secs(240));
        assert_eq!(config.backoff_for(5), Duration::from_secs(600));
        assert_eq!(config.backoff_for(40), Duration::from_secs(600));
    }

    #[test]
    fn test_immediate_settings_keep_selectors() {
        let settings = PaginationSettings::immediate();
        assert_eq!(settings.initial_settle, Duration::ZERO);
        assert_eq!(settings.next_selectors[0], ".pagination-next");
        assert_eq!(settings.unchanged_height_limit, 3);
    }
}
