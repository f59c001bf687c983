//! The multi-page collection loop.

use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::click::{self, pause, ClickOutcome};
use super::scroll::{ScrollOutcome, ScrollTracker};
use crate::error::{Result, ScrapeError};
use crate::layout::PageExtractor;
use crate::traits::browser::BrowserSession;
use crate::types::config::PaginationSettings;
use crate::types::record::ExtractedRecord;
use crate::types::request::{PaginationMode, ScrapeRequest};

/// Why the collection loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxItems,
    MaxPages,
    NoNextControl,
    NoContentChange,
    EndOfScroll,
    SinglePage,
}

/// Raw per-page records, in page order, not yet deduplicated.
#[derive(Debug, Clone)]
pub struct Collection {
    pub pages: Vec<Vec<ExtractedRecord>>,
    pub stop: StopReason,

    /// The landing page load or its container wait timed out.
    pub first_page_timed_out: bool,
}

impl Collection {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn record_count(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }
}

/// A collection that ended in an error, with whatever was gathered first.
#[derive(Debug)]
pub struct Interrupted {
    pub error: ScrapeError,
    pub pages: Vec<Vec<ExtractedRecord>>,
}

/// Page numbers (1-based) as each page starts.
pub type ProgressSender = UnboundedSender<usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Click,
    Scroll,
}

/// Runs one job's pagination loop inside one browser session.
///
/// Strictly sequential: a page is extracted before the next is requested.
/// Cancellation is observed only between pages.
#[derive(Clone)]
pub struct PaginationDriver {
    settings: PaginationSettings,
    extractor: PageExtractor,
    crawl_delay: Duration,
}

impl PaginationDriver {
    pub fn new(settings: PaginationSettings, extractor: PageExtractor) -> Self {
        Self {
            settings,
            extractor,
            crawl_delay: Duration::ZERO,
        }
    }

    /// Minimum time between the start of one page and the request for the
    /// next (a robots `Crawl-delay`).
    pub fn with_crawl_delay(mut self, delay: Duration) -> Self {
        self.crawl_delay = delay;
        self
    }

    pub fn crawl_delay(&self) -> Duration {
        self.crawl_delay
    }

    pub fn settings(&self) -> &PaginationSettings {
        &self.settings
    }

    pub fn extractor(&self) -> &PageExtractor {
        &self.extractor
    }

    /// Same settings, different extractor.
    pub fn with_extractor(&self, extractor: PageExtractor) -> Self {
        Self {
            settings: self.settings.clone(),
            extractor,
            crawl_delay: self.crawl_delay,
        }
    }

    pub async fn collect(
        &self,
        session: &dyn BrowserSession,
        request: &ScrapeRequest,
        cancel: &CancellationToken,
        progress: Option<ProgressSender>,
    ) -> std::result::Result<Collection, Interrupted> {
        let mut pages = Vec::new();
        let mut first_page_timed_out = false;

        match self
            .run(session, request, cancel, progress.as_ref(), &mut pages, &mut first_page_timed_out)
            .await
        {
            Ok(stop) => {
                info!(pages = pages.len(), stop = ?stop, "Pagination finished");
                Ok(Collection {
                    pages,
                    stop,
                    first_page_timed_out,
                })
            }
            Err(error) => Err(Interrupted { error, pages }),
        }
    }

    async fn run(
        &self,
        session: &dyn BrowserSession,
        request: &ScrapeRequest,
        cancel: &CancellationToken,
        progress: Option<&ProgressSender>,
        pages: &mut Vec<Vec<ExtractedRecord>>,
        first_page_timed_out: &mut bool,
    ) -> Result<StopReason> {
        let target = request.target_url().as_str();
        info!(url = %target, mode = ?request.pagination_mode(), "Navigating");
        if session.navigate(target, self.settings.navigation_timeout).await?.timed_out() {
            warn!(url = %target, "Landing page load timed out, continuing with what loaded");
            *first_page_timed_out = true;
        }

        let mut seen = ItemTally::default();
        let mut strategy = match request.pagination_mode() {
            PaginationMode::NextButton => Some(Strategy::Click),
            PaginationMode::InfiniteScroll => Some(Strategy::Scroll),
            PaginationMode::Auto | PaginationMode::SinglePage => None,
        };
        let mut tracker: Option<ScrollTracker> = None;
        let mut domain = request.domain();
        let mut page = 1;

        loop {
            if cancel.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }
            if let Some(progress) = progress {
                let _ = progress.send(page);
            }
            let page_started = Instant::now();

            let containers_ready = self.prepare_page(session, &domain).await?;
            if page == 1 && !containers_ready {
                *first_page_timed_out = true;
            }

            let markup = session.content().await?;
            let page_url = current_url(session, request.target_url()).await?;
            if let Some(host) = page_url.host_str() {
                domain = host.to_lowercase();
            }
            let records = self.extractor.extract(&markup, &page_url, request.fields()).await;

            if records.is_empty() {
                info!(page, "Page yielded no records");
            }
            seen.add(&records);
            info!(page, batch = records.len(), total_unique = seen.count(), "Page extracted");
            pages.push(records);

            if request.item_limit().is_some_and(|max| seen.count() >= max) {
                return Ok(StopReason::MaxItems);
            }
            if request.page_limit().is_some_and(|max| page >= max) {
                return Ok(StopReason::MaxPages);
            }
            if request.pagination_mode() == PaginationMode::SinglePage {
                return Ok(StopReason::SinglePage);
            }
            if cancel.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }

            let wait = self.crawl_delay.saturating_sub(page_started.elapsed());
            if !wait.is_zero() {
                debug!(wait_ms = wait.as_millis() as u64, "Honoring crawl delay");
                pause(wait).await;
            }

            let chosen = match strategy {
                Some(chosen) => chosen,
                None => {
                    let chosen = if session.find_visible(&self.settings.next_selectors).await?.is_some() {
                        Strategy::Click
                    } else {
                        Strategy::Scroll
                    };
                    debug!(strategy = ?chosen, "Auto pagination resolved");
                    strategy = Some(chosen);
                    chosen
                }
            };

            match chosen {
                Strategy::Click => {
                    let first_item = match &self.settings.first_item_selector {
                        Some(selector) => selector.clone(),
                        None => self.extractor.first_item_selector(&domain),
                    };
                    match click::advance(session, &self.settings, &first_item).await? {
                        ClickOutcome::Advanced => {}
                        ClickOutcome::NoNextControl => return Ok(StopReason::NoNextControl),
                        ClickOutcome::NoContentChange => return Ok(StopReason::NoContentChange),
                    }
                }
                Strategy::Scroll => {
                    if tracker.is_none() {
                        tracker = Some(ScrollTracker::start(session).await?);
                    }
                    if let Some(tracker) = tracker.as_mut() {
                        if tracker.advance(session, &self.settings).await? == ScrollOutcome::EndOfScroll {
                            return Ok(StopReason::EndOfScroll);
                        }
                    }
                }
            }

            page += 1;
        }
    }

    /// Wait for containers, settle, then scroll incrementally to trigger
    /// lazy loading. Returns whether containers appeared in time.
    async fn prepare_page(&self, session: &dyn BrowserSession, domain: &str) -> Result<bool> {
        let containers = match &self.settings.container_selector {
            Some(selector) => selector.clone(),
            None => self.extractor.container_selector(domain),
        };
        let ready = session
            .wait_for_selector(&containers, self.settings.container_timeout)
            .await?
            .is_ready();
        if !ready {
            warn!(containers = %containers, "Timed out waiting for product containers");
        }

        pause(self.settings.initial_settle).await;
        for _ in 0..self.settings.lazy_scroll_steps {
            session.scroll_by(self.settings.lazy_scroll_pixels).await?;
            pause(self.settings.lazy_scroll_settle).await;
        }

        Ok(ready)
    }
}

async fn current_url(session: &dyn BrowserSession, fallback: &Url) -> Result<Url> {
    let current = session.current_url().await?;
    Ok(Url::parse(&current).unwrap_or_else(|_| fallback.clone()))
}

/// Distinct items seen so far, mirroring the dedup rules.
#[derive(Debug, Default)]
struct ItemTally {
    keys: HashSet<String>,
    keyless: usize,
}

impl ItemTally {
    fn add(&mut self, records: &[ExtractedRecord]) {
        for record in records.iter().filter(|r| r.is_valid()) {
            match record.identity_key() {
                Some(key) => {
                    self.keys.insert(key.to_string());
                }
                None => self.keyless += 1,
            }
        }
    }

    fn count(&self) -> usize {
        self.keys.len() + self.keyless
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LayoutCache, LayoutDetector};
    use crate::testing::{listing_page, MockBrowser, MockBrowserCall, MockPage};
    use std::sync::Arc;

    fn driver() -> PaginationDriver {
        PaginationDriver::new(
            PaginationSettings::immediate(),
            PageExtractor::new(LayoutDetector::default(), Arc::new(LayoutCache::default())),
        )
    }

    fn request(mode: PaginationMode) -> ScrapeRequest {
        ScrapeRequest::new("https://dumyah.com/en/toys")
            .unwrap()
            .with_pagination(mode)
    }

    fn clickable_pages(n: usize) -> Vec<MockPage> {
        (1..=n).map(|p| listing_page(p, 5, true)).collect()
    }

    /// Grid listing whose next control swaps the items in place.
    fn ajax_grid_page(page: usize) -> MockPage {
        let items: String = (1..=4)
            .map(|i| {
                format!(
                    r#"<div class="grid-item"><a href="/p/{page}-{i}">Magnetic Tiles Set {page}-{i}</a><span class="price">JOD {i}.00</span></div>"#
                )
            })
            .collect();
        MockPage::new(
            "https://shop.example/c/toys",
            format!(r##"<html><body>{items}<a class="pagination-next" href="#">Next</a></body></html>"##),
        )
    }

    #[tokio::test]
    async fn test_click_stops_at_max_pages() {
        let browser = MockBrowser::new(clickable_pages(50));
        let collection = driver()
            .collect(&browser, &request(PaginationMode::NextButton).with_max_pages(2), &CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(collection.page_count(), 2);
        assert_eq!(collection.stop, StopReason::MaxPages);
        assert_eq!(browser.content_calls(), 2);
    }

    #[tokio::test]
    async fn test_click_detects_in_place_grid_refresh() {
        let browser = MockBrowser::new((1..=3).map(ajax_grid_page).collect());
        let request = ScrapeRequest::new("https://shop.example/c/toys")
            .unwrap()
            .with_pagination(PaginationMode::NextButton)
            .with_max_pages(3);

        let collection = driver()
            .collect(&browser, &request, &CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(collection.page_count(), 3);
        assert_eq!(collection.stop, StopReason::MaxPages);
        assert_eq!(collection.record_count(), 12);
        assert!(!collection.first_page_timed_out);
        assert_eq!(collection.pages[2][0].url.as_deref(), Some("https://shop.example/p/3-1"));
    }

    #[tokio::test]
    async fn test_click_advances_on_url_change_alone() {
        let first = listing_page(1, 5, true);
        let same_items = MockPage::new("https://dumyah.com/en/toys?page=2", first.html.clone());
        let browser = MockBrowser::new(vec![first, same_items]);

        let collection = driver()
            .collect(&browser, &request(PaginationMode::NextButton).with_max_pages(2), &CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(collection.page_count(), 2);
        assert_eq!(collection.stop, StopReason::MaxPages);
    }

    #[tokio::test]
    async fn test_crawl_delay_spaces_page_loads() {
        let browser = MockBrowser::new(clickable_pages(3));
        let driver = driver().with_crawl_delay(Duration::from_millis(30));
        let started = Instant::now();

        let collection = driver
            .collect(&browser, &request(PaginationMode::NextButton).with_max_pages(3), &CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(collection.page_count(), 3);
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_click_stops_without_next_control() {
        let mut pages = clickable_pages(2);
        pages.push(listing_page(3, 5, false));
        let browser = MockBrowser::new(pages);

        let collection = driver()
            .collect(&browser, &request(PaginationMode::Auto), &CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(collection.page_count(), 3);
        assert_eq!(collection.stop, StopReason::NoNextControl);
        assert_eq!(collection.record_count(), 15);
    }

    #[tokio::test]
    async fn test_click_without_change_stops() {
        // The last page still shows a next control that does nothing.
        let browser = MockBrowser::new(clickable_pages(2));
        let collection = driver()
            .collect(&browser, &request(PaginationMode::NextButton), &CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(collection.page_count(), 2);
        assert_eq!(collection.stop, StopReason::NoContentChange);
    }

    #[tokio::test]
    async fn test_max_items_stops_early() {
        let browser = MockBrowser::new(clickable_pages(50));
        let collection = driver()
            .collect(&browser, &request(PaginationMode::Auto).with_max_items(12), &CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(collection.page_count(), 3);
        assert_eq!(collection.stop, StopReason::MaxItems);
    }

    #[tokio::test]
    async fn test_scroll_stops_after_three_flat_heights() {
        let pages = (1..=3).map(|p| listing_page(p, 4 * p, false)).collect();
        let browser = MockBrowser::new(pages);

        let collection = driver()
            .collect(&browser, &request(PaginationMode::InfiniteScroll), &CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(collection.page_count(), 3);
        assert_eq!(collection.stop, StopReason::EndOfScroll);
        let bottoms = browser
            .calls()
            .into_iter()
            .filter(|c| matches!(c, MockBrowserCall::ScrollToBottom))
            .count();
        // Two growing scrolls, then three flat ones.
        assert_eq!(bottoms, 5);
    }

    #[tokio::test]
    async fn test_scroll_pages_count_toward_max_pages() {
        let pages = (1..=4).map(|p| listing_page(p, 4 * p, false)).collect();
        let browser = MockBrowser::new(pages);

        let collection = driver()
            .collect(&browser, &request(PaginationMode::InfiniteScroll).with_max_pages(2), &CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(collection.stop, StopReason::MaxPages);
        assert_eq!(collection.page_count(), 2);
        assert_eq!(browser.content_calls(), 2);
        let bottoms = browser
            .calls()
            .into_iter()
            .filter(|c| matches!(c, MockBrowserCall::ScrollToBottom))
            .count();
        assert_eq!(bottoms, 1);
    }

    #[tokio::test]
    async fn test_auto_falls_back_to_scroll() {
        let pages = (1..=2).map(|p| listing_page(p, 3 * p, false)).collect();
        let browser = MockBrowser::new(pages);

        let collection = driver()
            .collect(&browser, &request(PaginationMode::Auto), &CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(collection.stop, StopReason::EndOfScroll);
        assert_eq!(collection.page_count(), 2);
    }

    #[tokio::test]
    async fn test_single_page_mode() {
        let browser = MockBrowser::new(clickable_pages(3));
        let collection = driver()
            .collect(&browser, &request(PaginationMode::SinglePage), &CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(collection.page_count(), 1);
        assert_eq!(collection.stop, StopReason::SinglePage);
    }

    #[tokio::test]
    async fn test_first_page_timeout_is_flagged() {
        let browser = MockBrowser::new(vec![MockPage::new(
            "https://dumyah.com/en/toys",
            "<html><body><p>Please wait</p></body></html>",
        )]);
        let collection = driver()
            .collect(&browser, &request(PaginationMode::Auto).with_max_pages(1), &CancellationToken::new(), None)
            .await
            .unwrap();

        assert!(collection.first_page_timed_out);
        assert_eq!(collection.record_count(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_keeps_partial_pages() {
        let cancel = CancellationToken::new();
        let browser = MockBrowser::new(clickable_pages(5)).cancel_after_content_call(2, cancel.clone());

        let interrupted = driver()
            .collect(&browser, &request(PaginationMode::NextButton), &cancel, None)
            .await
            .unwrap_err();

        assert!(matches!(interrupted.error, ScrapeError::Cancelled));
        assert_eq!(interrupted.pages.len(), 2);
    }

    #[tokio::test]
    async fn test_progress_reports_each_page() {
        let browser = MockBrowser::new(clickable_pages(5));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        driver()
            .collect(&browser, &request(PaginationMode::NextButton).with_max_pages(3), &CancellationToken::new(), Some(tx))
            .await
            .unwrap();

        let mut reported = Vec::new();
        while let Some(page) = rx.recv().await {
            reported.push(page);
        }
        assert_eq!(reported, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_driver_crash_is_reported_with_partial_pages() {
        let browser = MockBrowser::new(clickable_pages(5)).crash_on_content_call(2);
        let err = driver()
            .collect(&browser, &request(PaginationMode::NextButton), &CancellationToken::new(), None)
            .await
            .unwrap_err();

        assert!(matches!(err.error, ScrapeError::Driver(_)));
        assert_eq!(err.pages.len(), 1);
    }
}
