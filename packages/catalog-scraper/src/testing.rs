//! Testing utilities including scripted mock implementations.
//!
//! These let the pagination loop, the orchestrator, and the summary adapter
//! run without a real browser, model endpoint, or network.

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{AiError, AiResult, BrowserError, BrowserResult, ComplianceError};
use crate::traits::{
    ai::TextGenerator,
    browser::{BrowserLauncher, BrowserSession, WaitOutcome},
    robots::RobotsFetcher,
};

/// One scripted document the mock browser can show.
#[derive(Debug, Clone)]
pub struct MockPage {
    pub url: String,
    pub html: String,
}

impl MockPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }
}

/// Record of a call made to the mock browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBrowserCall {
    Navigate { url: String },
    Content { page: usize },
    WaitForSelector { selector: String },
    ScrollBy { pixels: i64 },
    ScrollToBottom,
    FindVisible,
    Click { selector: String },
    Close,
}

#[derive(Debug, Default)]
struct BrowserState {
    index: usize,
    content_calls: usize,
    closed: bool,
    calls: Vec<MockBrowserCall>,
}

/// A scripted browser session over a fixed list of pages.
///
/// Clicking a next control or scrolling to the bottom moves to the next
/// page while one exists; afterwards the document stays put, so clicks
/// produce no change and the height stops growing. Document height is
/// `1000 * (page index + 1)`.
///
/// Clones share state, so a test can keep a handle to a session handed to
/// the code under test.
#[derive(Clone)]
pub struct MockBrowser {
    pages: Arc<Vec<MockPage>>,
    state: Arc<RwLock<BrowserState>>,
    crash_on_content_call: Option<usize>,
    cancel_after_content_call: Option<(usize, CancellationToken)>,
    navigation_times_out: bool,
}

impl MockBrowser {
    pub fn new(pages: Vec<MockPage>) -> Self {
        Self {
            pages: Arc::new(pages),
            state: Arc::new(RwLock::new(BrowserState::default())),
            crash_on_content_call: None,
            cancel_after_content_call: None,
            navigation_times_out: false,
        }
    }

    /// Fail the `n`th content read (1-based) as if the browser died.
    pub fn crash_on_content_call(mut self, n: usize) -> Self {
        self.crash_on_content_call = Some(n);
        self
    }

    /// Cancel `token` during the `n`th content read (1-based).
    pub fn cancel_after_content_call(mut self, n: usize, token: CancellationToken) -> Self {
        self.cancel_after_content_call = Some((n, token));
        self
    }

    /// Report the landing page load as timed out.
    pub fn with_navigation_timeout(mut self) -> Self {
        self.navigation_times_out = true;
        self
    }

    /// Same script and behavior, fresh state.
    pub fn fresh(&self) -> Self {
        Self {
            pages: self.pages.clone(),
            state: Arc::new(RwLock::new(BrowserState::default())),
            crash_on_content_call: self.crash_on_content_call,
            cancel_after_content_call: self.cancel_after_content_call.clone(),
            navigation_times_out: self.navigation_times_out,
        }
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockBrowserCall> {
        self.state.read().unwrap().calls.clone()
    }

    pub fn content_calls(&self) -> usize {
        self.state.read().unwrap().content_calls
    }

    pub fn is_closed(&self) -> bool {
        self.state.read().unwrap().closed
    }

    fn record(&self, call: MockBrowserCall) -> BrowserResult<()> {
        let mut state = self.state.write().unwrap();
        if state.closed {
            return Err(BrowserError::Closed);
        }
        state.calls.push(call);
        Ok(())
    }

    fn current(&self) -> BrowserResult<&MockPage> {
        let index = self.state.read().unwrap().index;
        self.pages.get(index).ok_or(BrowserError::Closed)
    }

    /// Move to the next scripted page if there is one.
    fn turn_page(&self) {
        let mut state = self.state.write().unwrap();
        if state.index + 1 < self.pages.len() {
            state.index += 1;
        }
    }
}

fn parse_selector(selector: &str) -> BrowserResult<Selector> {
    Selector::parse(selector).map_err(|e| BrowserError::Command(format!("bad selector {selector}: {e}")))
}

fn matches_any(html: &str, selector: &str) -> BrowserResult<bool> {
    let selector = parse_selector(selector)?;
    Ok(Html::parse_document(html).select(&selector).next().is_some())
}

fn first_href(html: &str, selector: &str) -> BrowserResult<Option<String>> {
    let selector = parse_selector(selector)?;
    Ok(Html::parse_document(html)
        .select(&selector)
        .find_map(|el| el.value().attr("href").map(String::from)))
}

#[async_trait]
impl BrowserSession for MockBrowser {
    async fn navigate(&self, url: &str, _timeout: Duration) -> BrowserResult<WaitOutcome> {
        self.record(MockBrowserCall::Navigate { url: url.to_string() })?;
        if self.pages.is_empty() {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: "no scripted pages".to_string(),
            });
        }
        self.state.write().unwrap().index = 0;

        Ok(if self.navigation_times_out {
            WaitOutcome::TimedOut
        } else {
            WaitOutcome::Ready
        })
    }

    async fn content(&self) -> BrowserResult<String> {
        let page = self.state.read().unwrap().index;
        self.record(MockBrowserCall::Content { page })?;

        let call = {
            let mut state = self.state.write().unwrap();
            state.content_calls += 1;
            state.content_calls
        };

        if self.crash_on_content_call == Some(call) {
            self.state.write().unwrap().closed = true;
            return Err(BrowserError::Closed);
        }
        if let Some((n, token)) = &self.cancel_after_content_call {
            if *n == call {
                token.cancel();
            }
        }

        Ok(self.current()?.html.clone())
    }

    async fn current_url(&self) -> BrowserResult<String> {
        Ok(self.current()?.url.clone())
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> BrowserResult<WaitOutcome> {
        self.record(MockBrowserCall::WaitForSelector {
            selector: selector.to_string(),
        })?;

        Ok(if matches_any(&self.current()?.html, selector)? {
            WaitOutcome::Ready
        } else {
            WaitOutcome::TimedOut
        })
    }

    async fn scroll_by(&self, pixels: i64) -> BrowserResult<()> {
        self.record(MockBrowserCall::ScrollBy { pixels })
    }

    async fn scroll_to_bottom(&self) -> BrowserResult<()> {
        self.record(MockBrowserCall::ScrollToBottom)?;
        self.turn_page();
        Ok(())
    }

    async fn document_height(&self) -> BrowserResult<u64> {
        let index = self.state.read().unwrap().index;
        Ok(1000 * (index as u64 + 1))
    }

    async fn find_visible(&self, candidates: &[String]) -> BrowserResult<Option<String>> {
        self.record(MockBrowserCall::FindVisible)?;
        let html = &self.current()?.html;

        for candidate in candidates {
            if matches_any(html, candidate).unwrap_or(false) {
                return Ok(Some(candidate.clone()));
            }
        }
        Ok(None)
    }

    async fn click(&self, selector: &str) -> BrowserResult<()> {
        self.record(MockBrowserCall::Click {
            selector: selector.to_string(),
        })?;
        self.turn_page();
        Ok(())
    }

    async fn first_link(&self, selector: &str) -> BrowserResult<Option<String>> {
        first_href(&self.current()?.html, selector)
    }

    async fn close(&self) -> BrowserResult<()> {
        let mut state = self.state.write().unwrap();
        state.calls.push(MockBrowserCall::Close);
        state.closed = true;
        Ok(())
    }
}

/// Launches fresh copies of a scripted browser.
///
/// Every launched session is kept so tests can assert it was closed.
#[derive(Clone)]
pub struct MockLauncher {
    template: MockBrowser,
    fail_launches: usize,
    crash_sessions: usize,
    launches: Arc<RwLock<usize>>,
    sessions: Arc<RwLock<Vec<MockBrowser>>>,
    domains: Arc<RwLock<Vec<String>>>,
}

impl MockLauncher {
    pub fn new(template: MockBrowser) -> Self {
        Self {
            template,
            fail_launches: 0,
            crash_sessions: 0,
            launches: Arc::new(RwLock::new(0)),
            sessions: Arc::new(RwLock::new(Vec::new())),
            domains: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// The first `n` launches fail outright.
    pub fn fail_first(mut self, n: usize) -> Self {
        self.fail_launches = n;
        self
    }

    /// The first `n` successfully launched sessions crash on their first
    /// content read.
    pub fn crash_first_sessions(mut self, n: usize) -> Self {
        self.crash_sessions = n;
        self
    }

    /// Launch attempts, successful or not.
    pub fn launches(&self) -> usize {
        *self.launches.read().unwrap()
    }

    pub fn sessions(&self) -> Vec<MockBrowser> {
        self.sessions.read().unwrap().clone()
    }

    /// Domains passed to `launch`, in order.
    pub fn domains(&self) -> Vec<String> {
        self.domains.read().unwrap().clone()
    }
}

#[async_trait]
impl BrowserLauncher for MockLauncher {
    async fn launch(&self, domain: &str) -> BrowserResult<Box<dyn BrowserSession>> {
        let attempt = {
            let mut launches = self.launches.write().unwrap();
            *launches += 1;
            *launches
        };
        self.domains.write().unwrap().push(domain.to_string());

        if attempt <= self.fail_launches {
            return Err(BrowserError::Launch(format!("mock launch failure {attempt}")));
        }

        let mut session = self.template.fresh();
        let started = self.sessions.read().unwrap().len();
        if started < self.crash_sessions {
            session = session.crash_on_content_call(1);
        }
        self.sessions.write().unwrap().push(session.clone());
        Ok(Box::new(session))
    }
}

/// A mock text generator with a fixed reply.
#[derive(Clone, Default)]
pub struct MockTextGenerator {
    reply: Arc<RwLock<String>>,
    failing: bool,
    prompts: Arc<RwLock<Vec<String>>>,
}

impl MockTextGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        *self.reply.write().unwrap() = reply.into();
        self
    }

    /// Every call fails with an API error.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Prompts received, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.read().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(&self, prompt: &str) -> AiResult<String> {
        self.prompts.write().unwrap().push(prompt.to_string());
        if self.failing {
            return Err(AiError::Api("mock failure".to_string()));
        }
        Ok(self.reply.read().unwrap().clone())
    }
}

/// Serves one fixed robots document (or none, or a failure).
#[derive(Clone)]
pub struct StaticRobotsFetcher {
    document: Option<String>,
    unreachable: bool,
    fetched: Arc<RwLock<Vec<String>>>,
}

impl StaticRobotsFetcher {
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: Some(document.into()),
            unreachable: false,
            fetched: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// No robots document at all (404).
    pub fn missing() -> Self {
        Self {
            document: None,
            ..Self::new("")
        }
    }

    /// Every fetch fails with a network error.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::missing()
        }
    }

    /// Robots URLs requested, in order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.read().unwrap().clone()
    }
}

#[async_trait]
impl RobotsFetcher for StaticRobotsFetcher {
    async fn fetch(&self, robots_url: &str) -> Result<Option<String>, ComplianceError> {
        self.fetched.write().unwrap().push(robots_url.to_string());
        if self.unreachable {
            return Err(ComplianceError::Http("connection refused".into()));
        }
        Ok(self.document.clone())
    }
}

/// `n` well-formed `product-card` containers for listing page `page`.
///
/// Item links are unique per page and item: `/en/p/{page}-{i}`.
pub fn product_cards(page: usize, n: usize) -> String {
    (1..=n)
        .map(|i| {
            format!(
                r#"<div class="product-card">
  <a href="/en/p/{page}-{i}"><img data-src="/img/{page}-{i}.jpg" src="/img/placeholder.gif"></a>
  <a href="/en/p/{page}-{i}"><h3 class="product-card__title">Wooden Puzzle Set {page}-{i}</h3></a>
  <span class="price">JOD {price}.50</span>
  <div class="rating"><span style="width: 80%"></span></div>
</div>"#,
                price = 10 + i,
            )
        })
        .collect()
}

/// A Dumyah-style listing page with `n` product cards and, optionally, a
/// next control.
pub fn listing_page(page: usize, n: usize, has_next: bool) -> MockPage {
    let url = if page == 1 {
        "https://dumyah.com/en/toys".to_string()
    } else {
        format!("https://dumyah.com/en/toys?page={page}")
    };
    let next = if has_next {
        format!(r#"<div class="pager"><a class="pagination-next" href="?page={}">Next</a></div>"#, page + 1)
    } else {
        String::new()
    };

    MockPage::new(
        url,
        format!(
            "<html><body><div class=\"listing\">{}</div>{}</body></html>",
            product_cards(page, n),
            next
        ),
    )
}
