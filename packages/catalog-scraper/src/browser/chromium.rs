//! Headless Chromium sessions driven over CDP.
//!
//! Each session is its own browser process with a persistent profile
//! directory per domain, so cookies and consent banners survive between
//! jobs on the same site.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{BrowserError, BrowserResult};
use crate::traits::browser::{BrowserLauncher, BrowserSession, WaitOutcome};
use crate::types::policy::DEFAULT_USER_AGENT;

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Launches one Chromium process per session.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    executable: Option<PathBuf>,
    headless: bool,
    profile_root: PathBuf,
    user_agent: String,
}

impl ChromiumLauncher {
    pub fn new(profile_root: impl Into<PathBuf>) -> Self {
        Self {
            executable: None,
            headless: true,
            profile_root: profile_root.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            executable: config.chromium_path.clone(),
            headless: config.headless,
            profile_root: config.profile_dir.clone(),
            user_agent: config.user_agent.clone(),
        }
    }

    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Profile directory for `domain`.
    pub fn profile_dir(&self, domain: &str) -> PathBuf {
        profile_dir_for(&self.profile_root, domain)
    }
}

fn profile_dir_for(root: &Path, domain: &str) -> PathBuf {
    let name: String = domain
        .trim_start_matches("www.")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    let name = if name.is_empty() { "default".to_string() } else { name };
    root.join(name)
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, domain: &str) -> BrowserResult<Box<dyn BrowserSession>> {
        let profile = self.profile_dir(domain);
        std::fs::create_dir_all(&profile)
            .map_err(|e| BrowserError::Launch(format!("profile dir {}: {e}", profile.display())))?;

        let mut builder = BrowserConfig::builder()
            .user_data_dir(&profile)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--user-agent={}", self.user_agent));
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        // The CDP connection only makes progress while the handler is polled.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler event error");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(BrowserError::Launch(e.to_string()));
            }
        };

        info!(domain = %domain, profile = %profile.display(), "Launched Chromium session");
        Ok(Box::new(ChromiumSession {
            browser: Mutex::new(Some(browser)),
            page,
            handler,
        }))
    }
}

/// One tab in its own Chromium process.
pub struct ChromiumSession {
    browser: Mutex<Option<Browser>>,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumSession {
    /// A dead handler means the browser process went away.
    fn ensure_alive(&self) -> BrowserResult<()> {
        if self.handler.is_finished() {
            return Err(BrowserError::Closed);
        }
        Ok(())
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> BrowserResult<T> {
        self.ensure_alive()?;
        let result = self
            .page
            .evaluate_expression(script)
            .await
            .map_err(|e| BrowserError::Command(e.to_string()))?;
        // `null` and `undefined` both arrive without a value.
        let value = result.value().cloned().unwrap_or(serde_json::Value::Null);
        serde_json::from_value(value).map_err(|e| BrowserError::Command(format!("unexpected script result: {e}")))
    }
}

/// JSON string literal, safe to splice into a script.
fn js_str(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&self, url: &str, timeout: Duration) -> BrowserResult<WaitOutcome> {
        self.ensure_alive()?;
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(WaitOutcome::Ready),
            Ok(Err(e)) => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => {
                warn!(url = %url, timeout_ms = timeout.as_millis(), "Navigation timed out");
                Ok(WaitOutcome::TimedOut)
            }
        }
    }

    async fn content(&self) -> BrowserResult<String> {
        self.eval("document.documentElement.outerHTML".to_string()).await
    }

    async fn current_url(&self) -> BrowserResult<String> {
        self.ensure_alive()?;
        let url = self
            .page
            .url()
            .await
            .map_err(|e| BrowserError::Command(e.to_string()))?;
        Ok(url.unwrap_or_default())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> BrowserResult<WaitOutcome> {
        let script = format!("document.querySelector({}) !== null", js_str(selector));
        let deadline = Instant::now() + timeout;
        loop {
            // The execution context can vanish while a page is navigating.
            match self.eval::<bool>(script.clone()).await {
                Ok(true) => return Ok(WaitOutcome::Ready),
                Ok(false) => {}
                Err(BrowserError::Closed) => return Err(BrowserError::Closed),
                Err(e) => debug!(error = %e, "Selector check failed, polling again"),
            }
            if Instant::now() >= deadline {
                return Ok(WaitOutcome::TimedOut);
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now()))).await;
        }
    }

    async fn scroll_by(&self, pixels: i64) -> BrowserResult<()> {
        self.eval::<serde_json::Value>(format!("window.scrollBy(0, {pixels})"))
            .await
            .map(|_| ())
    }

    async fn scroll_to_bottom(&self) -> BrowserResult<()> {
        self.eval::<serde_json::Value>("window.scrollTo(0, document.body.scrollHeight)".to_string())
            .await
            .map(|_| ())
    }

    async fn document_height(&self) -> BrowserResult<u64> {
        self.eval("document.body ? document.body.scrollHeight : 0".to_string()).await
    }

    async fn find_visible(&self, candidates: &[String]) -> BrowserResult<Option<String>> {
        let list = serde_json::to_string(candidates).map_err(|e| BrowserError::Command(e.to_string()))?;
        let script = format!(
            r#"(() => {{
                for (const sel of {list}) {{
                    let el = null;
                    try {{ el = document.querySelector(sel); }} catch (_) {{ continue; }}
                    if (el && (el.offsetParent !== null || el.getClientRects().length > 0)) return sel;
                }}
                return null;
            }})()"#
        );
        self.eval(script).await
    }

    async fn click(&self, selector: &str) -> BrowserResult<()> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.scrollIntoView({{ block: "center" }});
                el.click();
                return true;
            }})()"#,
            sel = js_str(selector)
        );
        if self.eval::<bool>(script).await? {
            Ok(())
        } else {
            Err(BrowserError::Command(format!("no element matches {selector}")))
        }
    }

    async fn first_link(&self, selector: &str) -> BrowserResult<Option<String>> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); return el ? el.getAttribute('href') : null; }})()",
            js_str(selector)
        );
        self.eval(script).await
    }

    async fn close(&self) -> BrowserResult<()> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };
        if let Err(e) = self.page.clone().close().await {
            debug!(error = %e, "Page close failed");
        }
        let result = browser.close().await;
        let _ = browser.wait().await;
        self.handler.abort();
        result.map(|_| ()).map_err(|e| BrowserError::Command(e.to_string()))
    }
}
