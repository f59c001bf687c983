//! Click-based pagination: press "next", then wait for the listing to change.

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::error::BrowserResult;
use crate::traits::browser::BrowserSession;
use crate::types::config::PaginationSettings;

/// Result of one click attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// A new page of content is showing.
    Advanced,
    /// No visible next control: the normal end of a listing.
    NoNextControl,
    /// Clicked, but neither the first item nor the URL changed in time.
    NoContentChange,
}

/// Locate the next control, click it, and wait for evidence of new content.
///
/// Evidence is a changed link under `first_item`. If that does not appear
/// within `change_timeout`, a changed document URL still counts as advanced.
pub async fn advance(
    session: &dyn BrowserSession,
    settings: &PaginationSettings,
    first_item: &str,
) -> BrowserResult<ClickOutcome> {
    let Some(selector) = session.find_visible(&settings.next_selectors).await? else {
        info!("No visible next control");
        return Ok(ClickOutcome::NoNextControl);
    };

    let old_url = session.current_url().await?;
    let before = session.first_link(first_item).await?;

    pause(settings.pre_click_settle).await;
    session.click(&selector).await?;
    debug!(selector = %selector, "Clicked next control, waiting for content refresh");

    if wait_for_change(session, first_item, before.as_deref(), settings).await? {
        pause(settings.post_change_settle).await;
        return Ok(ClickOutcome::Advanced);
    }

    if session.current_url().await? != old_url {
        info!("URL changed but first item did not, continuing");
        return Ok(ClickOutcome::Advanced);
    }

    warn!(
        timeout_ms = settings.change_timeout.as_millis() as u64,
        "No URL or content change after clicking next"
    );
    Ok(ClickOutcome::NoContentChange)
}

/// Poll the first item's link until it differs from `before` or time runs out.
async fn wait_for_change(
    session: &dyn BrowserSession,
    first_item: &str,
    before: Option<&str>,
    settings: &PaginationSettings,
) -> BrowserResult<bool> {
    let deadline = Instant::now() + settings.change_timeout;
    loop {
        let current = session.first_link(first_item).await?;
        if current.as_deref() != before {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        pause(settings.change_poll_interval.max(Duration::from_millis(1))).await;
    }
}

pub(crate) async fn pause(duration: Duration) {
    if !duration.is_zero() {
        sleep(duration).await;
    }
}
