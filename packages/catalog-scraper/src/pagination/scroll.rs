//! Scroll-based pagination for infinite listings.

use tracing::{debug, info};

use super::click::pause;
use crate::error::BrowserResult;
use crate::traits::browser::BrowserSession;
use crate::types::config::PaginationSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOutcome {
    /// The document grew; counts as one page.
    Grew,
    /// Height stayed flat for the configured number of attempts, or the
    /// round budget ran out.
    EndOfScroll,
}

/// Tracks document height across scroll rounds within one job.
#[derive(Debug, Clone, Default)]
pub struct ScrollTracker {
    last_height: u64,
    rounds: usize,
}

impl ScrollTracker {
    /// Start tracking from the current document height.
    pub async fn start(session: &dyn BrowserSession) -> BrowserResult<Self> {
        Ok(Self {
            last_height: session.document_height().await?,
            rounds: 0,
        })
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Scroll to the bottom until the height grows or stays flat
    /// `unchanged_height_limit` times in a row.
    pub async fn advance(
        &mut self,
        session: &dyn BrowserSession,
        settings: &PaginationSettings,
    ) -> BrowserResult<ScrollOutcome> {
        let mut unchanged = 0;

        while unchanged < settings.unchanged_height_limit {
            if self.rounds >= settings.max_scroll_rounds {
                info!(rounds = self.rounds, "Scroll round budget exhausted");
                return Ok(ScrollOutcome::EndOfScroll);
            }
            self.rounds += 1;

            session.scroll_to_bottom().await?;
            pause(settings.scroll_settle).await;
            let height = session.document_height().await?;

            if height > self.last_height {
                debug!(from = self.last_height, to = height, "Document grew");
                self.last_height = height;
                return Ok(ScrollOutcome::Grew);
            }

            unchanged += 1;
            debug!(height, unchanged, "Document height unchanged");
        }

        info!(height = self.last_height, "Reached bottom of listing");
        Ok(ScrollOutcome::EndOfScroll)
    }
}
