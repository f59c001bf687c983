//! Robots policy retrieval.

use async_trait::async_trait;

use crate::error::ComplianceError;

/// Fetches a site's robots document.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RobotsFetcher: Send + Sync {
    /// Fetch the document at `robots_url`.
    ///
    /// `Ok(None)` means the site has no policy (e.g. 404), which allows
    /// everything. `Err` means the check could not be completed.
    async fn fetch(&self, robots_url: &str) -> Result<Option<String>, ComplianceError>;
}
