//! HTTP retrieval of robots documents.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::error::ComplianceError;
use crate::traits::robots::RobotsFetcher;
use crate::types::policy::DEFAULT_USER_AGENT;

/// Fetches robots.txt over HTTP with a bounded timeout.
#[derive(Debug, Clone)]
pub struct HttpRobotsFetcher {
    client: Client,
}

impl HttpRobotsFetcher {
    /// Create a fetcher presenting `user_agent`, giving up after `timeout`.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, ComplianceError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| ComplianceError::Http(Box::new(e)))?;
        Ok(Self { client })
    }

    /// Fetcher with the default user agent and a 10 second timeout.
    pub fn with_defaults() -> Result<Self, ComplianceError> {
        Self::new(DEFAULT_USER_AGENT, Duration::from_secs(10))
    }
}

#[async_trait]
impl RobotsFetcher for HttpRobotsFetcher {
    async fn fetch(&self, robots_url: &str) -> Result<Option<String>, ComplianceError> {
        let response = self
            .client
            .get(robots_url)
            .send()
            .await
            .map_err(|e| ComplianceError::Http(Box::new(e)))?;

        let status = response.status();
        if status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|_| ComplianceError::Unreadable {
                    url: robots_url.to_string(),
                })?;
            return Ok(Some(body));
        }

        if status.is_client_error() {
            debug!(url = %robots_url, status = %status, "No robots policy published");
            return Ok(None);
        }

        Err(ComplianceError::Http(
            format!("{robots_url} returned {status}").into(),
        ))
    }
}
