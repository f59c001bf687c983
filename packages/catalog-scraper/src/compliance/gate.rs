//! The compliance gate: may this URL be fetched at all?

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use super::robots::RobotsTxt;
use crate::traits::robots::RobotsFetcher;
use crate::types::policy::CompliancePolicy;

/// Outcome of a compliance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDecision {
    pub allowed: bool,

    /// `Crawl-delay` the robots document declares for our agent
    pub crawl_delay: Option<Duration>,
}

impl GateDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            crawl_delay: None,
        }
    }
}

/// Decides whether a target may be scraped.
///
/// Fail-open: only an explicit disallow in a successfully retrieved robots
/// document blocks a URL. Network and parse problems are logged and allow.
#[derive(Clone)]
pub struct ComplianceGate {
    fetcher: Arc<dyn RobotsFetcher>,
}

impl ComplianceGate {
    pub fn new(fetcher: Arc<dyn RobotsFetcher>) -> Self {
        Self { fetcher }
    }

    pub async fn may_fetch(&self, url: &Url, policy: &CompliancePolicy) -> bool {
        self.check(url, policy).await.allowed
    }

    /// Like [`may_fetch`](Self::may_fetch), also reporting the crawl delay.
    pub async fn check(&self, url: &Url, policy: &CompliancePolicy) -> GateDecision {
        if !policy.enforced {
            info!(url = %url, "Robots enforcement disabled, proceeding");
            return GateDecision::allow();
        }

        let Some(host) = url.host_str() else {
            warn!(url = %url, "URL has no host, skipping robots check");
            return GateDecision::allow();
        };

        if policy.is_trusted(host) {
            info!(domain = %host, "Trusted domain, skipping robots check");
            return GateDecision::allow();
        }

        let Some(robots_url) = robots_url(url) else {
            warn!(url = %url, "Could not derive robots URL, defaulting to allowed");
            return GateDecision::allow();
        };

        info!(domain = %host, "Checking robots.txt");
        let document = match self.fetcher.fetch(&robots_url).await {
            Ok(Some(document)) => document,
            Ok(None) => return GateDecision::allow(),
            Err(e) => {
                warn!(domain = %host, error = %e, "Could not access robots.txt, defaulting to allowed");
                return GateDecision::allow();
            }
        };

        let robots = RobotsTxt::parse(&document);
        let allowed = robots.is_allowed(&policy.user_agent, &path_and_query(url));
        if !allowed {
            warn!(url = %url, "robots.txt explicitly disallows scraping");
        }
        GateDecision {
            allowed,
            crawl_delay: robots.crawl_delay(&policy.user_agent),
        }
    }
}

/// `https://host:port/robots.txt` for any URL on that origin.
pub fn robots_url(url: &Url) -> Option<String> {
    url.join("/robots.txt").ok().map(String::from)
}

fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}
