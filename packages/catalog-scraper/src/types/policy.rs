//! Compliance policy handed to the gate.

use serde::{Deserialize, Serialize};

/// Domains that skip the remote robots check unless configured otherwise.
pub const DEFAULT_TRUSTED_DOMAINS: [&str; 4] = ["dumyah.com", "matalan.me", "zain.jo", "eshop.jo.zain.com"];

/// User agent presented to robots policies and target sites.
pub const DEFAULT_USER_AGENT: &str = "MyEcommerceBot/1.0";

/// Global enforcement flag plus the trusted-domain allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompliancePolicy {
    /// When false, every URL is allowed without any check.
    pub enforced: bool,

    /// Lowercased domains; a host matches an entry or any subdomain of it.
    pub trusted_domains: Vec<String>,

    pub user_agent: String,
}

impl Default for CompliancePolicy {
    fn default() -> Self {
        Self {
            enforced: true,
            trusted_domains: DEFAULT_TRUSTED_DOMAINS.iter().map(|d| d.to_string()).collect(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl CompliancePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that allows everything.
    pub fn disabled() -> Self {
        Self {
            enforced: false,
            ..Self::default()
        }
    }

    pub fn with_enforced(mut self, enforced: bool) -> Self {
        self.enforced = enforced;
        self
    }

    /// Replace the allow-list.
    pub fn with_trusted_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.trusted_domains = domains
            .into_iter()
            .map(|d| d.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Whether a host is on the allow-list.
    pub fn is_trusted(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_lowercase();
        self.trusted_domains.iter().any(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}
