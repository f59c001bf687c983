//! Browser-Driven Product Catalog Scraping
//!
//! Collects product records from retail listing pages by driving a real
//! browser session, recognizing the page layout, paginating, and merging
//! pages into one deduplicated result set per job.
//!
//! # Usage
//!
//! ```rust,ignore
//! use catalog_scraper::{JobRunner, MemoryStore, OrchestratorConfig, ScrapeJob, ScrapeRequest};
//! use catalog_scraper::{ChromiumLauncher, HttpRobotsFetcher};
//!
//! let runner = JobRunner::new(
//!     OrchestratorConfig::default(),
//!     Arc::new(ChromiumLauncher::new("./user_data")),
//!     Arc::new(HttpRobotsFetcher::with_defaults()?),
//!     Arc::new(MemoryStore::new()),
//! );
//!
//! let request = ScrapeRequest::new("https://dumyah.com/en/toys")?.with_max_items(10);
//! let job = runner.run(ScrapeJob::new(request), CancellationToken::new()).await?;
//! ```
//!
//! # Modules
//!
//! - [`compliance`] - robots.txt parsing and the trusted-domain gate
//! - [`layout`] - layout signatures, detection, and per-domain profiles
//! - [`pagination`] - click and infinite-scroll pagination over a session
//! - [`dedup`] - normalization and cross-page deduplication
//! - [`stats`] / [`summary`] - batch aggregates and narratives
//! - [`orchestrator`] - job lifecycle, retries, and the worker pool
//! - [`stores`] - storage implementations (MemoryStore)
//! - [`testing`] - scripted browsers and generators for tests

pub mod compliance;
pub mod config;
pub mod dedup;
pub mod error;
pub mod layout;
pub mod orchestrator;
pub mod pagination;
pub mod stats;
pub mod stores;
pub mod summary;
pub mod testing;
pub mod traits;
pub mod types;

#[cfg(feature = "openai")]
pub mod ai;

#[cfg(feature = "chromium")]
pub mod browser;

// Re-export core types at crate root
pub use config::{Config, SecretString};
pub use error::{
    AiError, BrowserError, ComplianceError, ConfigError, ErrorKind, LayoutError, Result, ScrapeError,
};
pub use traits::{
    ai::{SelectorAdvisor, TextGenerator},
    browser::{BrowserLauncher, BrowserSession, WaitOutcome},
    robots::RobotsFetcher,
    store::ResultStore,
};
pub use types::{
    config::{LayoutCacheConfig, OrchestratorConfig, PaginationSettings},
    job::{JobStatus, JobStatusRecord, ScrapeBatch, ScrapeJob},
    layout::{FieldRules, LayoutProfile, ProfileSource},
    policy::CompliancePolicy,
    record::{ExtractedRecord, ProductRecord, ResultSet},
    request::{Field, PaginationMode, ScrapeRequest, SiteTag},
    summary::{BatchStats, BatchSummary, NumericStats},
};

pub use compliance::{ComplianceGate, GateDecision, HttpRobotsFetcher, RobotsTxt};
pub use dedup::Deduplicator;
pub use layout::{AiSelectorAdvisor, LayoutCache, LayoutDetector, PageExtractor, SignatureRegistry};
pub use orchestrator::{JobHandle, JobRunner, WorkerPool};
pub use pagination::{Collection, PaginationDriver, StopReason};
pub use stores::MemoryStore;
pub use summary::SummaryAdapter;

#[cfg(feature = "openai")]
pub use ai::OpenAiTextGenerator;

#[cfg(feature = "chromium")]
pub use browser::{ChromiumLauncher, ChromiumSession};
