//! One job, start to finish: gate, browser, pagination, persistence, summary.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::unbounded_channel;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::compliance::ComplianceGate;
use crate::dedup::Deduplicator;
use crate::error::{ErrorKind, Result, ScrapeError};
use crate::layout::{LayoutCache, LayoutDetector, PageExtractor, SignatureRegistry};
use crate::pagination::{Collection, Interrupted, PaginationDriver};
use crate::summary::SummaryAdapter;
use crate::traits::ai::SelectorAdvisor;
use crate::traits::browser::{BrowserLauncher, BrowserSession};
use crate::traits::robots::RobotsFetcher;
use crate::traits::store::ResultStore;
use crate::types::config::OrchestratorConfig;
use crate::types::job::ScrapeJob;
use crate::types::record::{ProductRecord, ResultSet};
use crate::types::request::ScrapeRequest;
use crate::types::summary::{BatchStats, BatchSummary};

pub const NOTE_INITIALIZING: &str = "Initializing scraper & checking policies...";
pub const NOTE_ANALYZING: &str = "Generating market analysis...";
pub const NOTE_CANCELLED: &str = "Cancelled: job aborted before completion";

/// Why one attempt failed, with whatever it had collected.
struct AttemptFailure {
    error: ScrapeError,
    partial: ResultSet,
}

impl From<ScrapeError> for AttemptFailure {
    fn from(error: ScrapeError) -> Self {
        Self {
            error,
            partial: ResultSet::new(),
        }
    }
}

/// Drives a [`ScrapeJob`] through its state machine.
///
/// ```text
/// Running ─► compliance gate ─► launch ─► paginate ─► dedup ─► persist ─► summary ─► Done
///    ▲                                                                      │
///    └──────────────── retry (driver failures, with backoff) ◄── Error ◄────┘
/// ```
///
/// Every attempt that launches a browser closes it, whatever the outcome.
pub struct JobRunner {
    config: OrchestratorConfig,
    launcher: Arc<dyn BrowserLauncher>,
    gate: ComplianceGate,
    driver: PaginationDriver,
    store: Arc<dyn ResultStore>,
    summary: SummaryAdapter,
}

impl JobRunner {
    pub fn new(
        config: OrchestratorConfig,
        launcher: Arc<dyn BrowserLauncher>,
        robots: Arc<dyn RobotsFetcher>,
        store: Arc<dyn ResultStore>,
    ) -> Self {
        let detector = LayoutDetector::new(SignatureRegistry::builtin())
            .with_fallback_currency(config.fallback_currency.clone());
        let cache = Arc::new(LayoutCache::from_config(&config.layout_cache));
        let driver = PaginationDriver::new(config.pagination.clone(), PageExtractor::new(detector, cache));

        Self {
            gate: ComplianceGate::new(robots),
            driver,
            launcher,
            store,
            summary: SummaryAdapter::offline(),
            config,
        }
    }

    /// Use a text generator for batch narratives.
    pub fn with_summary(mut self, summary: SummaryAdapter) -> Self {
        self.summary = summary;
        self
    }

    /// Ask an advisor for selectors when no known layout matches.
    pub fn with_advisor(mut self, advisor: Arc<dyn SelectorAdvisor>) -> Self {
        let extractor = self.driver.extractor().clone().with_advisor(advisor);
        self.driver = self.driver.with_extractor(extractor);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ResultStore> {
        &self.store
    }

    /// Profiles learned so far (shared across jobs when configured).
    pub fn layout_cache(&self) -> &Arc<LayoutCache> {
        self.driver.extractor().cache()
    }

    /// Run a pending job to Done or Error and return its final state.
    ///
    /// Job failures are recorded on the job, not returned. `Err` means the
    /// job could not be started or its state could not be persisted.
    pub async fn run(&self, mut job: ScrapeJob, cancel: CancellationToken) -> Result<ScrapeJob> {
        job.start(NOTE_INITIALIZING)?;
        self.store.save_job(&job).await?;
        info!(job_id = %job.id, url = %job.request().target_url(), "Job started");

        loop {
            let failure = match self.attempt(&mut job, &cancel).await {
                Ok(results) => {
                    self.finish(&mut job, results).await?;
                    return Ok(job);
                }
                Err(failure) => failure,
            };

            let AttemptFailure { error, partial } = failure;
            job.fail(error.kind(), failure_note(&error))?;

            if job.can_retry(self.config.max_retries) && !cancel.is_cancelled() {
                let attempt = job.retry_count() + 1;
                let delay = self.config.backoff_for(attempt);
                warn!(
                    job_id = %job.id,
                    error = %error,
                    attempt,
                    max_retries = self.config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Attempt failed, retrying after backoff"
                );
                self.store.save_job(&job).await?;

                tokio::select! {
                    _ = cancel.cancelled() => {
                        job.set_note(NOTE_CANCELLED);
                        self.store.save_job(&job).await?;
                        info!(job_id = %job.id, "Job cancelled during backoff");
                        return Ok(job);
                    }
                    _ = tokio::time::sleep(delay) => {}
                }

                job.retry(
                    self.config.max_retries,
                    format!("Retrying ({attempt}/{})...", self.config.max_retries),
                )?;
                self.store.save_job(&job).await?;
                continue;
            }

            error!(job_id = %job.id, error = %error, retries = job.retry_count(), "Job failed");
            if !partial.is_empty() && !matches!(error, ScrapeError::PolicyBlocked { .. }) {
                info!(job_id = %job.id, items = partial.len(), "Persisting partial results");
                let records = self.product_records(&job, partial);
                if let Err(e) = self.store.save_results(job.id, &records).await {
                    warn!(job_id = %job.id, error = %e, "Failed to persist partial results");
                }
            }
            self.store.save_job(&job).await?;
            return Ok(job);
        }
    }

    /// One Running attempt. The browser, once launched, is always closed.
    async fn attempt(
        &self,
        job: &mut ScrapeJob,
        cancel: &CancellationToken,
    ) -> std::result::Result<ResultSet, AttemptFailure> {
        let request = job.request().clone();
        if cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled.into());
        }

        let decision = self.gate.check(request.target_url(), &self.config.policy).await;
        if !decision.allowed {
            return Err(ScrapeError::PolicyBlocked {
                url: request.target_url().to_string(),
            }
            .into());
        }

        let session = self
            .launcher
            .launch(&request.domain())
            .await
            .map_err(ScrapeError::from)?;
        debug!(job_id = %job.id, domain = %request.domain(), "Browser session acquired");

        let outcome = self
            .collect(job, session.as_ref(), &request, decision.crawl_delay, cancel)
            .await;

        if let Err(e) = session.close().await {
            warn!(job_id = %job.id, error = %e, "Failed to close browser session");
        }

        match outcome {
            Ok(collection) => {
                let results = Deduplicator::reduce(collection.pages, request.max_items());
                if results.is_empty() && collection.first_page_timed_out {
                    return Err(ScrapeError::NoDataFound {
                        url: request.target_url().to_string(),
                    }
                    .into());
                }
                Ok(results)
            }
            Err(Interrupted { error, pages }) => Err(AttemptFailure {
                error,
                partial: Deduplicator::reduce(pages, request.max_items()),
            }),
        }
    }

    /// Paginate while mirroring page progress into the job note.
    async fn collect(
        &self,
        job: &mut ScrapeJob,
        session: &dyn BrowserSession,
        request: &ScrapeRequest,
        crawl_delay: Option<Duration>,
        cancel: &CancellationToken,
    ) -> std::result::Result<Collection, Interrupted> {
        let mut driver = self.driver.clone();
        if !self.config.layout_cache.share_across_jobs {
            let cache = Arc::new(LayoutCache::from_config(&self.config.layout_cache));
            driver = driver.with_extractor(driver.extractor().with_cache(cache));
        }
        if let Some(delay) = crawl_delay {
            info!(job_id = %job.id, delay_ms = delay.as_millis() as u64, "Honoring robots crawl delay");
            driver = driver.with_crawl_delay(delay);
        }

        let (progress, mut pages) = unbounded_channel();
        let collect = driver.collect(session, request, cancel, Some(progress));
        let notes = async {
            while let Some(page) = pages.recv().await {
                job.set_note(format!("Collecting page {page}..."));
                if let Err(e) = self.store.save_job(job).await {
                    warn!(job_id = %job.id, error = %e, "Failed to save progress note");
                }
            }
        };

        let (outcome, ()) = tokio::join!(collect, notes);
        outcome
    }

    /// Persist results, refresh the batch summary, and mark the job Done.
    async fn finish(&self, job: &mut ScrapeJob, results: ResultSet) -> Result<()> {
        let count = results.len();
        let records = self.product_records(job, results);

        if let Err(e) = self.store.save_results(job.id, &records).await {
            error!(job_id = %job.id, error = %e, "Failed to persist results");
            job.fail(ErrorKind::NonRetryable, failure_note(&e))?;
            return self.store.save_job(job).await;
        }

        job.set_note(NOTE_ANALYZING);
        self.store.save_job(job).await?;
        if let Err(e) = self.refresh_summary(job, &records).await {
            warn!(job_id = %job.id, error = %e, "Failed to update batch summary");
        }

        job.complete(format!("Success! Saved {count} products."))?;
        self.store.save_job(job).await?;
        info!(job_id = %job.id, items = count, "Job completed");
        Ok(())
    }

    /// Recompute stats and narrative for the job's batch (a standalone job
    /// is a batch of one). Last writer wins.
    async fn refresh_summary(&self, job: &ScrapeJob, records: &[ProductRecord]) -> Result<()> {
        let (batch_id, query, started, records) = match job.batch_id {
            Some(batch_id) => {
                let batch = self.store.get_batch(batch_id).await?;
                let records = self.store.batch_records(batch_id).await?;
                let query = batch
                    .as_ref()
                    .map(|b| b.query.clone())
                    .unwrap_or_else(|| job.request().target_url().to_string());
                let started = batch.map(|b| b.created_at).unwrap_or(job.created_at);
                (batch_id, query, started, records)
            }
            None => (
                job.id,
                job.request().target_url().to_string(),
                job.created_at,
                records.to_vec(),
            ),
        };

        let stats = BatchStats::compute(&records);
        let narrative = self.summary.narrate(&stats, &query, &stats.sites()).await;
        let now = Utc::now();
        let duration_secs = (now - started).num_milliseconds().max(0) as f64 / 1000.0;

        self.store
            .save_batch_summary(&BatchSummary {
                batch_id,
                query,
                stats,
                narrative,
                duration_secs: Some(duration_secs),
                updated_at: now,
            })
            .await
    }

    fn product_records(&self, job: &ScrapeJob, results: ResultSet) -> Vec<ProductRecord> {
        results
            .into_records()
            .into_iter()
            .map(|record| ProductRecord::new(job.id, job.batch_id, job.site, record))
            .collect()
    }
}

/// Human-readable note for a failed attempt.
fn failure_note(error: &ScrapeError) -> String {
    match error {
        ScrapeError::PolicyBlocked { .. } => format!("Policy Block: {error}"),
        ScrapeError::Cancelled => NOTE_CANCELLED.to_string(),
        _ => format!("Error: {error}"),
    }
}
