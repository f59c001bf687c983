//! Bounded pool of job tasks.
//!
//! One task per job, one browser session per task. A semaphore caps how
//! many jobs run at once; each job gets a child of the pool's shutdown
//! token so it can be cancelled alone or with everything else.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::runner::JobRunner;
use crate::error::{Result, ScrapeError};
use crate::types::job::{ScrapeBatch, ScrapeJob};
use crate::types::request::ScrapeRequest;

/// A submitted job's task.
pub struct JobHandle {
    pub job_id: Uuid,
    handle: JoinHandle<Result<ScrapeJob>>,
}

impl JobHandle {
    /// Wait for the job to reach Done or Error.
    pub async fn wait(self) -> Result<ScrapeJob> {
        self.handle
            .await
            .map_err(|e| ScrapeError::Worker(e.to_string()))?
    }
}

pub struct WorkerPool {
    runner: Arc<JobRunner>,
    semaphore: Arc<Semaphore>,
    shutdown: CancellationToken,
    /// Track running jobs for cancellation
    running_jobs: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
}

impl WorkerPool {
    pub fn new(runner: JobRunner) -> Self {
        let permits = runner.config().max_concurrent_jobs.max(1);
        Self {
            runner: Arc::new(runner),
            semaphore: Arc::new(Semaphore::new(permits)),
            shutdown: CancellationToken::new(),
            running_jobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Tie the pool to an outer shutdown token (e.g. the process's).
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn runner(&self) -> &Arc<JobRunner> {
        &self.runner
    }

    /// Persist the job as Pending and schedule it.
    pub async fn submit(&self, job: ScrapeJob) -> Result<JobHandle> {
        self.runner.store().save_job(&job).await?;

        let job_id = job.id;
        let cancel = self.shutdown.child_token();
        self.running_jobs.write().await.insert(job_id, cancel.clone());

        let runner = self.runner.clone();
        let semaphore = self.semaphore.clone();
        let running_jobs = self.running_jobs.clone();

        let handle = tokio::spawn(async move {
            // A job cancelled while queued still runs, so it is recorded
            // as cancelled without launching a browser.
            let permit = tokio::select! {
                permit = semaphore.acquire_owned() => permit.ok(),
                _ = cancel.cancelled() => None,
            };
            debug!(job_id = %job_id, queued = permit.is_none(), "Job dispatched");

            let result = runner.run(job, cancel).await;
            drop(permit);
            running_jobs.write().await.remove(&job_id);
            result
        });

        info!(job_id = %job_id, "Job submitted");
        Ok(JobHandle { job_id, handle })
    }

    /// Create a batch for `query` with one job per request and submit them all.
    pub async fn submit_batch(
        &self,
        query: impl Into<String>,
        requests: Vec<ScrapeRequest>,
    ) -> Result<(ScrapeBatch, Vec<JobHandle>)> {
        let mut batch = ScrapeBatch::new(query);
        let jobs: Vec<ScrapeJob> = requests
            .into_iter()
            .map(|request| ScrapeJob::new(request).in_batch(batch.id))
            .collect();
        batch.job_ids = jobs.iter().map(|j| j.id).collect();
        self.runner.store().save_batch(&batch).await?;
        info!(batch_id = %batch.id, jobs = jobs.len(), "Batch submitted");

        let mut handles = Vec::with_capacity(jobs.len());
        for job in jobs {
            handles.push(self.submit(job).await?);
        }
        Ok((batch, handles))
    }

    /// Cancel one queued or running job. Returns false if it is unknown or
    /// already finished.
    pub async fn cancel(&self, job_id: Uuid) -> bool {
        match self.running_jobs.read().await.get(&job_id) {
            Some(token) => {
                info!(job_id = %job_id, "Cancelling job");
                token.cancel();
                true
            }
            None => {
                warn!(job_id = %job_id, "Cancel requested for unknown or finished job");
                false
            }
        }
    }

    /// Number of jobs queued or running.
    pub async fn active_jobs(&self) -> usize {
        self.running_jobs.read().await.len()
    }

    /// Cancel every job. Cancelled jobs still finish their bookkeeping.
    pub fn shutdown(&self) {
        info!("Shutting down worker pool");
        self.shutdown.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
