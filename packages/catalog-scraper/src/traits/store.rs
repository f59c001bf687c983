//! Persistence seam for jobs, results, and batch summaries.
//!
//! Writes are keyed by job or batch id and must tolerate concurrent job
//! completion. Batch summaries are create-or-update; the last writer wins.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{
    job::{ScrapeBatch, ScrapeJob},
    record::ProductRecord,
    summary::BatchSummary,
};

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Create or update a job (status, note, retry count).
    async fn save_job(&self, job: &ScrapeJob) -> Result<()>;

    /// Get a job by id.
    async fn get_job(&self, id: Uuid) -> Result<Option<ScrapeJob>>;

    /// Create or update a batch.
    async fn save_batch(&self, batch: &ScrapeBatch) -> Result<()>;

    /// Get a batch by id.
    async fn get_batch(&self, id: Uuid) -> Result<Option<ScrapeBatch>>;

    /// Replace the records persisted for a job.
    async fn save_results(&self, job_id: Uuid, records: &[ProductRecord]) -> Result<()>;

    /// Records persisted for a job, in encounter order.
    async fn get_results(&self, job_id: Uuid) -> Result<Vec<ProductRecord>>;

    /// Every record persisted for any job of a batch.
    async fn batch_records(&self, batch_id: Uuid) -> Result<Vec<ProductRecord>>;

    /// Create or update the summary for a batch.
    async fn save_batch_summary(&self, summary: &BatchSummary) -> Result<()>;

    /// Get the summary for a batch.
    async fn get_batch_summary(&self, batch_id: Uuid) -> Result<Option<BatchSummary>>;
}
