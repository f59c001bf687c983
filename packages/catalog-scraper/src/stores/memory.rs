//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::traits::store::ResultStore;
use crate::types::{
    job::{ScrapeBatch, ScrapeJob},
    record::ProductRecord,
    summary::BatchSummary,
};

/// In-memory storage for jobs, batches, results, and summaries.
///
/// Useful for testing and development. Not suitable for production
/// as data is lost on restart.
pub struct MemoryStore {
    jobs: RwLock<HashMap<Uuid, ScrapeJob>>,
    batches: RwLock<HashMap<Uuid, ScrapeBatch>>,
    /// Keyed by job id, in first-save order
    results: RwLock<IndexMap<Uuid, Vec<ProductRecord>>>,
    summaries: RwLock<HashMap<Uuid, BatchSummary>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            batches: RwLock::new(HashMap::new()),
            results: RwLock::new(IndexMap::new()),
            summaries: RwLock::new(HashMap::new()),
        }
    }

    /// Clear all stored data.
    pub fn clear(&self) {
        self.jobs.write().unwrap().clear();
        self.batches.write().unwrap().clear();
        self.results.write().unwrap().clear();
        self.summaries.write().unwrap().clear();
    }

    /// Get the number of stored jobs.
    pub fn job_count(&self) -> usize {
        self.jobs.read().unwrap().len()
    }

    /// Get the number of stored records across all jobs.
    pub fn record_count(&self) -> usize {
        self.results.read().unwrap().values().map(Vec::len).sum()
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn save_job(&self, job: &ScrapeJob) -> Result<()> {
        self.jobs.write().unwrap().insert(job.id, job.clone());
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<ScrapeJob>> {
        Ok(self.jobs.read().unwrap().get(&id).cloned())
    }

    async fn save_batch(&self, batch: &ScrapeBatch) -> Result<()> {
        self.batches.write().unwrap().insert(batch.id, batch.clone());
        Ok(())
    }

    async fn get_batch(&self, id: Uuid) -> Result<Option<ScrapeBatch>> {
        Ok(self.batches.read().unwrap().get(&id).cloned())
    }

    async fn save_results(&self, job_id: Uuid, records: &[ProductRecord]) -> Result<()> {
        self.results.write().unwrap().insert(job_id, records.to_vec());
        Ok(())
    }

    async fn get_results(&self, job_id: Uuid) -> Result<Vec<ProductRecord>> {
        Ok(self
            .results
            .read()
            .unwrap()
            .get(&job_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn batch_records(&self, batch_id: Uuid) -> Result<Vec<ProductRecord>> {
        Ok(self
            .results
            .read()
            .unwrap()
            .values()
            .flatten()
            .filter(|r| r.batch_id == Some(batch_id))
            .cloned()
            .collect())
    }

    async fn save_batch_summary(&self, summary: &BatchSummary) -> Result<()> {
        self.summaries
            .write()
            .unwrap()
            .insert(summary.batch_id, summary.clone());
        Ok(())
    }

    async fn get_batch_summary(&self, batch_id: Uuid) -> Result<Option<BatchSummary>> {
        Ok(self.summaries.read().unwrap().get(&batch_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::record::ExtractedRecord;
    use crate::types::request::{ScrapeRequest, SiteTag};
    use crate::types::summary::BatchStats;
    use chrono::Utc;

    fn record(job_id: Uuid, batch_id: Option<Uuid>, title: &str) -> ProductRecord {
        ProductRecord::new(job_id, batch_id, SiteTag::Dumyah, ExtractedRecord::titled(title))
    }

    #[tokio::test]
    async fn test_job_roundtrip() {
        let store = MemoryStore::new();
        let job = ScrapeJob::new(ScrapeRequest::new("https://dumyah.com/en/toys").unwrap());

        store.save_job(&job).await.unwrap();
        let loaded = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, job.id);
        assert_eq!(store.job_count(), 1);
    }

    #[tokio::test]
    async fn test_results_are_replaced_per_job() {
        let store = MemoryStore::new();
        let job_id = Uuid::now_v7();

        store.save_results(job_id, &[record(job_id, None, "a")]).await.unwrap();
        store
            .save_results(job_id, &[record(job_id, None, "b"), record(job_id, None, "c")])
            .await
            .unwrap();

        let results = store.get_results(job_id).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].record.title.as_deref(), Some("b"));
        assert!(store.get_results(Uuid::now_v7()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_records_span_jobs() {
        let store = MemoryStore::new();
        let batch = Uuid::now_v7();
        let (first, second, other) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());

        store.save_results(first, &[record(first, Some(batch), "a")]).await.unwrap();
        store.save_results(other, &[record(other, None, "x")]).await.unwrap();
        store.save_results(second, &[record(second, Some(batch), "b")]).await.unwrap();

        let titles: Vec<_> = store
            .batch_records(batch)
            .await
            .unwrap()
            .into_iter()
            .filter_map(|r| r.record.title)
            .collect();
        assert_eq!(titles, ["a", "b"]);
    }

    #[tokio::test]
    async fn test_batch_summary_last_writer_wins() {
        let store = MemoryStore::new();
        let batch_id = Uuid::now_v7();
        for narrative in ["first", "second"] {
            store
                .save_batch_summary(&BatchSummary {
                    batch_id,
                    query: "toys".into(),
                    stats: BatchStats::default(),
                    narrative: narrative.into(),
                    duration_secs: None,
                    updated_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        let summary = store.get_batch_summary(batch_id).await.unwrap().unwrap();
        assert_eq!(summary.narrative, "second");
    }
}
