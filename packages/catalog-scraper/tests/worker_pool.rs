//! Batches and cancellation through the worker pool.

use std::sync::Arc;

use catalog_scraper::orchestrator::NOTE_CANCELLED;
use catalog_scraper::testing::{listing_page, MockBrowser, MockLauncher, MockTextGenerator, StaticRobotsFetcher};
use catalog_scraper::{
    JobRunner, JobStatus, MemoryStore, OrchestratorConfig, PaginationMode, PaginationSettings, ResultStore,
    ScrapeJob, ScrapeRequest, SiteTag, SummaryAdapter, WorkerPool,
};
use tokio_util::sync::CancellationToken;

fn pool(launcher: MockLauncher, store: Arc<MemoryStore>, summary: SummaryAdapter, jobs: usize) -> WorkerPool {
    let config = OrchestratorConfig::default()
        .with_pagination(PaginationSettings::immediate())
        .with_max_concurrent_jobs(jobs);
    let runner = JobRunner::new(
        config,
        Arc::new(launcher),
        Arc::new(StaticRobotsFetcher::missing()),
        store,
    )
    .with_summary(summary);
    WorkerPool::new(runner)
}

fn request(url: &str) -> ScrapeRequest {
    ScrapeRequest::new(url).unwrap().with_pagination(PaginationMode::NextButton)
}

#[tokio::test]
async fn test_batch_summary_spans_all_jobs() {
    let store = Arc::new(MemoryStore::new());
    let generator = MockTextGenerator::new().with_reply("• 12 wooden toys.\n• Prices near 12 JOD.\n• Dumyah only.");
    let browser = MockBrowser::new(vec![listing_page(1, 3, true), listing_page(2, 3, false)]);
    let pool = pool(
        MockLauncher::new(browser),
        store.clone(),
        SummaryAdapter::new(Arc::new(generator.clone())),
        // One at a time, so the last summary written covers both jobs.
        1,
    );

    let (batch, handles) = pool
        .submit_batch(
            "wooden toys",
            vec![
                request("https://dumyah.com/en/toys"),
                request("https://www.dumyah.com/en/toys?sort=price"),
            ],
        )
        .await
        .unwrap();

    for handle in handles {
        let job = handle.wait().await.unwrap();
        assert_eq!(job.status(), JobStatus::Done);
        assert_eq!(job.note(), "Success! Saved 6 products.");
    }

    let records = store.batch_records(batch.id).await.unwrap();
    assert_eq!(records.len(), 12);
    assert!(records.iter().all(|r| r.site == SiteTag::Dumyah));

    let summary = store.get_batch_summary(batch.id).await.unwrap().unwrap();
    assert_eq!(summary.query, "wooden toys");
    assert_eq!(summary.stats.count, 12);
    assert_eq!(summary.stats.currency.as_deref(), Some("JOD"));
    assert!(summary.narrative.starts_with("- 12 wooden toys."));
    assert!(!summary.narrative.contains('•'));
    assert_eq!(generator.prompts().len(), 2);
}

#[tokio::test]
async fn test_shutdown_mid_job_persists_partial_results() {
    let store = Arc::new(MemoryStore::new());
    let shutdown = CancellationToken::new();
    // The outer token fires while page 1 is being read.
    let browser = MockBrowser::new((1..=4).map(|p| listing_page(p, 5, p < 4)).collect())
        .cancel_after_content_call(1, shutdown.clone());
    let launcher = MockLauncher::new(browser);
    let pool = pool(launcher.clone(), store.clone(), SummaryAdapter::offline(), 2).with_shutdown(shutdown);

    let handle = pool
        .submit(ScrapeJob::new(request("https://dumyah.com/en/toys")))
        .await
        .unwrap();
    let job_id = handle.job_id;

    let job = handle.wait().await.unwrap();
    assert_eq!(job.status(), JobStatus::Error);
    assert_eq!(job.note(), NOTE_CANCELLED);
    assert_eq!(store.get_results(job_id).await.unwrap().len(), 5);
    assert!(launcher.sessions()[0].is_closed());
    assert!(pool.is_shutdown());
    assert_eq!(pool.active_jobs().await, 0);
}
