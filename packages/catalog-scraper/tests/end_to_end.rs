//! Full job runs against scripted browser sessions.

use std::sync::Arc;
use std::time::Duration;

use catalog_scraper::testing::{listing_page, MockBrowser, MockLauncher, MockTextGenerator, StaticRobotsFetcher};
use catalog_scraper::{
    CompliancePolicy, ErrorKind, Field, JobRunner, JobStatus, MemoryStore, OrchestratorConfig, PaginationMode,
    PaginationSettings, ResultStore, ScrapeJob, ScrapeRequest, SummaryAdapter,
};
use tokio_util::sync::CancellationToken;

fn config() -> OrchestratorConfig {
    OrchestratorConfig::default()
        .with_pagination(PaginationSettings::immediate())
        .with_retry_backoff(Duration::ZERO)
}

#[tokio::test]
async fn test_dumyah_listing_truncated_to_max_items() {
    let store = Arc::new(MemoryStore::new());
    let robots = StaticRobotsFetcher::missing();
    let launcher = MockLauncher::new(MockBrowser::new(vec![listing_page(1, 15, false)]));
    let runner = JobRunner::new(config(), Arc::new(launcher.clone()), Arc::new(robots.clone()), store.clone());

    let request = ScrapeRequest::new("https://dumyah.com/en/toys")
        .unwrap()
        .with_max_items(10)
        .with_max_pages(1)
        .with_fields([Field::Title, Field::Price]);
    let job = runner.run(ScrapeJob::new(request), CancellationToken::new()).await.unwrap();

    assert_eq!(job.status(), JobStatus::Done);
    assert!(job.note().contains("10"));

    let records = store.get_results(job.id).await.unwrap();
    assert_eq!(records.len(), 10);
    for product in &records {
        assert!(product.record.title.as_deref().is_some_and(|t| t.starts_with("Wooden Puzzle Set")));
        assert!(product.record.price.is_some());
        assert!(product.record.image_url.is_none());
    }
    assert_eq!(records[0].record.price, Some(11.5));
    assert_eq!(records[0].record.currency.as_deref(), Some("JOD"));

    // Trusted domain: no robots lookup at all.
    assert!(robots.fetched().is_empty());
    assert_eq!(launcher.domains(), vec!["dumyah.com".to_string()]);
}

#[tokio::test]
async fn test_robots_disallow_blocks_without_retry() {
    let store = Arc::new(MemoryStore::new());
    let robots = StaticRobotsFetcher::new("User-agent: *\nDisallow: /private/\n");
    let launcher = MockLauncher::new(MockBrowser::new(vec![listing_page(1, 5, false)]));
    let runner = JobRunner::new(config(), Arc::new(launcher.clone()), Arc::new(robots.clone()), store.clone());

    let request = ScrapeRequest::new("https://shop.example/private/toys").unwrap();
    let job = runner.run(ScrapeJob::new(request), CancellationToken::new()).await.unwrap();

    assert_eq!(job.status(), JobStatus::Error);
    assert!(job.note().starts_with("Policy Block:"));
    assert_eq!(job.error_kind(), Some(ErrorKind::NonRetryable));
    assert_eq!(job.retry_count(), 0);
    assert!(store.get_results(job.id).await.unwrap().is_empty());
    assert_eq!(robots.fetched(), vec!["https://shop.example/robots.txt".to_string()]);
    assert_eq!(launcher.launches(), 0);
}

#[tokio::test]
async fn test_unreachable_robots_fails_open() {
    let store = Arc::new(MemoryStore::new());
    let launcher = MockLauncher::new(MockBrowser::new(vec![listing_page(1, 5, false)]));
    let runner = JobRunner::new(
        config(),
        Arc::new(launcher.clone()),
        Arc::new(StaticRobotsFetcher::unreachable()),
        store.clone(),
    );

    let request = ScrapeRequest::new("https://shop.example/toys")
        .unwrap()
        .with_pagination(PaginationMode::SinglePage);
    let job = runner.run(ScrapeJob::new(request), CancellationToken::new()).await.unwrap();

    assert_eq!(job.status(), JobStatus::Done);
    assert_eq!(store.get_results(job.id).await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_disabled_policy_skips_robots() {
    let store = Arc::new(MemoryStore::new());
    let robots = StaticRobotsFetcher::new("User-agent: *\nDisallow: /\n");
    let launcher = MockLauncher::new(MockBrowser::new(vec![listing_page(1, 3, false)]));
    let runner = JobRunner::new(
        config().with_policy(CompliancePolicy::disabled()),
        Arc::new(launcher),
        Arc::new(robots.clone()),
        store.clone(),
    );

    let request = ScrapeRequest::new("https://shop.example/toys").unwrap();
    let job = runner.run(ScrapeJob::new(request), CancellationToken::new()).await.unwrap();

    assert_eq!(job.status(), JobStatus::Done);
    assert!(robots.fetched().is_empty());
}

#[tokio::test]
async fn test_click_pagination_stops_at_two_pages() {
    let store = Arc::new(MemoryStore::new());
    let pages = (1..=5).map(|p| listing_page(p, 4, true)).collect();
    let launcher = MockLauncher::new(MockBrowser::new(pages));
    let runner = JobRunner::new(
        config(),
        Arc::new(launcher.clone()),
        Arc::new(StaticRobotsFetcher::missing()),
        store.clone(),
    );

    let request = ScrapeRequest::new("https://dumyah.com/en/toys")
        .unwrap()
        .with_max_pages(2)
        .with_pagination(PaginationMode::NextButton);
    let job = runner.run(ScrapeJob::new(request), CancellationToken::new()).await.unwrap();

    assert_eq!(job.status(), JobStatus::Done);
    assert_eq!(store.get_results(job.id).await.unwrap().len(), 8);
    assert_eq!(launcher.sessions()[0].content_calls(), 2);
    assert!(launcher.sessions()[0].is_closed());
}

#[tokio::test]
async fn test_exhausted_retries_keep_error_note() {
    let store = Arc::new(MemoryStore::new());
    let launcher = MockLauncher::new(MockBrowser::new(vec![listing_page(1, 4, false)])).fail_first(usize::MAX);
    let runner = JobRunner::new(
        config().with_max_retries(2),
        Arc::new(launcher.clone()),
        Arc::new(StaticRobotsFetcher::missing()),
        store.clone(),
    );

    let request = ScrapeRequest::new("https://dumyah.com/en/toys").unwrap();
    let job = runner.run(ScrapeJob::new(request), CancellationToken::new()).await.unwrap();

    assert_eq!(job.status(), JobStatus::Error);
    assert_eq!(job.retry_count(), 2);
    assert_eq!(launcher.launches(), 3);
    assert_eq!(job.error_kind(), Some(ErrorKind::Retryable));

    let stored = store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status(), JobStatus::Error);
    assert_eq!(stored.note(), job.note());
}

#[tokio::test]
async fn test_summary_generator_failure_still_completes() {
    let store = Arc::new(MemoryStore::new());
    let launcher = MockLauncher::new(MockBrowser::new(vec![listing_page(1, 2, false)]));
    let runner = JobRunner::new(
        config(),
        Arc::new(launcher),
        Arc::new(StaticRobotsFetcher::missing()),
        store.clone(),
    )
    .with_summary(SummaryAdapter::new(Arc::new(MockTextGenerator::new().failing())));

    let request = ScrapeRequest::new("https://dumyah.com/en/toys").unwrap();
    let job = runner.run(ScrapeJob::new(request), CancellationToken::new()).await.unwrap();

    assert_eq!(job.status(), JobStatus::Done);
    let summary = store.get_batch_summary(job.id).await.unwrap().unwrap();
    assert_eq!(summary.narrative, "Found 2 items, average price 12.00 JOD.");
}
