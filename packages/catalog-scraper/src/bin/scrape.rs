use anyhow::{Context, Result};
use catalog_scraper::{
    ChromiumLauncher, Config, Field, HttpRobotsFetcher, JobRunner, JobStatus, MemoryStore,
    PaginationMode, ResultStore, ScrapeJob, ScrapeRequest, SummaryAdapter,
};
use clap::Parser;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Scrape one product listing with a headless browser and print the results as JSON.
#[derive(Debug, Parser)]
#[command(name = "scrape")]
struct Args {
    /// Listing page to scrape
    url: String,

    /// Stop after this many distinct products (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_items: usize,

    /// Stop after this many pages (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_pages: usize,

    /// auto, next-button, infinite-scroll or single-page
    #[arg(long, default_value = "auto")]
    pagination: String,

    /// Comma-separated fields (title,price,currency,image,url,rating)
    #[arg(long, value_delimiter = ',')]
    fields: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,catalog_scraper=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    let fields = args
        .fields
        .iter()
        .map(|f| f.parse::<Field>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Invalid --fields")?;
    let pagination: PaginationMode = args.pagination.parse().context("Invalid --pagination")?;
    let request = ScrapeRequest::new(&args.url)
        .context("Invalid target URL")?
        .with_max_items(args.max_items)
        .with_max_pages(args.max_pages)
        .with_pagination(pagination)
        .with_fields(fields);

    let robots = HttpRobotsFetcher::new(&config.user_agent, Duration::from_secs(10))
        .context("Failed to build robots fetcher")?;
    let store = Arc::new(MemoryStore::new());
    let runner = JobRunner::new(
        config.orchestrator(),
        Arc::new(ChromiumLauncher::from_config(&config)),
        Arc::new(robots),
        store.clone(),
    )
    .with_summary(summary_adapter(&config));

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling job");
            ctrl_c.cancel();
        }
    });

    let job = runner
        .run(ScrapeJob::new(request), cancel)
        .await
        .context("Scrape job failed")?;

    let records = store.get_results(job.id).await.context("Failed to read results")?;
    let summary = store
        .get_batch_summary(job.id)
        .await
        .context("Failed to read summary")?;

    let output = json!({
        "job": job.status_record(),
        "records": records.iter().map(|r| &r.record).collect::<Vec<_>>(),
        "summary": summary,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    if job.status() != JobStatus::Done {
        anyhow::bail!("{}", job.note());
    }
    Ok(())
}

#[cfg(feature = "openai")]
fn summary_adapter(config: &Config) -> SummaryAdapter {
    match catalog_scraper::OpenAiTextGenerator::from_config(config) {
        Ok(generator) => SummaryAdapter::new(Arc::new(generator)),
        Err(e) => {
            tracing::info!(reason = %e, "Narratives use the numeric fallback");
            SummaryAdapter::offline()
        }
    }
}

#[cfg(not(feature = "openai"))]
fn summary_adapter(_config: &Config) -> SummaryAdapter {
    SummaryAdapter::offline()
}
