//! Batch narrative generation through an external text generator.

use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::traits::ai::TextGenerator;
use crate::types::request::SiteTag;
use crate::types::summary::BatchStats;

/// Returned instead of a narrative when a batch has no records.
pub const EMPTY_BATCH_NARRATIVE: &str = "No products found to summarize.";

const SUMMARY_PROMPT: &str = r#"You are a concise e-commerce data analyst.
A user has scraped a website for the query "{query}".
Here is a JSON object of the results:

{stats}

Provide a 3-bullet-point summary using a simple circular dot (•) for each point.
DO NOT use asterisks (*), bold text, or special characters other than the bullet point.

Example format:
• Point one regarding inventory.
• Point two regarding pricing.
• Point three regarding market position.

Now, provide the summary for the data above."#;

/// Format the batch summary prompt.
pub fn format_summary_prompt(stats: &BatchStats, query: &str, sites: &[SiteTag]) -> String {
    let price_range = if stats.has_price() {
        json!(format!("{} to {}", stats.price.min, stats.price.max))
    } else {
        json!("N/A")
    };
    let payload = json!({
        "query": query,
        "sites": sites,
        "total_items": stats.count,
        "average_price": stats.has_price().then_some(stats.price.avg),
        "median_price": stats.has_price().then_some(stats.price.median),
        "currency": stats.currency,
        "price_range": price_range,
        "average_rating": stats.has_rating().then_some(stats.rating.avg),
        "items_per_site": stats.site_counts,
    });
    let stats_text = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());

    SUMMARY_PROMPT.replace("{query}", query).replace("{stats}", &stats_text)
}

/// Deterministic narrative built only from the numbers.
pub fn fallback_narrative(stats: &BatchStats) -> String {
    match (stats.has_price(), stats.currency.as_deref()) {
        (true, Some(currency)) => format!(
            "Found {} items, average price {:.2} {}.",
            stats.count, stats.price.avg, currency
        ),
        (true, None) => format!("Found {} items, average price {:.2}.", stats.count, stats.price.avg),
        (false, _) => format!("Found {} items (no price data).", stats.count),
    }
}

/// Turns batch stats into a short narrative.
///
/// Never fails: generator errors and empty replies fall back to
/// [`fallback_narrative`].
#[derive(Clone)]
pub struct SummaryAdapter {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl SummaryAdapter {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    /// An adapter that always uses the numeric fallback.
    pub fn offline() -> Self {
        Self { generator: None }
    }

    pub async fn narrate(&self, stats: &BatchStats, query: &str, sites: &[SiteTag]) -> String {
        if stats.count == 0 {
            return EMPTY_BATCH_NARRATIVE.to_string();
        }

        let Some(generator) = &self.generator else {
            return fallback_narrative(stats);
        };

        let prompt = format_summary_prompt(stats, query, sites);
        match generator.generate(&prompt).await {
            Ok(text) if !text.trim().is_empty() => {
                info!(items = stats.count, "Generated batch narrative");
                text.trim().replace('•', "-")
            }
            Ok(_) => {
                warn!("Summary service returned an empty reply, using fallback");
                fallback_narrative(stats)
            }
            Err(e) => {
                warn!(error = %e, "Summary service failed, using fallback");
                fallback_narrative(stats)
            }
        }
    }
}
