//! Aggregate statistics and batch summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::request::SiteTag;

/// count/avg/min/max/median over one numeric column.
///
/// All values are zero when `count == 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub count: usize,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

impl NumericStats {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Statistics over every record persisted for a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Total records, priced or not
    pub count: usize,

    /// Over records with a positive price
    pub price: NumericStats,

    /// Over records with a rating
    pub rating: NumericStats,

    /// Dominant currency among priced records
    pub currency: Option<String>,

    pub site_counts: BTreeMap<SiteTag, usize>,
    pub site_medians: BTreeMap<SiteTag, f64>,
}

impl BatchStats {
    pub fn has_price(&self) -> bool {
        !self.price.is_empty()
    }

    pub fn has_rating(&self) -> bool {
        !self.rating.is_empty()
    }

    /// Sites that contributed at least one record.
    pub fn sites(&self) -> Vec<SiteTag> {
        self.site_counts.keys().copied().collect()
    }
}

/// Stats plus narrative for one batch. Create-or-update, last writer wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: Uuid,
    pub query: String,
    pub stats: BatchStats,
    pub narrative: String,

    /// Seconds from batch creation to the latest job completion
    pub duration_secs: Option<f64>,

    pub updated_at: DateTime<Utc>,
}
