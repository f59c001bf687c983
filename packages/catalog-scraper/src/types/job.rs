//! Scrape job model and its state machine.
//!
//! ```text
//! Pending ──start──► Running ──complete──► Done
//!                      │  ▲
//!                 fail │  │ retry (retryable kinds, bounded)
//!                      ▼  │
//!                     Error
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::request::{ScrapeRequest, SiteTag};
use crate::error::{ErrorKind, Result, ScrapeError};

/// Maximum length of a job note, in characters.
pub const NOTE_MAX_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Done,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

/// One scrape request plus its mutable execution state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeJob {
    pub id: Uuid,
    pub batch_id: Option<Uuid>,
    pub site: SiteTag,
    request: ScrapeRequest,
    status: JobStatus,
    note: String,
    retry_count: u32,
    error_kind: Option<ErrorKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScrapeJob {
    /// Create a pending job for a request.
    pub fn new(request: ScrapeRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            batch_id: None,
            site: request.site(),
            request,
            status: JobStatus::Pending,
            note: String::new(),
            retry_count: 0,
            error_kind: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach the job to a batch.
    pub fn in_batch(mut self, batch_id: Uuid) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    pub fn request(&self) -> &ScrapeRequest {
        &self.request
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error_kind
    }

    /// Record a milestone without changing state.
    pub fn set_note(&mut self, note: impl AsRef<str>) {
        self.note = truncate_note(note.as_ref());
        self.updated_at = Utc::now();
    }

    /// Pending → Running.
    pub fn start(&mut self, note: impl AsRef<str>) -> Result<()> {
        self.transition(JobStatus::Pending, JobStatus::Running)?;
        self.set_note(note);
        Ok(())
    }

    /// Whether an Error → Running retry is allowed under `max_retries`.
    pub fn can_retry(&self, max_retries: u32) -> bool {
        self.status == JobStatus::Error
            && self.error_kind.is_some_and(|k| k.should_retry())
            && self.retry_count < max_retries
    }

    /// Error → Running, consuming one unit of the retry budget.
    pub fn retry(&mut self, max_retries: u32, note: impl AsRef<str>) -> Result<()> {
        if !self.can_retry(max_retries) {
            return Err(ScrapeError::InvalidTransition {
                from: self.status,
                to: JobStatus::Running,
            });
        }
        self.status = JobStatus::Running;
        self.retry_count += 1;
        self.error_kind = None;
        self.set_note(note);
        Ok(())
    }

    /// Running → Done.
    pub fn complete(&mut self, note: impl AsRef<str>) -> Result<()> {
        self.transition(JobStatus::Running, JobStatus::Done)?;
        self.set_note(note);
        Ok(())
    }

    /// Running → Error.
    pub fn fail(&mut self, kind: ErrorKind, note: impl AsRef<str>) -> Result<()> {
        self.transition(JobStatus::Running, JobStatus::Error)?;
        self.error_kind = Some(kind);
        self.set_note(note);
        Ok(())
    }

    /// Status view handed to the CRUD layer.
    pub fn status_record(&self) -> JobStatusRecord {
        JobStatusRecord {
            id: self.id,
            status: self.status,
            note: self.note.clone(),
        }
    }

    fn transition(&mut self, from: JobStatus, to: JobStatus) -> Result<()> {
        if self.status != from {
            return Err(ScrapeError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// `{status, note}` pair exposed to external readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusRecord {
    pub id: Uuid,
    pub status: JobStatus,
    pub note: String,
}

/// A group of jobs submitted together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeBatch {
    pub id: Uuid,
    pub query: String,
    pub job_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl ScrapeBatch {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            query: query.into(),
            job_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Truncate a note to [`NOTE_MAX_CHARS`] on a character boundary.
pub fn truncate_note(note: &str) -> String {
    let note = note.trim();
    match note.char_indices().nth(NOTE_MAX_CHARS) {
        Some((idx, _)) => note[..idx].to_string(),
        None => note.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> ScrapeJob {
        ScrapeJob::new(ScrapeRequest::new("https://dumyah.com/en/toys").unwrap())
    }

    #[test]
    fn test_happy_path() {
        let mut job = job();
        assert_eq!(job.status(), JobStatus::Pending);
        assert_eq!(job.site, SiteTag::Dumyah);

        job.start("Initializing").unwrap();
        assert_eq!(job.status(), JobStatus::Running);

        job.complete("Success! Saved 3 products.").unwrap();
        assert_eq!(job.status(), JobStatus::Done);
        assert!(job.status().is_terminal());
    }

    #[test]
    fn test_transitions_are_one_directional() {
        let mut job = job();
        assert!(job.complete("too early").is_err());

        job.start("go").unwrap();
        job.complete("done").unwrap();
        assert!(job.start("again").is_err());
        assert!(job.fail(ErrorKind::Retryable, "late").is_err());
    }

    #[test]
    fn test_retry_budget() {
        let mut job = job();
        job.start("go").unwrap();

        for attempt in 1..=3 {
            job.fail(ErrorKind::Retryable, "driver crashed").unwrap();
            assert!(job.can_retry(3));
            job.retry(3, format!("Retrying ({attempt}/3)")).unwrap();
            assert_eq!(job.retry_count(), attempt);
        }

        job.fail(ErrorKind::Retryable, "driver crashed").unwrap();
        assert!(!job.can_retry(3));
        assert!(job.retry(3, "one more").is_err());
        assert_eq!(job.status(), JobStatus::Error);
    }

    #[test]
    fn test_non_retryable_is_terminal() {
        let mut job = job();
        job.start("go").unwrap();
        job.fail(ErrorKind::NonRetryable, "Policy Block").unwrap();
        assert!(!job.can_retry(3));
        assert!(job.retry(3, "nope").is_err());
    }

    #[test]
    fn test_note_is_truncated_on_char_boundary() {
        let mut job = job();
        let long = "é".repeat(NOTE_MAX_CHARS + 20);
        job.set_note(&long);
        assert_eq!(job.note().chars().count(), NOTE_MAX_CHARS);

        job.set_note("  short  ");
        assert_eq!(job.note(), "short");
    }
}
