//! Database layer for jobpulse
//!
//! Optional SQLite store for collected job rows. Rows are upserted one at a
//! time against a natural identity so that re-running a task group refreshes
//! existing jobs instead of duplicating them.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`jobs`] - Row normalization and job upserts

use crate::error::Result;
use crate::types::{PersistSummary, ResultRow};
use async_trait::async_trait;
use sqlx::{FromRow, sqlite::SqlitePool};

mod jobs;
mod migrations;

pub use jobs::job_key;

/// Destination for collected rows
///
/// Implementations decide how a row is stored; [`persist_rows`] drives a
/// sink over a batch and tallies the outcomes.
#[async_trait]
pub trait JobSink: Send + Sync {
    /// Store or refresh one row
    async fn upsert(&self, row: &ResultRow) -> Result<()>;
}

/// Provider row normalized to the jobs table columns
///
/// Providers and task templates name the same field differently; each column
/// takes the first non-blank value among its known aliases.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobRecord {
    /// Job title
    pub title: Option<String>,
    /// Link to the posting
    pub job_link: Option<String>,
    /// Hiring company
    pub company: Option<String>,
    /// Link to the company page
    pub company_link: Option<String>,
    /// Job location
    pub location: Option<String>,
    /// When the job was posted
    pub post_time: Option<String>,
    /// Number of applicants
    pub applicant_count: Option<String>,
    /// Posting body
    pub description: Option<String>,
    /// Industry
    pub industry: Option<String>,
    /// Contract type
    pub employment_type: Option<String>,
    /// Posting expiry
    pub valid_through: Option<String>,
    /// Seniority level
    pub seniority_level: Option<String>,
    /// Job function
    pub job_function: Option<String>,
    /// Recruiter or poster
    pub hiring_person: Option<String>,
    /// Lower pay bound
    pub min_pay: Option<String>,
    /// Upper pay bound
    pub max_pay: Option<String>,
}

/// Job record from database
#[derive(Debug, Clone, FromRow)]
pub struct StoredJob {
    /// Unique database ID
    pub id: i64,
    /// Natural identity (see [`job_key`])
    pub job_key: String,
    /// Job title
    pub title: Option<String>,
    /// Link to the posting
    pub job_link: Option<String>,
    /// Hiring company
    pub company: Option<String>,
    /// Job location
    pub location: Option<String>,
    /// Number of applicants
    pub applicant_count: Option<String>,
    /// Lower pay bound
    pub min_pay: Option<String>,
    /// Upper pay bound
    pub max_pay: Option<String>,
    /// Unix timestamp of the first upsert
    pub first_seen_at: i64,
    /// Unix timestamp of the latest upsert
    pub updated_at: i64,
}

/// Database handle for jobpulse
pub struct Database {
    pool: SqlitePool,
}

/// Upsert every row into `sink`, counting outcomes
///
/// Failures are logged and counted; they never stop the batch.
pub async fn persist_rows<'a, I>(sink: &dyn JobSink, rows: I) -> PersistSummary
where
    I: IntoIterator<Item = &'a ResultRow>,
{
    let mut summary = PersistSummary::default();
    for row in rows {
        summary.attempted += 1;
        match sink.upsert(row).await {
            Ok(()) => summary.upserted += 1,
            Err(e) => {
                summary.failed += 1;
                tracing::warn!(error = %e, "failed to persist row");
            }
        }
    }

    tracing::info!(
        attempted = summary.attempted,
        upserted = summary.upserted,
        failed = summary.failed,
        "persistence pass complete"
    );
    summary
}
