//! Job row normalization and upserts.

use crate::error::DatabaseError;
use crate::types::ResultRow;
use crate::{Error, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{Database, JobRecord, JobSink, StoredJob};

impl JobRecord {
    /// Normalize a provider row, taking the first non-blank alias for each column
    pub fn from_row(row: &ResultRow) -> Self {
        let pick = |aliases: &[&str]| aliases.iter().find_map(|key| row.text(key));

        Self {
            title: pick(&["title", "jobTitle", "JobTitle"]),
            job_link: pick(&["jobUrl", "job_link"]),
            company: pick(&["companyName", "company"]),
            company_link: pick(&["companyUrl", "company_link"]),
            location: pick(&["location", "job_location"]),
            post_time: pick(&["post_time", "publishedAt_ts"]),
            applicant_count: pick(&["ApplicationsCount", "applicant_count"]),
            description: pick(&["description", "job_description"]),
            industry: pick(&["industry"]),
            employment_type: pick(&["employment_type", "contractType"]),
            valid_through: pick(&["valid_through"]),
            seniority_level: pick(&["seniority_level", "experienceLevel"]),
            job_function: pick(&["job_function"]),
            hiring_person: pick(&["posterFullName", "hiring_person"]),
            min_pay: pick(&["min_pay"]),
            max_pay: pick(&["max_pay"]),
        }
    }

    /// Natural identity of this job (see [`job_key`])
    pub fn key(&self) -> String {
        job_key(
            self.title.as_deref(),
            self.company.as_deref(),
            self.location.as_deref(),
            self.job_link.as_deref(),
        )
    }
}

/// SHA-256 over the normalized `title|company|location|link`
///
/// Each part is lower-cased and its whitespace collapsed, so cosmetic
/// differences between scrapes map to the same job.
pub fn job_key(
    title: Option<&str>,
    company: Option<&str>,
    location: Option<&str>,
    link: Option<&str>,
) -> String {
    let normalize = |part: Option<&str>| {
        part.unwrap_or_default()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    };

    let identity = format!(
        "{}|{}|{}|{}",
        normalize(title),
        normalize(company),
        normalize(location),
        normalize(link)
    );

    let mut hasher = Sha256::new();
    hasher.update(identity.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl Database {
    /// Insert a job, or refresh the stored one with the same natural key
    ///
    /// Returns the job key.
    pub async fn upsert_job(&self, job: &JobRecord) -> Result<String> {
        if job.title.is_none() && job.job_link.is_none() {
            return Err(Error::InvalidInput(
                "job row has neither a title nor a link".to_string(),
            ));
        }

        let key = job.key();
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO jobs (
                job_key, title, job_link, company, company_link, location, post_time,
                applicant_count, description, industry, employment_type, valid_through,
                seniority_level, job_function, hiring_person, min_pay, max_pay,
                first_seen_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(job_key) DO UPDATE SET
                title = excluded.title,
                company = excluded.company,
                location = excluded.location,
                post_time = excluded.post_time,
                applicant_count = excluded.applicant_count,
                description = excluded.description,
                industry = excluded.industry,
                employment_type = excluded.employment_type,
                seniority_level = excluded.seniority_level,
                job_function = excluded.job_function,
                min_pay = excluded.min_pay,
                max_pay = excluded.max_pay,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&key)
        .bind(&job.title)
        .bind(&job.job_link)
        .bind(&job.company)
        .bind(&job.company_link)
        .bind(&job.location)
        .bind(&job.post_time)
        .bind(&job.applicant_count)
        .bind(&job.description)
        .bind(&job.industry)
        .bind(&job.employment_type)
        .bind(&job.valid_through)
        .bind(&job.seniority_level)
        .bind(&job.job_function)
        .bind(&job.hiring_person)
        .bind(&job.min_pay)
        .bind(&job.max_pay)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to upsert job: {}",
                e
            )))
        })?;

        Ok(key)
    }

    /// Look up a stored job by its natural key
    pub async fn get_job(&self, key: &str) -> Result<Option<StoredJob>> {
        let job = sqlx::query_as::<_, StoredJob>(
            r#"
            SELECT id, job_key, title, job_link, company, location, applicant_count,
                   min_pay, max_pay, first_seen_at, updated_at
            FROM jobs WHERE job_key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get job: {}",
                e
            )))
        })?;

        Ok(job)
    }

    /// Number of stored jobs
    pub async fn count_jobs(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count jobs: {}",
                    e
                )))
            })?;

        Ok(count)
    }
}

#[async_trait]
impl JobSink for Database {
    async fn upsert(&self, row: &ResultRow) -> Result<()> {
        self.upsert_job(&JobRecord::from_row(row)).await.map(|_| ())
    }
}
