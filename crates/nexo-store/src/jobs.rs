//! PostgreSQL job store implementation.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use nexo_core::{Error, JobKind, JobRecord, JobStore, NewJob, Result};

const JOB_COLUMNS: &str = "uid, fingerprint, kind, spec, status, error, result, \
                           created_at, started_at, completed_at";

/// PostgreSQL implementation of [`JobStore`].
///
/// Dedup atomicity is per fingerprint via a conditional insert; claims use
/// `FOR UPDATE SKIP LOCKED` so unrelated jobs never serialize on a global
/// lock.
#[derive(Clone)]
pub struct PgJobStore {
    pool: Pool<Postgres>,
}

impl PgJobStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_job_row(row: sqlx::postgres::PgRow) -> Result<JobRecord> {
        let kind: String = row.get("kind");
        let status: String = row.get("status");
        Ok(JobRecord {
            uid: row.get("uid"),
            fingerprint: row.get("fingerprint"),
            kind: kind.parse()?,
            spec: row.get("spec"),
            status: status.parse()?,
            error: row.get("error"),
            result: row.get("result"),
            created_at: row.get("created_at"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
        })
    }

    async fn get_by_fingerprint(&self, fingerprint: &str) -> Result<Option<JobRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE fingerprint = $1"
        ))
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_job_row).transpose()
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn find_or_create(&self, job: NewJob) -> Result<(JobRecord, bool)> {
        let uid = Uuid::new_v4();
        let now = Utc::now();

        // Conditional insert: with concurrent submitters sharing a
        // fingerprint, exactly one insert wins and the rest fall through to
        // the existing row. The fallback select runs against the statement
        // snapshot, so a row committed by a concurrent winner mid-statement
        // can be invisible here; the fresh read below covers that window.
        let query = format!(
            "WITH new_job AS (
                 INSERT INTO jobs (uid, fingerprint, kind, spec, status, created_at)
                 VALUES ($1, $2, $3, $4, 'submitted', $5)
                 ON CONFLICT (fingerprint) DO NOTHING
                 RETURNING {JOB_COLUMNS}, TRUE AS created
             )
             SELECT * FROM new_job
             UNION ALL
             SELECT {JOB_COLUMNS}, FALSE AS created FROM jobs
             WHERE fingerprint = $2 AND NOT EXISTS (SELECT 1 FROM new_job)"
        );

        let row = sqlx::query(&query)
            .bind(uid)
            .bind(&job.fingerprint)
            .bind(job.kind.as_str())
            .bind(&job.spec)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        if let Some(row) = row {
            let created: bool = row.get("created");
            let record = Self::parse_job_row(row)?;
            debug!(
                job_uid = %record.uid,
                job_kind = %record.kind,
                fingerprint = %record.fingerprint,
                created,
                "find_or_create resolved"
            );
            return Ok((record, created));
        }

        // A concurrent winner committed between our insert attempt and the
        // fallback select. Its row is durable now, so a fresh read finds it.
        match self.get_by_fingerprint(&job.fingerprint).await? {
            Some(record) => Ok((record, false)),
            None => Err(Error::Job(format!(
                "Concurrent create for fingerprint {} produced no visible record",
                job.fingerprint
            ))),
        }
    }

    async fn get(&self, uid: Uuid) -> Result<Option<JobRecord>> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE uid = $1"))
            .bind(uid)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.map(Self::parse_job_row).transpose()
    }

    async fn claim_next(&self, kinds: &[JobKind]) -> Result<Option<JobRecord>> {
        let now = Utc::now();
        let kind_strings: Vec<String> = kinds.iter().map(|k| k.as_str().to_string()).collect();

        // FOR UPDATE SKIP LOCKED: concurrent workers never double-claim a
        // record. Empty kind array = claim any kind.
        let query = format!(
            "UPDATE jobs
             SET status = 'running', started_at = $1
             WHERE uid = (
                 SELECT uid FROM jobs
                 WHERE status = 'submitted'
                   AND (cardinality($2::text[]) = 0 OR kind = ANY($2))
                 ORDER BY created_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {JOB_COLUMNS}"
        );

        let row = sqlx::query(&query)
            .bind(now)
            .bind(&kind_strings)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.map(Self::parse_job_row).transpose()
    }

    async fn complete(&self, uid: Uuid, result: Option<JsonValue>) -> Result<()> {
        let done = sqlx::query(
            "UPDATE jobs
             SET status = 'completed', completed_at = $1, result = $2
             WHERE uid = $3 AND status = 'running'",
        )
        .bind(Utc::now())
        .bind(&result)
        .bind(uid)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if done.rows_affected() == 0 {
            return Err(Error::Job(format!(
                "Cannot complete job {uid}: not in running state"
            )));
        }
        Ok(())
    }

    async fn fail(&self, uid: Uuid, error: &str) -> Result<()> {
        let done = sqlx::query(
            "UPDATE jobs
             SET status = 'failed', completed_at = $1, error = $2
             WHERE uid = $3 AND status = 'running'",
        )
        .bind(Utc::now())
        .bind(error)
        .bind(uid)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if done.rows_affected() == 0 {
            return Err(Error::Job(format!(
                "Cannot fail job {uid}: not in running state"
            )));
        }
        Ok(())
    }

    async fn submitted_count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs WHERE status = 'submitted'")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count.0)
    }
}
