//! SQLite job store.
//!
//! The durable source of truth for which jobs exist across restarts.
//! File-based; one row per job, indexed by message id and channel id.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

use crate::error::{StoreError, StoreResult};
use crate::phase::Phase;
use crate::traits::store::JobStore;
use crate::types::{ChannelId, GroupId, JobId, JobPatch, MessageId, TrackingJob, UserId};

/// SQLite-backed job store.
pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    /// Create a store with the given connection URL.
    ///
    /// # Example URLs
    /// - `sqlite::memory:` - In-memory database (ephemeral)
    /// - `sqlite:./tracking.db?mode=rwc` - Create if not exists
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string().into()))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub async fn in_memory() -> StoreResult<Self> {
        Self::new("sqlite::memory:").await
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tracking_jobs (
                id TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                group_id TEXT NOT NULL,
                channel_id TEXT NOT NULL,
                message_id TEXT NOT NULL,
                assignee_id TEXT,
                requester_id TEXT,
                latched_name TEXT,
                last_phase TEXT,
                last_fingerprint TEXT,
                last_error_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_message_id ON tracking_jobs(message_id);
            CREATE INDEX IF NOT EXISTS idx_jobs_channel_id ON tracking_jobs(channel_id);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string().into()))?;

        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

const JOB_COLUMNS: &str = "id, url, group_id, channel_id, message_id, assignee_id, requester_id, \
     latched_name, last_phase, last_fingerprint, last_error_at, created_at, updated_at";

// Row type for sqlx queries
#[derive(Debug, FromRow)]
struct JobRow {
    id: String,
    url: String,
    group_id: String,
    channel_id: String,
    message_id: String,
    assignee_id: Option<String>,
    requester_id: Option<String>,
    latched_name: Option<String>,
    last_phase: Option<String>,
    last_fingerprint: Option<String>,
    last_error_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl JobRow {
    fn into_job(self) -> StoreResult<TrackingJob> {
        let id = JobId::parse(&self.id)
            .ok_or_else(|| StoreError::Corrupt(format!("invalid job id: {}", self.id)))?;

        let parse_ts = |s: &str| {
            chrono::DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&chrono::Utc))
                .map_err(|e| StoreError::Corrupt(format!("invalid timestamp: {e}")))
        };

        let last_phase = match self.last_phase.as_deref() {
            Some(s) => Some(
                Phase::parse(s)
                    .ok_or_else(|| StoreError::Corrupt(format!("invalid phase: {s}")))?,
            ),
            None => None,
        };

        Ok(TrackingJob {
            id,
            url: self.url,
            group_id: GroupId(self.group_id),
            channel_id: ChannelId(self.channel_id),
            message_id: MessageId(self.message_id),
            assignee_id: self.assignee_id.map(UserId),
            requester_id: self.requester_id.map(UserId),
            latched_name: self.latched_name,
            last_phase,
            last_fingerprint: self.last_fingerprint,
            last_error_at: self.last_error_at.as_deref().map(parse_ts).transpose()?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn insert(&self, job: &TrackingJob) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tracking_jobs (id, url, group_id, channel_id, message_id, assignee_id,
                requester_id, latched_name, last_phase, last_fingerprint, last_error_at,
                created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.id.to_string())
        .bind(&job.url)
        .bind(job.group_id.as_str())
        .bind(job.channel_id.as_str())
        .bind(job.message_id.as_str())
        .bind(job.assignee_id.as_ref().map(|u| u.as_str()))
        .bind(job.requester_id.as_ref().map(|u| u.as_str()))
        .bind(&job.latched_name)
        .bind(job.last_phase.map(|p| p.as_str()))
        .bind(&job.last_fingerprint)
        .bind(job.last_error_at.map(|t| t.to_rfc3339()))
        .bind(job.created_at.to_rfc3339())
        .bind(job.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string().into()))?;

        Ok(())
    }

    async fn update_by_message(&self, message: &MessageId, patch: JobPatch) -> StoreResult<()> {
        // Only set columns actually present in the patch
        let mut sets = vec!["updated_at = ?".to_string()];
        let mut args = vec![Utc::now().to_rfc3339()];

        if let Some(new_id) = &patch.message_id {
            sets.push("message_id = ?".to_string());
            args.push(new_id.as_str().to_string());
        }
        if let Some(name) = &patch.latched_name {
            sets.push("latched_name = ?".to_string());
            args.push(name.clone());
        }
        if let Some(phase) = patch.last_phase {
            sets.push("last_phase = ?".to_string());
            args.push(phase.as_str().to_string());
        }
        if let Some(fp) = &patch.last_fingerprint {
            sets.push("last_fingerprint = ?".to_string());
            args.push(fp.clone());
        }
        if let Some(at) = patch.last_error_at {
            sets.push("last_error_at = ?".to_string());
            args.push(at.to_rfc3339());
        }

        let sql = format!(
            "UPDATE tracking_jobs SET {} WHERE message_id = ?",
            sets.join(", ")
        );

        let mut query = sqlx::query(&sql);
        for arg in &args {
            query = query.bind(arg);
        }
        query = query.bind(message.as_str());

        query
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string().into()))?;

        Ok(())
    }

    async fn delete_by_message(&self, message: &MessageId) -> StoreResult<()> {
        sqlx::query("DELETE FROM tracking_jobs WHERE message_id = ?")
            .bind(message.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string().into()))?;

        Ok(())
    }

    async fn list_all(&self) -> StoreResult<Vec<TrackingJob>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM tracking_jobs ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string().into()))?;

        rows.into_iter().map(|r| r.into_job()).collect()
    }

    async fn get_by_message(&self, message: &MessageId) -> StoreResult<Option<TrackingJob>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM tracking_jobs WHERE message_id = ?"
        ))
        .bind(message.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string().into()))?;

        match row {
            Some(r) => Ok(Some(r.into_job()?)),
            None => Ok(None),
        }
    }
}
