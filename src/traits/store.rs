//! Durable job-store boundary.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::{JobPatch, MessageId, TrackingJob};

/// Durable table of tracking jobs, keyed by job id and indexed by
/// published-message id and channel id.
///
/// No operation spans multiple rows; each job is independent.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job. Timestamps come from the job itself.
    async fn insert(&self, job: &TrackingJob) -> StoreResult<()>;

    /// Apply a partial update to the job owning `message`, re-stamping
    /// `updated_at`. Patching `message_id` moves the row's index key.
    async fn update_by_message(&self, message: &MessageId, patch: JobPatch) -> StoreResult<()>;

    /// Delete the job owning `message`. Deleting a missing row is a no-op.
    async fn delete_by_message(&self, message: &MessageId) -> StoreResult<()>;

    /// All persisted jobs, used once at process start.
    async fn list_all(&self) -> StoreResult<Vec<TrackingJob>>;

    /// Look up the job owning `message`.
    async fn get_by_message(&self, message: &MessageId) -> StoreResult<Option<TrackingJob>>;
}
