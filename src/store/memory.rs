//! In-memory job store for tests and ephemeral runs.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::StoreResult;
use crate::traits::store::JobStore;
use crate::types::{JobPatch, MessageId, TrackingJob};

/// HashMap-backed store keyed by message id, matching the durable
/// store's semantics including `updated_at` re-stamping.
///
/// Clones share the same map, so a test can keep a handle while the
/// scheduler owns the store.
#[derive(Default, Clone)]
pub struct MemoryJobStore {
    jobs: Arc<RwLock<HashMap<MessageId, TrackingJob>>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs.
    pub fn len(&self) -> usize {
        self.jobs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: &TrackingJob) -> StoreResult<()> {
        self.jobs
            .write()
            .unwrap()
            .insert(job.message_id.clone(), job.clone());
        Ok(())
    }

    async fn update_by_message(&self, message: &MessageId, patch: JobPatch) -> StoreResult<()> {
        let mut jobs = self.jobs.write().unwrap();
        let Some(mut job) = jobs.remove(message) else {
            return Ok(());
        };

        if let Some(name) = patch.latched_name {
            job.latched_name = Some(name);
        }
        if let Some(phase) = patch.last_phase {
            job.last_phase = Some(phase);
        }
        if let Some(fp) = patch.last_fingerprint {
            job.last_fingerprint = Some(fp);
        }
        if let Some(at) = patch.last_error_at {
            job.last_error_at = Some(at);
        }
        if let Some(new_id) = patch.message_id {
            job.message_id = new_id;
        }
        job.updated_at = Utc::now();

        jobs.insert(job.message_id.clone(), job);
        Ok(())
    }

    async fn delete_by_message(&self, message: &MessageId) -> StoreResult<()> {
        self.jobs.write().unwrap().remove(message);
        Ok(())
    }

    async fn list_all(&self) -> StoreResult<Vec<TrackingJob>> {
        let mut jobs: Vec<_> = self.jobs.read().unwrap().values().cloned().collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }

    async fn get_by_message(&self, message: &MessageId) -> StoreResult<Option<TrackingJob>> {
        Ok(self.jobs.read().unwrap().get(message).cloned())
    }
}
