//! Registry of live per-job resources.
//!
//! One entry per active job, keyed by the stable job id, with a
//! message-id secondary index. The message id is the mutable key: when
//! a lost display message is republished, only the index moves.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::phase::Phase;
use crate::traits::session::OrderPage;
use crate::types::{ChannelId, JobId, MessageId, UserId};

/// Ephemeral per-job state, rebuilt from the store on every start.
#[derive(Debug, Clone)]
pub struct RuntimeState {
    pub url: String,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub latched_name: Option<String>,
    pub last_phase: Option<Phase>,
    pub assignee_id: Option<UserId>,
    pub requester_id: Option<UserId>,
}

/// Live resources exclusively owned by one active job.
pub struct JobRuntime {
    pub page: Arc<dyn OrderPage>,
    pub cancel: CancellationToken,
    pub timer: Option<JoinHandle<()>>,
    pub state: RuntimeState,
}

/// Job-id-keyed runtime map plus the message-id index.
#[derive(Default)]
pub struct JobRegistry {
    jobs: HashMap<JobId, JobRuntime>,
    by_message: HashMap<MessageId, JobId>,
}

impl JobRegistry {
    pub fn insert(&mut self, job_id: JobId, runtime: JobRuntime) {
        self.by_message
            .insert(runtime.state.message_id.clone(), job_id);
        self.jobs.insert(job_id, runtime);
    }

    pub fn get(&self, job_id: &JobId) -> Option<&JobRuntime> {
        self.jobs.get(job_id)
    }

    pub fn get_mut(&mut self, job_id: &JobId) -> Option<&mut JobRuntime> {
        self.jobs.get_mut(job_id)
    }

    /// Remove a job and its message index entry.
    pub fn remove(&mut self, job_id: &JobId) -> Option<JobRuntime> {
        let runtime = self.jobs.remove(job_id)?;
        self.by_message.remove(&runtime.state.message_id);
        Some(runtime)
    }

    pub fn job_for_message(&self, message: &MessageId) -> Option<JobId> {
        self.by_message.get(message).copied()
    }

    /// Re-key a job under a freshly published message id.
    pub fn migrate_message(&mut self, job_id: &JobId, new_message: MessageId) {
        if let Some(runtime) = self.jobs.get_mut(job_id) {
            self.by_message.remove(&runtime.state.message_id);
            runtime.state.message_id = new_message.clone();
            self.by_message.insert(new_message, *job_id);
        }
    }

    /// Attach the recurring-timer handle. Returns false when the job
    /// terminated before its timer landed (caller aborts the handle).
    pub fn set_timer(&mut self, job_id: &JobId, timer: JoinHandle<()>) -> bool {
        match self.jobs.get_mut(job_id) {
            Some(runtime) => {
                runtime.timer = Some(timer);
                true
            }
            None => false,
        }
    }

    /// Take every runtime out, for process shutdown.
    pub fn drain(&mut self) -> Vec<(JobId, JobRuntime)> {
        self.by_message.clear();
        self.jobs.drain().collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionResult;
    use crate::types::ScrapeSnapshot;
    use async_trait::async_trait;

    struct DeadPage;

    #[async_trait]
    impl OrderPage for DeadPage {
        async fn fetch_snapshot(&self, _url: &str) -> SessionResult<ScrapeSnapshot> {
            Ok(ScrapeSnapshot::default())
        }
        async fn close(&self) {}
    }

    fn runtime(message: &str) -> JobRuntime {
        JobRuntime {
            page: Arc::new(DeadPage),
            cancel: CancellationToken::new(),
            timer: None,
            state: RuntimeState {
                url: "https://example.com/orders/1".to_string(),
                channel_id: ChannelId::new("c"),
                message_id: MessageId::new(message),
                latched_name: None,
                last_phase: None,
                assignee_id: None,
                requester_id: None,
            },
        }
    }

    #[test]
    fn migrate_moves_the_secondary_index() {
        let mut registry = JobRegistry::default();
        let job_id = JobId::new();
        registry.insert(job_id, runtime("m1"));

        registry.migrate_message(&job_id, MessageId::new("m2"));

        assert_eq!(registry.job_for_message(&MessageId::new("m1")), None);
        assert_eq!(
            registry.job_for_message(&MessageId::new("m2")),
            Some(job_id)
        );
        assert_eq!(
            registry.get(&job_id).unwrap().state.message_id,
            MessageId::new("m2")
        );
    }

    #[test]
    fn remove_clears_both_indexes() {
        let mut registry = JobRegistry::default();
        let job_id = JobId::new();
        registry.insert(job_id, runtime("m1"));

        assert!(registry.remove(&job_id).is_some());
        assert!(registry.is_empty());
        assert_eq!(registry.job_for_message(&MessageId::new("m1")), None);
        assert!(registry.remove(&job_id).is_none());
    }

    #[tokio::test]
    async fn set_timer_fails_for_terminated_job() {
        let mut registry = JobRegistry::default();
        let job_id = JobId::new();
        let handle = tokio::spawn(async {});
        assert!(!registry.set_timer(&job_id, handle));
    }
}
