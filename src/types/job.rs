//! Durable tracking-job record and partial-update patch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::phase::Phase;
use crate::types::ids::{ChannelId, GroupId, JobId, MessageId, UserId};

/// One durable tracking job.
///
/// Sole source of truth for which jobs exist across restarts. At most
/// one job exists per published message id; the message id changes when
/// the display message is lost and recreated, the job id never does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingJob {
    pub id: JobId,
    pub url: String,
    pub group_id: GroupId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub assignee_id: Option<UserId>,
    pub requester_id: Option<UserId>,
    pub latched_name: Option<String>,
    pub last_phase: Option<Phase>,
    pub last_fingerprint: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrackingJob {
    /// Create a fresh job for a newly published display message.
    pub fn new(
        url: impl Into<String>,
        group_id: GroupId,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            url: url.into(),
            group_id,
            channel_id,
            message_id,
            assignee_id: None,
            requester_id: None,
            latched_name: None,
            last_phase: None,
            last_fingerprint: None,
            last_error_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the notifier identity.
    pub fn with_assignee(mut self, assignee: Option<UserId>) -> Self {
        self.assignee_id = assignee;
        self
    }

    /// Set the requesting user.
    pub fn with_requester(mut self, requester: Option<UserId>) -> Self {
        self.requester_id = requester;
        self
    }
}

/// Partial update applied to a job row by message id.
///
/// `None` fields are left untouched; the store re-stamps `updated_at`
/// on every patch. `message_id` itself is a supported write path, used
/// when a lost display message is republished.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub message_id: Option<MessageId>,
    pub latched_name: Option<String>,
    pub last_phase: Option<Phase>,
    pub last_fingerprint: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
}

impl JobPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message_id(mut self, message_id: MessageId) -> Self {
        self.message_id = Some(message_id);
        self
    }

    /// Latch a name. Passing `None` leaves the stored name untouched,
    /// so a later absent reading can never erase a latched name.
    pub fn with_latched_name(mut self, name: Option<String>) -> Self {
        self.latched_name = name;
        self
    }

    pub fn with_phase(mut self, phase: Option<Phase>) -> Self {
        self.last_phase = phase;
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.last_fingerprint = Some(fingerprint.into());
        self
    }

    pub fn with_last_error_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_error_at = Some(at);
        self
    }

    /// True when the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.message_id.is_none()
            && self.latched_name.is_none()
            && self.last_phase.is_none()
            && self.last_fingerprint.is_none()
            && self.last_error_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_stamps_timestamps() {
        let job = TrackingJob::new(
            "https://example.com/orders/1",
            GroupId::new("g"),
            ChannelId::new("c"),
            MessageId::new("m"),
        );
        assert_eq!(job.created_at, job.updated_at);
        assert!(job.latched_name.is_none());
        assert!(job.last_phase.is_none());
    }

    #[test]
    fn empty_patch_detected() {
        assert!(JobPatch::new().is_empty());
        assert!(!JobPatch::new().with_fingerprint("fp").is_empty());
        // An absent name is not a write
        assert!(JobPatch::new().with_latched_name(None).is_empty());
    }
}
