//! Job lifecycle scheduler.
//!
//! The [`Tracker`] owns every active job: a dedicated browser page, a
//! recurring poll timer, and the runtime mirror of its persisted state.
//! The store is the source of truth for which jobs exist; the registry
//! only holds live resources, so a crash loses nothing that `resume`
//! cannot rebuild.

mod registry;

pub use registry::{JobRegistry, JobRuntime, RuntimeState};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{ChatError, Result, SessionError, TrackError};
use crate::phase::{classify, Phase};
use crate::traits::{ChatClient, JobStore, PagePool};
use crate::types::{
    ChannelId, GroupId, JobId, JobPatch, MessageId, OrderCard, RoleId, TrackingJob, UserId,
};

/// Tunables for the scheduler.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Name shown on every published card.
    pub branding: String,
    /// Role whose sole channel-visible holder gets phase notifications.
    pub notifier_role: RoleId,
    /// Delay between poll cycles for each job.
    pub poll_interval: Duration,
    /// Minimum gap between repeated fetch-trouble reports to a requester.
    pub error_report_window: Duration,
    /// Operator to DM when a cycle fails in an unanticipated way.
    pub operator_user: Option<UserId>,
}

impl TrackerConfig {
    pub fn new(branding: impl Into<String>, notifier_role: RoleId) -> Self {
        Self {
            branding: branding.into(),
            notifier_role,
            poll_interval: Duration::from_secs(60),
            error_report_window: Duration::from_secs(300),
            operator_user: None,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_error_report_window(mut self, window: Duration) -> Self {
        self.error_report_window = window;
        self
    }

    pub fn with_operator(mut self, operator: Option<UserId>) -> Self {
        self.operator_user = operator;
        self
    }
}

struct TrackerInner<S, C, P> {
    store: S,
    chat: C,
    pool: P,
    config: TrackerConfig,
    registry: Mutex<JobRegistry>,
}

/// The scheduler. A cheap-to-clone handle; clones share all state, so
/// timer tasks carry their own handle back into the same tracker.
/// Generic over its three collaborators so tests can drive it entirely
/// with mocks.
pub struct Tracker<S, C, P> {
    inner: Arc<TrackerInner<S, C, P>>,
}

impl<S, C, P> Clone for Tracker<S, C, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, C, P> Tracker<S, C, P>
where
    S: JobStore + 'static,
    C: ChatClient + 'static,
    P: PagePool + 'static,
{
    pub fn new(store: S, chat: C, pool: P, config: TrackerConfig) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                store,
                chat,
                pool,
                config,
                registry: Mutex::new(JobRegistry::default()),
            }),
        }
    }

    /// Number of jobs with live resources. Zero right after a crash,
    /// restored by [`Tracker::resume`].
    pub async fn active_jobs(&self) -> usize {
        self.inner.registry.lock().await.len()
    }

    /// Start tracking an order: publish the placeholder message, persist
    /// the job, run one immediate cycle, then begin recurring polls.
    ///
    /// The job is durable the moment the row is written; a crash after
    /// that point is recovered by [`Tracker::resume`].
    pub async fn start(
        &self,
        url: &str,
        group: GroupId,
        channel: ChannelId,
        requester: Option<UserId>,
    ) -> Result<MessageId> {
        let page = self.inner.pool.open_page().await?;

        // A missing notifier downgrades the job, it does not block it.
        let assignee = match self
            .inner
            .chat
            .resolve_notifier(&group, &channel, &self.inner.config.notifier_role)
            .await
        {
            Ok(assignee) => assignee,
            Err(e) => {
                warn!(channel = %channel, error = %e, "notifier resolution failed");
                None
            }
        };

        let card = OrderCard::placeholder(&self.inner.config.branding);
        let message_id = self.inner.chat.send_card(&channel, &card).await?;

        let job = TrackingJob::new(url, group, channel.clone(), message_id.clone())
            .with_assignee(assignee.clone())
            .with_requester(requester.clone());
        let job_id = job.id;
        self.inner.store.insert(&job).await?;

        let cancel = CancellationToken::new();
        {
            let mut registry = self.inner.registry.lock().await;
            registry.insert(
                job_id,
                JobRuntime {
                    page,
                    cancel: cancel.clone(),
                    timer: None,
                    state: RuntimeState {
                        url: url.to_string(),
                        channel_id: channel,
                        message_id: message_id.clone(),
                        latched_name: None,
                        last_phase: None,
                        assignee_id: assignee,
                        requester_id: requester,
                    },
                },
            );
        }
        info!(job = %job_id, url = %url, "tracking job started");

        // First reading lands before the first timer tick.
        if let Err(e) = self.cycle(job_id).await {
            error!(job = %job_id, error = %e, "initial cycle failed");
            self.alert_operator(job_id, &e).await;
        }
        self.spawn_timer(job_id, cancel).await;

        Ok(message_id)
    }

    /// Rebuild live resources for every persisted job after a restart.
    ///
    /// Jobs whose channel is gone are deleted; jobs whose display
    /// message is gone get a fresh placeholder and a migrated message
    /// id. Returns the number of jobs put back on timers.
    pub async fn resume(&self) -> Result<usize> {
        let jobs = self.inner.store.list_all().await?;
        info!(count = jobs.len(), "resuming persisted jobs");

        let mut resumed = 0;
        for job in jobs {
            match self.resume_job(&job).await {
                Ok(true) => resumed += 1,
                Ok(false) => {}
                Err(e) => warn!(job = %job.id, error = %e, "failed to resume job"),
            }
        }
        Ok(resumed)
    }

    async fn resume_job(&self, job: &TrackingJob) -> Result<bool> {
        match self.inner.chat.channel_accessible(&job.channel_id).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(job = %job.id, channel = %job.channel_id, "channel gone, deleting job");
                self.inner.store.delete_by_message(&job.message_id).await?;
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        }

        let mut message_id = job.message_id.clone();
        let exists = self
            .inner
            .chat
            .message_exists(&job.channel_id, &message_id)
            .await?;
        if !exists {
            info!(job = %job.id, "display message lost, republishing");
            let card = OrderCard::placeholder(&self.inner.config.branding);
            let new_id = self.inner.chat.send_card(&job.channel_id, &card).await?;
            self.inner
                .store
                .update_by_message(&message_id, JobPatch::new().with_message_id(new_id.clone()))
                .await?;
            message_id = new_id;
        }

        let page = self.inner.pool.open_page().await?;
        let cancel = CancellationToken::new();
        {
            let mut registry = self.inner.registry.lock().await;
            registry.insert(
                job.id,
                JobRuntime {
                    page,
                    cancel: cancel.clone(),
                    timer: None,
                    state: RuntimeState {
                        url: job.url.clone(),
                        channel_id: job.channel_id.clone(),
                        message_id,
                        latched_name: job.latched_name.clone(),
                        last_phase: job.last_phase,
                        assignee_id: job.assignee_id.clone(),
                        requester_id: job.requester_id.clone(),
                    },
                },
            );
        }
        info!(job = %job.id, url = %job.url, "tracking job resumed");

        if let Err(e) = self.cycle(job.id).await {
            error!(job = %job.id, error = %e, "resume cycle failed");
            self.alert_operator(job.id, &e).await;
        }
        self.spawn_timer(job.id, cancel).await;

        Ok(true)
    }

    /// Run one poll cycle for a job.
    ///
    /// Scrape, classify, latch the customer name, publish when the card
    /// content changed, notify on phase transitions, and terminate on a
    /// terminal reading. A cycle against a job that has already been
    /// terminated is a silent no-op.
    pub async fn cycle(&self, job_id: JobId) -> Result<()> {
        let (page, message_id) = {
            let registry = self.inner.registry.lock().await;
            match registry.get(&job_id) {
                Some(runtime) => (Arc::clone(&runtime.page), runtime.state.message_id.clone()),
                None => return Ok(()),
            }
        };
        // Durable truth gates the cycle; the registry alone can be
        // stale for a tick after termination.
        let Some(row) = self.inner.store.get_by_message(&message_id).await? else {
            debug!(job = %job_id, "no persisted row, skipping cycle");
            return Ok(());
        };

        let snapshot = match page.fetch_snapshot(&row.url).await {
            Ok(snapshot) => snapshot,
            Err(e) => return self.handle_fetch_fault(job_id, &row, e).await,
        };

        if snapshot.login_required {
            info!(job = %job_id, url = %row.url, "order page behind a login wall");
            let card = OrderCard::login_wall(&self.inner.config.branding);
            if let Err(e) = self
                .publish(job_id, &row.channel_id, &row.message_id, &card)
                .await
            {
                warn!(job = %job_id, error = %e, "failed to publish login-wall notice");
            }
            if let Some(requester) = &row.requester_id {
                let text = format!(
                    "Stopped tracking {}: the page now requires a login.",
                    row.url
                );
                if let Err(e) = self.inner.chat.direct_message(requester, &text).await {
                    warn!(job = %job_id, error = %e, "requester DM failed");
                }
            }
            self.terminate(job_id).await;
            return Ok(());
        }

        // The name latches on first sight and is never overwritten.
        let latched = row
            .latched_name
            .clone()
            .or_else(|| snapshot.customer.clone());

        let phase = classify(snapshot.headline.as_deref()).or(row.last_phase);
        let delivered = snapshot.delivered || phase == Some(Phase::Delivered);
        let phase = if delivered { Some(Phase::Delivered) } else { phase };

        if !delivered {
            if let (Some(assignee), Some(current)) = (&row.assignee_id, phase) {
                let ping = if row.last_phase.is_none() {
                    Some(format!("Started tracking: {current}"))
                } else if row.last_phase != Some(current) {
                    Some(format!("Status update: {current}"))
                } else {
                    None
                };
                if let Some(text) = ping {
                    if let Err(e) = self.inner.chat.direct_message(assignee, &text).await {
                        warn!(job = %job_id, error = %e, "notifier DM failed");
                    }
                }
            }
        }

        let card = OrderCard::from_snapshot(
            &self.inner.config.branding,
            &snapshot,
            latched.clone(),
            phase,
            delivered,
        );
        let fingerprint = card.fingerprint();
        let mut message_id = row.message_id.clone();
        if row.last_fingerprint.as_deref() == Some(fingerprint.as_str()) {
            debug!(job = %job_id, "card unchanged, skipping edit");
        } else {
            message_id = self
                .publish(job_id, &row.channel_id, &message_id, &card)
                .await?;
        }

        if delivered {
            info!(job = %job_id, "order delivered");
            if let Some(assignee) = &row.assignee_id {
                let text = match &latched {
                    Some(name) => format!("{name}'s order was delivered. Tracking finished."),
                    None => "The order was delivered. Tracking finished.".to_string(),
                };
                if let Err(e) = self.inner.chat.direct_message(assignee, &text).await {
                    warn!(job = %job_id, error = %e, "delivery DM failed");
                }
            }
            self.terminate(job_id).await;
            return Ok(());
        }

        self.inner
            .store
            .update_by_message(
                &message_id,
                JobPatch::new()
                    .with_latched_name(latched.clone())
                    .with_phase(phase)
                    .with_fingerprint(fingerprint),
            )
            .await?;

        let mut registry = self.inner.registry.lock().await;
        if let Some(runtime) = registry.get_mut(&job_id) {
            runtime.state.latched_name = latched;
            runtime.state.last_phase = phase;
            runtime.state.message_id = message_id;
        }
        Ok(())
    }

    /// Stop a job and release everything it owns. Idempotent; a second
    /// call finds no registry entry and returns immediately.
    ///
    /// The registry entry is removed before the cancel, page close, and
    /// row delete, not after: pulling it first is what makes the second
    /// call a no-op and stops concurrent cycles from seeing a job whose
    /// resources are mid-teardown.
    pub async fn terminate(&self, job_id: JobId) {
        let runtime = { self.inner.registry.lock().await.remove(&job_id) };
        let Some(runtime) = runtime else { return };

        info!(job = %job_id, "terminating job");
        // Signal first so the timer task winds down at its next await,
        // even when terminate runs inside one of its own cycles.
        runtime.cancel.cancel();
        runtime.page.close().await;
        if let Err(e) = self
            .inner
            .store
            .delete_by_message(&runtime.state.message_id)
            .await
        {
            warn!(job = %job_id, error = %e, "failed to delete job row");
        }
    }

    /// Release every job's live resources without touching the store,
    /// then close the shared browser. Jobs resume on next start.
    pub async fn shutdown(&self) {
        let runtimes = { self.inner.registry.lock().await.drain() };
        info!(count = runtimes.len(), "suspending active jobs");
        for (job_id, runtime) in runtimes {
            runtime.cancel.cancel();
            if let Some(timer) = runtime.timer {
                timer.abort();
            }
            runtime.page.close().await;
            debug!(job = %job_id, "job suspended");
        }
        self.inner.pool.shutdown().await;
    }

    /// Edit the display message, republishing and migrating the message
    /// id when the platform reports the message gone.
    async fn publish(
        &self,
        job_id: JobId,
        channel: &ChannelId,
        message: &MessageId,
        card: &OrderCard,
    ) -> Result<MessageId> {
        match self.inner.chat.edit_card(channel, message, card).await {
            Ok(()) => Ok(message.clone()),
            Err(ChatError::MessageMissing { .. }) => {
                info!(job = %job_id, "display message deleted, republishing");
                let new_id = self.inner.chat.send_card(channel, card).await?;
                self.inner
                    .store
                    .update_by_message(message, JobPatch::new().with_message_id(new_id.clone()))
                    .await?;
                let mut registry = self.inner.registry.lock().await;
                registry.migrate_message(&job_id, new_id.clone());
                Ok(new_id)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// A failed scrape never kills the job. The requester hears about it
    /// at most once per report window.
    async fn handle_fetch_fault(
        &self,
        job_id: JobId,
        row: &TrackingJob,
        fault: SessionError,
    ) -> Result<()> {
        warn!(job = %job_id, url = %row.url, error = %fault, "snapshot fetch failed");

        let now = Utc::now();
        let report_due = row.last_error_at.map_or(true, |last| {
            now.signed_duration_since(last)
                .to_std()
                .map_or(true, |gap| gap >= self.inner.config.error_report_window)
        });
        if !report_due {
            return Ok(());
        }

        if let Some(requester) = &row.requester_id {
            let text = format!(
                "Having trouble reading the order page for {} right now. Still trying.",
                row.url
            );
            if let Err(e) = self.inner.chat.direct_message(requester, &text).await {
                warn!(job = %job_id, error = %e, "fetch-trouble DM failed");
            }
        }
        self.inner
            .store
            .update_by_message(&row.message_id, JobPatch::new().with_last_error_at(now))
            .await?;
        Ok(())
    }

    /// Spawn the recurring poll timer for a job. A job terminated during
    /// its immediate first cycle gets its fresh timer dropped here.
    async fn spawn_timer(&self, job_id: JobId, cancel: CancellationToken) {
        let tracker = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tracker.inner.config.poll_interval);
            // Cycles run inline on the timer task, so a slow cycle
            // delays the next tick instead of overlapping it.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The interval fires immediately; the start path already ran
            // the first cycle.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = tracker.cycle(job_id).await {
                            error!(job = %job_id, error = %e, "poll cycle failed");
                            tracker.alert_operator(job_id, &e).await;
                        }
                    }
                }
            }
            debug!(job = %job_id, "poll timer stopped");
        });

        let mut registry = self.inner.registry.lock().await;
        if !registry.set_timer(&job_id, handle) {
            debug!(job = %job_id, "job terminated before its timer landed");
        }
    }

    /// Unanticipated cycle failures go to the operator; the job stays
    /// active and retries on its next tick.
    async fn alert_operator(&self, job_id: JobId, fault: &TrackError) {
        let Some(operator) = &self.inner.config.operator_user else {
            return;
        };
        let text = format!("Tracking job {job_id} hit an unexpected error: {fault}");
        if let Err(e) = self.inner.chat.direct_message(operator, &text).await {
            warn!(job = %job_id, error = %e, "operator alert failed");
        }
    }
}
