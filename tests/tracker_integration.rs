//! Integration tests for the tracking lifecycle.
//!
//! These drive the scheduler end to end with mock collaborators:
//! 1. Start a job and watch the display message evolve
//! 2. Latch the customer name across readings
//! 3. Survive transient faults and lost messages
//! 4. Resume persisted jobs after a restart

use std::time::Duration;

use ordertrack::testing::{MockChat, MockChatCall, MockOrderPage, MockPagePool};
use ordertrack::types::{
    CardKind, ChannelId, GroupId, MessageId, OrderCard, RoleId, ScrapeSnapshot, TrackingJob,
    UserId,
};
use ordertrack::{JobStore, MemoryJobStore, Phase, Tracker, TrackerConfig};

const URL: &str = "https://www.doordash.com/orders/01234567-89ab-cdef-0123-456789abcdef";

fn preparing() -> ScrapeSnapshot {
    ScrapeSnapshot {
        headline: Some("Preparing your order".to_string()),
        eta: Some("Estimated arrival 12:45 PM".to_string()),
        customer: Some("Dana".to_string()),
        store: Some("Thai Basil".to_string()),
        ..Default::default()
    }
}

fn heading() -> ScrapeSnapshot {
    ScrapeSnapshot {
        headline: Some("Heading your way".to_string()),
        ..Default::default()
    }
}

fn delivered() -> ScrapeSnapshot {
    ScrapeSnapshot {
        headline: Some("Order delivered".to_string()),
        delivered: true,
        ..Default::default()
    }
}

fn tracker_with(
    store: MemoryJobStore,
    chat: MockChat,
    pool: MockPagePool,
) -> Tracker<MemoryJobStore, MockChat, MockPagePool> {
    let config = TrackerConfig::new("Order Tracker", RoleId::new("notify-role"))
        .with_poll_interval(Duration::from_secs(3600));
    Tracker::new(store, chat, pool, config)
}

fn edit_count(chat: &MockChat) -> usize {
    chat.calls()
        .iter()
        .filter(|call| matches!(call, MockChatCall::EditCard { .. }))
        .count()
}

fn send_count(chat: &MockChat) -> usize {
    chat.calls()
        .iter()
        .filter(|call| matches!(call, MockChatCall::SendCard { .. }))
        .count()
}

#[tokio::test]
async fn start_to_delivered_lifecycle() {
    let channel = ChannelId::new("c1");
    let runner = UserId::new("runner");
    let store = MemoryJobStore::new();
    let chat = MockChat::new().with_notifier(channel.clone(), runner.clone());
    let pool = MockPagePool::new()
        .with_page(MockOrderPage::new().with_snapshot(preparing()).with_snapshot(delivered()));
    let tracker = tracker_with(store.clone(), chat.clone(), pool.clone());

    let message = tracker
        .start(URL, GroupId::new("g1"), channel, Some(UserId::new("req")))
        .await
        .unwrap();

    // The immediate first cycle already ran against the preparing page.
    let card = chat.card(&message).unwrap();
    assert_eq!(card.kind, CardKind::Tracking);
    assert_eq!(card.phase, Some(Phase::Preparing));
    assert_eq!(card.customer.as_deref(), Some("Dana"));

    let row = store.get_by_message(&message).await.unwrap().unwrap();
    assert_eq!(row.last_phase, Some(Phase::Preparing));
    assert_eq!(row.latched_name.as_deref(), Some("Dana"));
    assert_eq!(tracker.active_jobs().await, 1);
    assert_eq!(chat.dms_to(&runner), ["Started tracking: Preparing"]);

    // The next reading shows the order delivered.
    tracker.cycle(row.id).await.unwrap();

    let card = chat.card(&message).unwrap();
    assert_eq!(card.kind, CardKind::Delivered);
    assert!(store.get_by_message(&message).await.unwrap().is_none());
    assert_eq!(tracker.active_jobs().await, 0);
    assert!(pool.opened()[0].is_closed());

    let dms = chat.dms_to(&runner);
    assert_eq!(dms.len(), 2);
    assert!(dms[1].contains("delivered"), "{}", dms[1]);
}

#[tokio::test]
async fn name_latch_survives_absent_readings() {
    let channel = ChannelId::new("c1");
    let runner = UserId::new("runner");
    let store = MemoryJobStore::new();
    let chat = MockChat::new().with_notifier(channel.clone(), runner.clone());
    // The heading reading has no customer name.
    let pool = MockPagePool::new()
        .with_page(MockOrderPage::new().with_snapshot(preparing()).with_snapshot(heading()));
    let tracker = tracker_with(store.clone(), chat.clone(), pool);

    let message = tracker
        .start(URL, GroupId::new("g1"), channel, None)
        .await
        .unwrap();
    let row = store.get_by_message(&message).await.unwrap().unwrap();

    tracker.cycle(row.id).await.unwrap();

    let row = store.get_by_message(&message).await.unwrap().unwrap();
    assert_eq!(row.latched_name.as_deref(), Some("Dana"));
    assert_eq!(row.last_phase, Some(Phase::Heading));

    let card = chat.card(&message).unwrap();
    assert_eq!(card.customer.as_deref(), Some("Dana"));
    assert_eq!(
        chat.dms_to(&runner),
        ["Started tracking: Preparing", "Status update: Heading your way"]
    );
}

#[tokio::test]
async fn unchanged_content_skips_the_edit() {
    let store = MemoryJobStore::new();
    let chat = MockChat::new();
    // A single scripted reading; the mock repeats it once exhausted.
    let pool = MockPagePool::new().with_page(MockOrderPage::new().with_snapshot(preparing()));
    let tracker = tracker_with(store.clone(), chat.clone(), pool);

    let message = tracker
        .start(URL, GroupId::new("g1"), ChannelId::new("c1"), None)
        .await
        .unwrap();
    let row = store.get_by_message(&message).await.unwrap().unwrap();
    let edits_after_start = edit_count(&chat);
    assert_eq!(edits_after_start, 1);

    tracker.cycle(row.id).await.unwrap();
    tracker.cycle(row.id).await.unwrap();

    assert_eq!(edit_count(&chat), edits_after_start);
    assert_eq!(tracker.active_jobs().await, 1);
}

#[tokio::test]
async fn unrecognized_headline_keeps_the_phase() {
    let store = MemoryJobStore::new();
    let chat = MockChat::new();
    let gibberish = ScrapeSnapshot {
        headline: Some("Hello there".to_string()),
        ..Default::default()
    };
    let pool = MockPagePool::new()
        .with_page(MockOrderPage::new().with_snapshot(preparing()).with_snapshot(gibberish));
    let tracker = tracker_with(store.clone(), chat.clone(), pool);

    let message = tracker
        .start(URL, GroupId::new("g1"), ChannelId::new("c1"), None)
        .await
        .unwrap();
    let row = store.get_by_message(&message).await.unwrap().unwrap();

    tracker.cycle(row.id).await.unwrap();

    let row = store.get_by_message(&message).await.unwrap().unwrap();
    assert_eq!(row.last_phase, Some(Phase::Preparing));
    assert_eq!(chat.card(&message).unwrap().phase, Some(Phase::Preparing));
}

#[tokio::test]
async fn transient_faults_report_once_per_window_and_never_terminate() {
    let requester = UserId::new("req");
    let store = MemoryJobStore::new();
    let chat = MockChat::new();
    let pool = MockPagePool::new().with_page(
        MockOrderPage::new()
            .with_snapshot(preparing())
            .with_fault("frame detached")
            .with_fault("frame detached"),
    );
    let tracker = tracker_with(store.clone(), chat.clone(), pool);

    let message = tracker
        .start(URL, GroupId::new("g1"), ChannelId::new("c1"), Some(requester.clone()))
        .await
        .unwrap();
    let row = store.get_by_message(&message).await.unwrap().unwrap();

    // Two failing cycles inside the same report window.
    tracker.cycle(row.id).await.unwrap();
    tracker.cycle(row.id).await.unwrap();

    let dms = chat.dms_to(&requester);
    assert_eq!(dms.len(), 1, "{dms:?}");
    assert!(dms[0].contains("trouble"), "{}", dms[0]);

    // The job is still alive and still remembers its last good reading.
    assert_eq!(tracker.active_jobs().await, 1);
    let row = store.get_by_message(&message).await.unwrap().unwrap();
    assert_eq!(row.last_phase, Some(Phase::Preparing));
    assert!(row.last_error_at.is_some());
}

#[tokio::test]
async fn fault_reports_repeat_once_the_window_elapses() {
    let requester = UserId::new("req");
    let store = MemoryJobStore::new();
    let chat = MockChat::new();
    let pool = MockPagePool::new().with_page(
        MockOrderPage::new()
            .with_snapshot(preparing())
            .with_fault("frame detached")
            .with_fault("frame detached"),
    );
    // A zero-width window means every fault is past the last report.
    let config = TrackerConfig::new("Order Tracker", RoleId::new("notify-role"))
        .with_poll_interval(Duration::from_secs(3600))
        .with_error_report_window(Duration::ZERO);
    let tracker = Tracker::new(store.clone(), chat.clone(), pool, config);

    let message = tracker
        .start(URL, GroupId::new("g1"), ChannelId::new("c1"), Some(requester.clone()))
        .await
        .unwrap();
    let row = store.get_by_message(&message).await.unwrap().unwrap();

    tracker.cycle(row.id).await.unwrap();
    tracker.cycle(row.id).await.unwrap();

    let dms = chat.dms_to(&requester);
    assert_eq!(dms.len(), 2, "{dms:?}");
    assert!(dms.iter().all(|dm| dm.contains("trouble")), "{dms:?}");
    assert_eq!(tracker.active_jobs().await, 1);
}

#[tokio::test]
async fn login_wall_terminates_the_job() {
    let requester = UserId::new("req");
    let store = MemoryJobStore::new();
    let chat = MockChat::new();
    let pool = MockPagePool::new().with_page(MockOrderPage::new().with_login_wall());
    let tracker = tracker_with(store.clone(), chat.clone(), pool.clone());

    let message = tracker
        .start(URL, GroupId::new("g1"), ChannelId::new("c1"), Some(requester.clone()))
        .await
        .unwrap();

    assert_eq!(chat.card(&message).unwrap().kind, CardKind::LoginWall);
    assert!(store.get_by_message(&message).await.unwrap().is_none());
    assert_eq!(tracker.active_jobs().await, 0);
    assert!(pool.opened()[0].is_closed());

    let dms = chat.dms_to(&requester);
    assert_eq!(dms.len(), 1);
    assert!(dms[0].contains("login"), "{}", dms[0]);
}

#[tokio::test]
async fn lost_message_is_republished_and_reindexed() {
    let store = MemoryJobStore::new();
    let chat = MockChat::new();
    let pool = MockPagePool::new()
        .with_page(MockOrderPage::new().with_snapshot(preparing()).with_snapshot(heading()));
    let tracker = tracker_with(store.clone(), chat.clone(), pool);

    let message = tracker
        .start(URL, GroupId::new("g1"), ChannelId::new("c1"), None)
        .await
        .unwrap();
    let row = store.get_by_message(&message).await.unwrap().unwrap();

    // Someone deletes the display message between ticks.
    chat.delete_message(&message);
    tracker.cycle(row.id).await.unwrap();

    assert!(store.get_by_message(&message).await.unwrap().is_none());
    let rows = store.list_all().await.unwrap();
    assert_eq!(rows.len(), 1);
    let migrated = &rows[0];
    assert_eq!(migrated.id, row.id);
    assert_ne!(migrated.message_id, message);
    assert_eq!(
        chat.card(&migrated.message_id).unwrap().phase,
        Some(Phase::Heading)
    );

    // Later cycles follow the new message id.
    tracker.cycle(row.id).await.unwrap();
    assert_eq!(tracker.active_jobs().await, 1);
}

#[tokio::test]
async fn resume_rebuilds_jobs_and_republishes_lost_messages() {
    let channel = ChannelId::new("c1");
    let store = MemoryJobStore::new();

    let kept = TrackingJob::new(URL, GroupId::new("g1"), channel.clone(), MessageId::new("a1"));
    let lost = TrackingJob::new(URL, GroupId::new("g1"), channel.clone(), MessageId::new("b1"));
    store.insert(&kept).await.unwrap();
    store.insert(&lost).await.unwrap();

    // Only the first message survived the downtime.
    let chat = MockChat::new()
        .with_existing_message(MessageId::new("a1"), OrderCard::placeholder("Order Tracker"));
    let pool = MockPagePool::new()
        .with_page(MockOrderPage::new().with_snapshot(preparing()))
        .with_page(MockOrderPage::new().with_snapshot(preparing()));
    let tracker = tracker_with(store.clone(), chat.clone(), pool.clone());

    let resumed = tracker.resume().await.unwrap();
    assert_eq!(resumed, 2);
    assert_eq!(tracker.active_jobs().await, 2);
    assert_eq!(pool.open_count(), 2);
    assert_eq!(store.len(), 2);

    // The surviving message was edited in place.
    assert_eq!(chat.card(&MessageId::new("a1")).unwrap().kind, CardKind::Tracking);

    // The lost one was republished and its row re-keyed.
    assert_eq!(send_count(&chat), 1);
    assert!(store.get_by_message(&MessageId::new("b1")).await.unwrap().is_none());
    let migrated = store
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .find(|job| job.id == lost.id)
        .unwrap();
    assert_ne!(migrated.message_id, MessageId::new("b1"));
    assert_eq!(
        chat.card(&migrated.message_id).unwrap().kind,
        CardKind::Tracking
    );
}

#[tokio::test]
async fn resume_deletes_jobs_whose_channel_is_gone() {
    let store = MemoryJobStore::new();
    let orphan = TrackingJob::new(
        URL,
        GroupId::new("g1"),
        ChannelId::new("dead"),
        MessageId::new("a1"),
    );
    store.insert(&orphan).await.unwrap();

    let chat = MockChat::new().with_dead_channel(ChannelId::new("dead"));
    let pool = MockPagePool::new();
    let tracker = tracker_with(store.clone(), chat, pool.clone());

    let resumed = tracker.resume().await.unwrap();
    assert_eq!(resumed, 0);
    assert_eq!(tracker.active_jobs().await, 0);
    assert!(store.is_empty());
    assert_eq!(pool.open_count(), 0);
}

#[tokio::test]
async fn shutdown_releases_resources_but_keeps_rows() {
    let store = MemoryJobStore::new();
    let chat = MockChat::new();
    let pool = MockPagePool::new()
        .with_page(MockOrderPage::new().with_snapshot(preparing()));
    let tracker = tracker_with(store.clone(), chat, pool.clone());

    tracker
        .start(URL, GroupId::new("g1"), ChannelId::new("c1"), None)
        .await
        .unwrap();
    assert_eq!(tracker.active_jobs().await, 1);

    tracker.shutdown().await;

    assert_eq!(tracker.active_jobs().await, 0);
    assert!(pool.opened()[0].is_closed());
    assert!(pool.is_shut_down());
    // The row survives for the next process run to resume.
    assert_eq!(store.len(), 1);
}
