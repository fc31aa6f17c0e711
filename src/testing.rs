//! Testing utilities including mock implementations.
//!
//! These are useful for testing the scheduler and applications built on
//! it without a real chat platform or browser process.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::error::{ChatError, ChatResult, SessionError, SessionResult};
use crate::traits::{ChatClient, OrderPage, PagePool};
use crate::types::{ChannelId, GroupId, MessageId, OrderCard, RoleId, ScrapeSnapshot, UserId};

/// A mock chat platform for testing.
///
/// Messages live in an in-memory map; deleting one makes later edits
/// fail with the distinguishable missing-message error, exactly like
/// the real platform.
#[derive(Default, Clone)]
pub struct MockChat {
    /// Live messages by id
    messages: Arc<RwLock<HashMap<MessageId, OrderCard>>>,

    /// Channels that report as inaccessible
    dead_channels: Arc<RwLock<Vec<ChannelId>>>,

    /// Predefined notifier per channel
    notifiers: Arc<RwLock<HashMap<ChannelId, UserId>>>,

    /// Monotonic id source for sent messages
    next_id: Arc<AtomicU64>,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<MockChatCall>>>,
}

/// Record of a call made to the mock chat client.
#[derive(Debug, Clone)]
pub enum MockChatCall {
    SendCard { channel: ChannelId, message: MessageId },
    EditCard { channel: ChannelId, message: MessageId },
    MessageExists { message: MessageId },
    ChannelAccessible { channel: ChannelId },
    ResolveNotifier { channel: ChannelId },
    DirectMessage { user: UserId, text: String },
}

impl MockChat {
    /// Create a new mock chat client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Predefine the notifier resolved for a channel.
    pub fn with_notifier(self, channel: ChannelId, user: UserId) -> Self {
        self.notifiers.write().unwrap().insert(channel, user);
        self
    }

    /// Mark a channel as inaccessible.
    pub fn with_dead_channel(self, channel: ChannelId) -> Self {
        self.dead_channels.write().unwrap().push(channel);
        self
    }

    /// Seed an already-published message, as left behind by a previous
    /// process run.
    pub fn with_existing_message(self, message: MessageId, card: OrderCard) -> Self {
        self.messages.write().unwrap().insert(message, card);
        self
    }

    /// Delete a live message out from under the tracker.
    pub fn delete_message(&self, message: &MessageId) {
        self.messages.write().unwrap().remove(message);
    }

    /// Current content of a live message.
    pub fn card(&self, message: &MessageId) -> Option<OrderCard> {
        self.messages.read().unwrap().get(message).cloned()
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockChatCall> {
        self.calls.read().unwrap().clone()
    }

    /// All direct-message texts sent to `user`, in order.
    pub fn dms_to(&self, user: &UserId) -> Vec<String> {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                MockChatCall::DirectMessage { user: u, text } if u == user => {
                    Some(text.clone())
                }
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: MockChatCall) {
        self.calls.write().unwrap().push(call);
    }
}

#[async_trait]
impl ChatClient for MockChat {
    async fn send_card(&self, channel: &ChannelId, card: &OrderCard) -> ChatResult<MessageId> {
        if self.dead_channels.read().unwrap().contains(channel) {
            return Err(ChatError::ChannelInaccessible {
                channel_id: channel.to_string(),
            });
        }
        let message = MessageId::new(format!(
            "m{}",
            self.next_id.fetch_add(1, Ordering::SeqCst) + 1
        ));
        self.messages
            .write()
            .unwrap()
            .insert(message.clone(), card.clone());
        self.record(MockChatCall::SendCard {
            channel: channel.clone(),
            message: message.clone(),
        });
        Ok(message)
    }

    async fn edit_card(
        &self,
        channel: &ChannelId,
        message: &MessageId,
        card: &OrderCard,
    ) -> ChatResult<()> {
        self.record(MockChatCall::EditCard {
            channel: channel.clone(),
            message: message.clone(),
        });
        let mut messages = self.messages.write().unwrap();
        match messages.get_mut(message) {
            Some(live) => {
                *live = card.clone();
                Ok(())
            }
            None => Err(ChatError::MessageMissing {
                message_id: message.to_string(),
            }),
        }
    }

    async fn message_exists(&self, _channel: &ChannelId, message: &MessageId) -> ChatResult<bool> {
        self.record(MockChatCall::MessageExists {
            message: message.clone(),
        });
        Ok(self.messages.read().unwrap().contains_key(message))
    }

    async fn channel_accessible(&self, channel: &ChannelId) -> ChatResult<bool> {
        self.record(MockChatCall::ChannelAccessible {
            channel: channel.clone(),
        });
        Ok(!self.dead_channels.read().unwrap().contains(channel))
    }

    async fn resolve_notifier(
        &self,
        _group: &GroupId,
        channel: &ChannelId,
        _role: &RoleId,
    ) -> ChatResult<Option<UserId>> {
        self.record(MockChatCall::ResolveNotifier {
            channel: channel.clone(),
        });
        Ok(self.notifiers.read().unwrap().get(channel).cloned())
    }

    async fn direct_message(&self, user: &UserId, text: &str) -> ChatResult<()> {
        self.record(MockChatCall::DirectMessage {
            user: user.clone(),
            text: text.to_string(),
        });
        Ok(())
    }
}

/// One scripted reading for a [`MockOrderPage`].
#[derive(Debug, Clone)]
pub enum MockPageStep {
    /// A successful scrape.
    Snapshot(ScrapeSnapshot),
    /// The page landed behind an authentication wall.
    LoginWall,
    /// A transient fetch fault with the given message.
    Fault(String),
}

/// A mock page replaying scripted readings in order.
///
/// Once the script runs out, the last successful snapshot repeats on
/// every further fetch, like a page whose order stopped changing.
#[derive(Default, Clone)]
pub struct MockOrderPage {
    steps: Arc<Mutex<VecDeque<MockPageStep>>>,
    last: Arc<Mutex<Option<ScrapeSnapshot>>>,
    fetched: Arc<RwLock<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl MockOrderPage {
    /// Create a page with an empty script (every fetch yields an empty
    /// snapshot).
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a successful reading.
    pub fn with_snapshot(self, snapshot: ScrapeSnapshot) -> Self {
        self.steps
            .lock()
            .unwrap()
            .push_back(MockPageStep::Snapshot(snapshot));
        self
    }

    /// Append a login-wall reading.
    pub fn with_login_wall(self) -> Self {
        self.steps.lock().unwrap().push_back(MockPageStep::LoginWall);
        self
    }

    /// Append a transient fetch fault.
    pub fn with_fault(self, message: impl Into<String>) -> Self {
        self.steps
            .lock()
            .unwrap()
            .push_back(MockPageStep::Fault(message.into()));
        self
    }

    /// Every URL fetched through this page, in order.
    pub fn fetched_urls(&self) -> Vec<String> {
        self.fetched.read().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderPage for MockOrderPage {
    async fn fetch_snapshot(&self, url: &str) -> SessionResult<ScrapeSnapshot> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }
        self.fetched.write().unwrap().push(url.to_string());

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(MockPageStep::Snapshot(snapshot)) => {
                *self.last.lock().unwrap() = Some(snapshot.clone());
                Ok(snapshot)
            }
            Some(MockPageStep::LoginWall) => Ok(ScrapeSnapshot::login_wall()),
            Some(MockPageStep::Fault(message)) => Err(SessionError::Transient(message)),
            None => Ok(self.last.lock().unwrap().clone().unwrap_or_default()),
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// A mock page pool handing out scripted pages in order.
///
/// Jobs opened beyond the script get a fresh blank page.
#[derive(Default, Clone)]
pub struct MockPagePool {
    scripted: Arc<Mutex<VecDeque<Arc<MockOrderPage>>>>,
    opened: Arc<RwLock<Vec<Arc<MockOrderPage>>>>,
    shut_down: Arc<AtomicBool>,
}

impl MockPagePool {
    /// Create a pool with no scripted pages.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a scripted page for the next `open_page` call.
    pub fn with_page(self, page: MockOrderPage) -> Self {
        self.scripted.lock().unwrap().push_back(Arc::new(page));
        self
    }

    /// Every page handed out so far, in order.
    pub fn opened(&self) -> Vec<Arc<MockOrderPage>> {
        self.opened.read().unwrap().clone()
    }

    pub fn open_count(&self) -> usize {
        self.opened.read().unwrap().len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PagePool for MockPagePool {
    async fn open_page(&self) -> SessionResult<Arc<dyn OrderPage>> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }
        let page = self
            .scripted
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Arc::new(MockOrderPage::new()));
        self.opened.write().unwrap().push(Arc::clone(&page));
        Ok(page)
    }

    async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}
