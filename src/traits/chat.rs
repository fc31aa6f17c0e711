//! Chat-platform collaborator boundary.
//!
//! The tracker never talks to a chat platform directly; it drives this
//! trait. The real implementation wraps the platform client and its
//! message-formatting layer; tests use [`crate::testing::MockChat`].

use async_trait::async_trait;

use crate::error::ChatResult;
use crate::types::{ChannelId, GroupId, MessageId, OrderCard, RoleId, UserId};

/// Everything the tracker needs from the chat platform.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Publish a new display message, returning its id.
    async fn send_card(&self, channel: &ChannelId, card: &OrderCard) -> ChatResult<MessageId>;

    /// Edit an existing display message in place.
    ///
    /// Fails with [`crate::error::ChatError::MessageMissing`] when the
    /// message was deleted; the caller republishes and migrates the id.
    async fn edit_card(
        &self,
        channel: &ChannelId,
        message: &MessageId,
        card: &OrderCard,
    ) -> ChatResult<()>;

    /// Whether a previously published message still exists.
    async fn message_exists(&self, channel: &ChannelId, message: &MessageId) -> ChatResult<bool>;

    /// Whether the channel can still be fetched and posted to.
    async fn channel_accessible(&self, channel: &ChannelId) -> ChatResult<bool>;

    /// Resolve the single group member holding `role` who can also see
    /// `channel`. Zero or multiple candidates resolve to no notifier.
    async fn resolve_notifier(
        &self,
        group: &GroupId,
        channel: &ChannelId,
        role: &RoleId,
    ) -> ChatResult<Option<UserId>>;

    /// Send a direct message to a user.
    async fn direct_message(&self, user: &UserId, text: &str) -> ChatResult<()>;
}
