//! REST collaborator port definition.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::entities::{
    Channel, ChannelId, ChannelUnread, Member, MemberKey, Message, MessageId, Server, ServerId,
    User, UserId,
};
use crate::domain::errors::ApiError;

/// Per-key synced settings value: a last-writer-wins revision counter paired
/// with an opaque payload.
pub type UserSettings = HashMap<String, (i64, String)>;

/// Options for querying message history.
#[derive(Debug, Clone, Default)]
#[allow(missing_docs)]
pub struct MessageQuery {
    pub limit: Option<u32>,
    pub before: Option<MessageId>,
    pub after: Option<MessageId>,
}

impl MessageQuery {
    /// Caps the number of returned messages.
    #[must_use]
    pub const fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(if limit < 100 { limit } else { 100 });
        self
    }

    /// Only messages older than `message_id`.
    #[must_use]
    pub fn before_message(mut self, message_id: MessageId) -> Self {
        self.before = Some(message_id);
        self
    }

    /// Only messages newer than `message_id`.
    #[must_use]
    pub fn after_message(mut self, message_id: MessageId) -> Self {
        self.after = Some(message_id);
        self
    }
}

/// Port for the request/response side of the chat service.
///
/// Entity responses from these calls must be merged into the entity caches
/// through the same insert/patch primitives the event reducer uses; the
/// client facade owns that merge.
#[async_trait]
pub trait ApiPort: Send + Sync {
    /// Replaces the session token used for subsequent requests.
    fn set_token(&self, token: Option<&str>);

    /// Fetches a user by id.
    async fn fetch_user(&self, id: &UserId) -> Result<User, ApiError>;

    /// Fetches a channel by id.
    async fn fetch_channel(&self, id: &ChannelId) -> Result<Channel, ApiError>;

    /// Fetches a server by id.
    async fn fetch_server(&self, id: &ServerId) -> Result<Server, ApiError>;

    /// Fetches a server member by composite key.
    async fn fetch_member(&self, key: &MemberKey) -> Result<Member, ApiError>;

    /// Queries message history of a channel.
    async fn query_messages(
        &self,
        channel: &ChannelId,
        query: MessageQuery,
    ) -> Result<Vec<Message>, ApiError>;

    /// Fetches the unread state of every channel.
    async fn fetch_unreads(&self) -> Result<Vec<ChannelUnread>, ApiError>;

    /// Sends a message to a channel.
    async fn send_message(&self, channel: &ChannelId, content: &str) -> Result<Message, ApiError>;

    /// Edits a previously sent message.
    async fn edit_message(
        &self,
        channel: &ChannelId,
        id: &MessageId,
        content: &str,
    ) -> Result<Message, ApiError>;

    /// Deletes a message.
    async fn delete_message(&self, channel: &ChannelId, id: &MessageId) -> Result<(), ApiError>;

    /// Fetches synced settings for the given keys.
    async fn fetch_settings(&self, keys: &[&str]) -> Result<UserSettings, ApiError>;

    /// Stores synced settings.
    async fn set_settings(&self, settings: &UserSettings) -> Result<(), ApiError>;
}
