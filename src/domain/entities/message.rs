//! Message payloads carried by the event stream.
//!
//! Messages are not cached by the synchronization engine; these types exist
//! so the reducer can bump channel state and feed the unread tracker, and so
//! consumers receive fully typed message events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ChannelId, MessageId, UserId};

/// A chat message as delivered by the event stream or history queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier, time-sortable.
    #[serde(rename = "_id")]
    pub id: MessageId,
    /// Channel the message was sent to.
    pub channel: ChannelId,
    /// Author of the message.
    pub author: UserId,
    /// Text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Users mentioned by the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentions: Option<Vec<UserId>>,
    /// Messages this one replies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replies: Option<Vec<MessageId>>,
    /// When the message was last edited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited: Option<DateTime<Utc>>,
}

/// Partial message payload carried by edit events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct PartialMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited: Option<DateTime<Utc>>,
}

/// Fields appended to an existing message by an append event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppendMessage {
    /// Embeds unfurled after the message was delivered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embeds: Option<Vec<serde_json::Value>>,
}

impl Message {
    /// Whether the message mentions `user`.
    #[must_use]
    pub fn mentions_user(&self, user: &UserId) -> bool {
        self.mentions
            .as_ref()
            .is_some_and(|mentions| mentions.contains(user))
    }
}
