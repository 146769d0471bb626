//! Per-channel unread state entity.

use serde::{Deserialize, Serialize};

use super::{ChannelId, MessageId, UserId};

/// Composite key pointing at one user's view of one channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelCompositeKey {
    /// Channel half of the key.
    pub channel: ChannelId,
    /// User half of the key.
    pub user: UserId,
}

/// The state of a channel from the perspective of one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelUnread {
    /// Composite key.
    #[serde(rename = "_id")]
    pub id: ChannelCompositeKey,
    /// Last message the user acknowledged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_id: Option<MessageId>,
    /// Outstanding messages that mention the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentions: Option<Vec<MessageId>>,
}

impl ChannelUnread {
    /// Creates an unread entry acknowledging up to `last_id`.
    #[must_use]
    pub fn new(channel: ChannelId, user: UserId, last_id: Option<MessageId>) -> Self {
        Self {
            id: ChannelCompositeKey { channel, user },
            last_id,
            mentions: None,
        }
    }

    /// Number of outstanding mentions.
    #[must_use]
    pub fn mention_count(&self) -> usize {
        self.mentions.as_ref().map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unread_wire_shape() {
        let unread: ChannelUnread = serde_json::from_str(
            r#"{
                "_id": { "channel": "01CHAN", "user": "01USER" },
                "last_id": "01MSG"
            }"#,
        )
        .unwrap();

        assert_eq!(unread.id.channel, ChannelId::from("01CHAN"));
        assert_eq!(unread.last_id, Some(MessageId::from("01MSG")));
        assert_eq!(unread.mention_count(), 0);
    }
}
