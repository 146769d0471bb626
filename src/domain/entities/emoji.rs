//! Custom emoji entity.

use serde::{Deserialize, Serialize};

use super::{EmojiId, ServerId, UserId};

/// Where an emoji lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EmojiParent {
    /// Uploaded to a server.
    Server {
        /// Owning server.
        id: ServerId,
    },
    /// No longer attached anywhere.
    Detached,
}

/// A custom emoji. The protocol only creates and deletes emojis; there is no
/// partial update variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emoji {
    /// Unique identifier.
    #[serde(rename = "_id")]
    pub id: EmojiId,
    /// Where the emoji lives.
    pub parent: EmojiParent,
    /// Uploader.
    pub creator_id: UserId,
    /// Name used to type the emoji.
    pub name: String,
    /// Whether the emoji is animated.
    #[serde(default)]
    pub animated: bool,
}

impl Emoji {
    /// Owning server, when attached to one.
    #[must_use]
    pub const fn server_id(&self) -> Option<&ServerId> {
        match &self.parent {
            EmojiParent::Server { id } => Some(id),
            EmojiParent::Detached => None,
        }
    }
}
