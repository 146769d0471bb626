//! Locally mirrored chat state.

mod cache;
mod unread;

pub use cache::{Cache, CacheChange};
pub use unread::UnreadTracker;

use parking_lot::RwLock;

use crate::domain::entities::{
    Channel, ChannelId, Emoji, EmojiId, Member, MemberKey, Server, ServerId, User, UserId,
};

/// The five entity caches plus derived unread state.
///
/// Exclusively owned by the client facade; the event reducer and REST-merge
/// paths are the only writers. Everything else reads and subscribes.
pub struct ClientState {
    /// Known users.
    pub users: Cache<UserId, User>,
    /// Joined servers.
    pub servers: Cache<ServerId, Server>,
    /// Visible channels.
    pub channels: Cache<ChannelId, Channel>,
    /// Server memberships, keyed by the composite member key.
    pub members: Cache<MemberKey, Member>,
    /// Custom emojis.
    pub emojis: Cache<EmojiId, Emoji>,
    /// Derived unread state.
    pub unreads: UnreadTracker,
    current_user: RwLock<Option<UserId>>,
}

impl ClientState {
    /// Creates an empty mirror.
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: Cache::new("users"),
            servers: Cache::new("servers"),
            channels: Cache::new("channels"),
            members: Cache::new("members"),
            emojis: Cache::new("emojis"),
            unreads: UnreadTracker::new(),
            current_user: RwLock::new(None),
        }
    }

    /// Records which user this session belongs to.
    pub fn set_current_user(&self, user: Option<UserId>) {
        *self.current_user.write() = user;
    }

    /// User this session belongs to, once known.
    #[must_use]
    pub fn current_user(&self) -> Option<UserId> {
        self.current_user.read().clone()
    }

    /// Discards all mirrored state. Used on logout and teardown.
    pub fn clear_all(&self) {
        self.users.clear();
        self.servers.clear();
        self.channels.clear();
        self.members.clear();
        self.emojis.clear();
        self.unreads.clear();
        self.set_current_user(None);
    }
}

impl Default for ClientState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_all_resets_everything() {
        let state = ClientState::new();
        state.set_current_user(Some(UserId::from("01ME")));
        state.users.insert(
            UserId::from("01ME"),
            User::with_relationship(
                UserId::from("01ME"),
                crate::domain::entities::Relationship::User,
            ),
        );

        state.clear_all();
        assert!(state.users.is_empty());
        assert!(state.unreads.is_empty());
        assert_eq!(state.current_user(), None);
    }
}
