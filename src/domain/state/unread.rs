//! Derived per-channel unread state.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::trace;

use crate::domain::entities::{Channel, ChannelId, ChannelUnread, Message, MessageId, UserId};

/// Tracks which channels carry unread activity for the session user.
///
/// Entries are created lazily the first time a message or acknowledgement
/// references a channel, and are only discarded at teardown. A channel with
/// no entry but a known last message counts as unread.
#[derive(Default)]
pub struct UnreadTracker {
    entries: RwLock<HashMap<ChannelId, ChannelUnread>>,
}

impl UnreadTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the tracker from a fetched unread list.
    pub fn load(&self, unreads: impl IntoIterator<Item = ChannelUnread>) {
        let mut guard = self.entries.write();
        for unread in unreads {
            guard.insert(unread.id.channel.clone(), unread);
        }
    }

    /// Folds an incoming message into the tracker.
    ///
    /// An untracked channel bootstraps its entry acknowledging the message
    /// itself, so a channel is never unread against the first message seen
    /// live. Mentions of `local_user` accumulate; repeated mention ids are
    /// de-duplicated so a misbehaving server cannot inflate the badge count.
    pub fn observe_message(&self, message: &Message, local_user: Option<&UserId>) {
        let mentioned = local_user.is_some_and(|user| message.mentions_user(user));

        let mut guard = self.entries.write();
        if let Some(entry) = guard.get_mut(&message.channel) {
            if mentioned {
                let mentions = entry.mentions.get_or_insert_with(Vec::new);
                if !mentions.contains(&message.id) {
                    mentions.push(message.id.clone());
                }
            }
            return;
        }

        trace!(channel = %message.channel, "bootstrapping unread entry");
        let mut entry = ChannelUnread::new(
            message.channel.clone(),
            local_user.cloned().unwrap_or_default(),
            Some(message.id.clone()),
        );
        if mentioned {
            entry.mentions = Some(vec![message.id.clone()]);
        }
        guard.insert(message.channel.clone(), entry);
    }

    /// Records an acknowledgement up to `message_id`, clearing mentions.
    pub fn acknowledge(&self, channel: &ChannelId, user: &UserId, message_id: MessageId) {
        let mut guard = self.entries.write();
        match guard.get_mut(channel) {
            Some(entry) => {
                entry.last_id = Some(message_id);
                entry.mentions = None;
            }
            None => {
                guard.insert(
                    channel.clone(),
                    ChannelUnread::new(channel.clone(), user.clone(), Some(message_id)),
                );
            }
        }
    }

    /// Whether `channel` has activity past the last acknowledgement.
    ///
    /// Saved-messages and voice channels are never unread. Otherwise the
    /// channel is unread iff its last message sorts strictly after the
    /// acknowledged id, or no acknowledgement is known at all.
    #[must_use]
    pub fn is_unread(&self, channel: &Channel) -> bool {
        if !channel.tracks_unread() {
            return false;
        }
        let Some(last_message_id) = channel.last_message_id() else {
            return false;
        };

        self.entries
            .read()
            .get(channel.id())
            .is_none_or(|entry| match &entry.last_id {
                Some(acknowledged) => acknowledged < last_message_id,
                None => true,
            })
    }

    /// Outstanding mention ids for `channel`.
    #[must_use]
    pub fn mentions(&self, channel: &ChannelId) -> Vec<MessageId> {
        self.entries
            .read()
            .get(channel)
            .and_then(|entry| entry.mentions.clone())
            .unwrap_or_default()
    }

    /// Number of outstanding mentions for `channel`.
    #[must_use]
    pub fn mention_count(&self, channel: &ChannelId) -> usize {
        self.entries
            .read()
            .get(channel)
            .map_or(0, ChannelUnread::mention_count)
    }

    /// Clones the tracked entry for `channel`.
    #[must_use]
    pub fn get(&self, channel: &ChannelId) -> Option<ChannelUnread> {
        self.entries.read().get(channel).cloned()
    }

    /// Number of tracked channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no channel is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Discards every entry. Used only at teardown.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
