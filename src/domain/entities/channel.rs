//! Channel entity, a tagged union over the channel kinds.

use serde::{Deserialize, Serialize};

use super::{ChannelId, MessageId, ServerId, UserId};
use crate::domain::entities::server::OverrideField;

/// A channel the session user can see.
///
/// The wire discriminant is `channel_type`. Saved-messages and voice channels
/// do not track a last message; direct messages and groups carry a recipient
/// list instead of a server reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel_type")]
pub enum Channel {
    /// Personal notepad channel.
    SavedMessages {
        /// Unique identifier.
        #[serde(rename = "_id")]
        id: ChannelId,
        /// Owning user.
        user: UserId,
    },
    /// One-to-one conversation.
    DirectMessage {
        /// Unique identifier.
        #[serde(rename = "_id")]
        id: ChannelId,
        /// Whether the conversation is shown in the sidebar.
        #[serde(default)]
        active: bool,
        /// Both participants.
        recipients: Vec<UserId>,
        /// Most recent message.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_message_id: Option<MessageId>,
    },
    /// Private multi-user conversation.
    Group {
        /// Unique identifier.
        #[serde(rename = "_id")]
        id: ChannelId,
        /// Group name.
        name: String,
        /// Owning user.
        owner: UserId,
        /// Group description.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        /// Current participants.
        recipients: Vec<UserId>,
        /// Icon attachment reference.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        icon: Option<String>,
        /// Most recent message.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_message_id: Option<MessageId>,
        /// Permissions granted to participants.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        permissions: Option<i64>,
        /// Whether the group is marked as NSFW.
        #[serde(default)]
        nsfw: bool,
    },
    /// Text channel within a server.
    TextChannel {
        /// Unique identifier.
        #[serde(rename = "_id")]
        id: ChannelId,
        /// Owning server.
        server: ServerId,
        /// Channel name.
        name: String,
        /// Channel description.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        /// Icon attachment reference.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        icon: Option<String>,
        /// Most recent message.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_message_id: Option<MessageId>,
        /// Default permission override for the channel.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_permissions: Option<OverrideField>,
        /// Whether the channel is marked as NSFW.
        #[serde(default)]
        nsfw: bool,
    },
    /// Voice channel within a server.
    VoiceChannel {
        /// Unique identifier.
        #[serde(rename = "_id")]
        id: ChannelId,
        /// Owning server.
        server: ServerId,
        /// Channel name.
        name: String,
        /// Channel description.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        /// Icon attachment reference.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        icon: Option<String>,
        /// Default permission override for the channel.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_permissions: Option<OverrideField>,
        /// Whether the channel is marked as NSFW.
        #[serde(default)]
        nsfw: bool,
    },
}

/// Partial channel payload carried by update events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct PartialChannel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_permissions: Option<OverrideField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nsfw: Option<bool>,
}

/// Optional channel fields a server may instruct the client to unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum FieldsChannel {
    Description,
    Icon,
    DefaultPermissions,
}

impl Channel {
    /// Unique identifier of the channel, regardless of kind.
    #[must_use]
    pub const fn id(&self) -> &ChannelId {
        match self {
            Self::SavedMessages { id, .. }
            | Self::DirectMessage { id, .. }
            | Self::Group { id, .. }
            | Self::TextChannel { id, .. }
            | Self::VoiceChannel { id, .. } => id,
        }
    }

    /// Owning server, for server channels.
    #[must_use]
    pub const fn server_id(&self) -> Option<&ServerId> {
        match self {
            Self::TextChannel { server, .. } | Self::VoiceChannel { server, .. } => Some(server),
            _ => None,
        }
    }

    /// Most recent message, for kinds that track one.
    #[must_use]
    pub const fn last_message_id(&self) -> Option<&MessageId> {
        match self {
            Self::DirectMessage {
                last_message_id, ..
            }
            | Self::Group {
                last_message_id, ..
            }
            | Self::TextChannel {
                last_message_id, ..
            } => last_message_id.as_ref(),
            Self::SavedMessages { .. } | Self::VoiceChannel { .. } => None,
        }
    }

    /// Whether this kind participates in unread tracking.
    #[must_use]
    pub const fn tracks_unread(&self) -> bool {
        !matches!(self, Self::SavedMessages { .. } | Self::VoiceChannel { .. })
    }

    /// Records a new latest message. No-op for kinds without a last message.
    pub fn set_last_message_id(&mut self, message_id: MessageId) -> bool {
        match self {
            Self::DirectMessage {
                last_message_id, ..
            }
            | Self::Group {
                last_message_id, ..
            }
            | Self::TextChannel {
                last_message_id, ..
            } => {
                *last_message_id = Some(message_id);
                true
            }
            Self::SavedMessages { .. } | Self::VoiceChannel { .. } => false,
        }
    }

    /// Adds a user to a group's recipients. No-op for other kinds or when
    /// the user is already present.
    pub fn group_join(&mut self, user: UserId) -> bool {
        match self {
            Self::Group { recipients, .. } if !recipients.contains(&user) => {
                recipients.push(user);
                true
            }
            _ => false,
        }
    }

    /// Removes a user from a group's recipients. No-op for other kinds or
    /// when the user is absent.
    pub fn group_leave(&mut self, user: &UserId) -> bool {
        match self {
            Self::Group { recipients, .. } => {
                let before = recipients.len();
                recipients.retain(|recipient| recipient != user);
                recipients.len() != before
            }
            _ => false,
        }
    }

    /// Applies a partial update, unsetting `clear` fields first.
    ///
    /// Clear targets only exist on group, text, and voice channels; applying
    /// them to other kinds is a no-op by variant exclusion, not an error. A
    /// field named in `clear` is never re-assigned from `data` within the
    /// same batch. Returns the names of fields that changed.
    pub fn apply_update(
        &mut self,
        data: PartialChannel,
        clear: &[FieldsChannel],
    ) -> Vec<&'static str> {
        let mut changed = Vec::new();

        for field in clear {
            let effective = match field {
                FieldsChannel::Description => match self {
                    Self::Group { description, .. }
                    | Self::TextChannel { description, .. }
                    | Self::VoiceChannel { description, .. } => description.take().is_some(),
                    _ => false,
                },
                FieldsChannel::Icon => match self {
                    Self::Group { icon, .. }
                    | Self::TextChannel { icon, .. }
                    | Self::VoiceChannel { icon, .. } => icon.take().is_some(),
                    _ => false,
                },
                FieldsChannel::DefaultPermissions => match self {
                    Self::TextChannel {
                        default_permissions,
                        ..
                    }
                    | Self::VoiceChannel {
                        default_permissions,
                        ..
                    } => default_permissions.take().is_some(),
                    _ => false,
                },
            };
            if effective {
                changed.push(field.name());
            }
        }

        if let Some(new_name) = data.name {
            match self {
                Self::Group { name, .. }
                | Self::TextChannel { name, .. }
                | Self::VoiceChannel { name, .. } => {
                    *name = new_name;
                    changed.push("name");
                }
                _ => {}
            }
        }
        if let Some(new_owner) = data.owner
            && let Self::Group { owner, .. } = self
        {
            *owner = new_owner;
            changed.push("owner");
        }
        if !clear.contains(&FieldsChannel::Description)
            && let Some(new_description) = data.description
        {
            match self {
                Self::Group { description, .. }
                | Self::TextChannel { description, .. }
                | Self::VoiceChannel { description, .. } => {
                    *description = Some(new_description);
                    changed.push("description");
                }
                _ => {}
            }
        }
        if !clear.contains(&FieldsChannel::Icon)
            && let Some(new_icon) = data.icon
        {
            match self {
                Self::Group { icon, .. }
                | Self::TextChannel { icon, .. }
                | Self::VoiceChannel { icon, .. } => {
                    *icon = Some(new_icon);
                    changed.push("icon");
                }
                _ => {}
            }
        }
        if !clear.contains(&FieldsChannel::DefaultPermissions)
            && let Some(new_default_permissions) = data.default_permissions
        {
            match self {
                Self::TextChannel {
                    default_permissions,
                    ..
                }
                | Self::VoiceChannel {
                    default_permissions,
                    ..
                } => {
                    *default_permissions = Some(new_default_permissions);
                    changed.push("default_permissions");
                }
                _ => {}
            }
        }
        if let Some(new_permissions) = data.permissions
            && let Self::Group { permissions, .. } = self
        {
            *permissions = Some(new_permissions);
            changed.push("permissions");
        }
        if let Some(new_active) = data.active
            && let Self::DirectMessage { active, .. } = self
        {
            *active = new_active;
            changed.push("active");
        }
        if let Some(new_last_message_id) = data.last_message_id
            && self.set_last_message_id(new_last_message_id)
        {
            changed.push("last_message_id");
        }
        if let Some(new_nsfw) = data.nsfw {
            match self {
                Self::Group { nsfw, .. }
                | Self::TextChannel { nsfw, .. }
                | Self::VoiceChannel { nsfw, .. } => {
                    *nsfw = new_nsfw;
                    changed.push("nsfw");
                }
                _ => {}
            }
        }

        changed
    }
}

impl FieldsChannel {
    const fn name(self) -> &'static str {
        match self {
            Self::Description => "description",
            Self::Icon => "icon",
            Self::DefaultPermissions => "default_permissions",
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn text_channel() -> Channel {
        Channel::TextChannel {
            id: ChannelId::from("01CHAN"),
            server: ServerId::from("01SERVER"),
            name: "general".into(),
            description: Some("talk".into()),
            icon: Some("icon".into()),
            last_message_id: None,
            default_permissions: None,
            nsfw: false,
        }
    }

    fn group(recipients: Vec<UserId>) -> Channel {
        Channel::Group {
            id: ChannelId::from("01GROUP"),
            name: "trio".into(),
            owner: UserId::from("01OWNER"),
            description: None,
            recipients,
            icon: None,
            last_message_id: None,
            permissions: None,
            nsfw: false,
        }
    }

    fn saved_messages() -> Channel {
        Channel::SavedMessages {
            id: ChannelId::from("01SAVED"),
            user: UserId::from("01USER"),
        }
    }

    fn voice_channel() -> Channel {
        Channel::VoiceChannel {
            id: ChannelId::from("01VOICE"),
            server: ServerId::from("01SERVER"),
            name: "voice".into(),
            description: None,
            icon: None,
            default_permissions: None,
            nsfw: false,
        }
    }

    #[test_case(text_channel(), true; "text tracks unread")]
    #[test_case(group(vec![]), true; "group tracks unread")]
    #[test_case(saved_messages(), false; "saved messages never unread")]
    #[test_case(voice_channel(), false; "voice never unread")]
    fn test_tracks_unread(channel: Channel, expected: bool) {
        assert_eq!(channel.tracks_unread(), expected);
    }

    #[test]
    fn test_set_last_message_id_skips_voice() {
        let mut channel = voice_channel();
        assert!(!channel.set_last_message_id(MessageId::from("01MSG")));
        assert_eq!(channel.last_message_id(), None);
    }

    #[test]
    fn test_update_name_and_clear_icon() {
        let mut channel = text_channel();
        let data = PartialChannel {
            name: Some("renamed".into()),
            ..PartialChannel::default()
        };

        let changed = channel.apply_update(data, &[FieldsChannel::Icon]);
        assert_eq!(changed, vec!["icon", "name"]);

        let Channel::TextChannel {
            name,
            icon,
            description,
            ..
        } = channel
        else {
            panic!("kind changed");
        };
        assert_eq!(name, "renamed");
        assert_eq!(icon, None);
        assert_eq!(description.as_deref(), Some("talk"));
    }

    #[test]
    fn test_clear_on_saved_messages_is_noop() {
        let mut channel = saved_messages();
        let changed = channel.apply_update(PartialChannel::default(), &[FieldsChannel::Icon]);
        assert!(changed.is_empty());
    }

    #[test]
    fn test_group_join_and_leave() {
        let mut channel = group(vec![UserId::from("01A")]);

        assert!(channel.group_join(UserId::from("01B")));
        assert!(!channel.group_join(UserId::from("01B")));
        assert!(channel.group_leave(&UserId::from("01A")));
        assert!(!channel.group_leave(&UserId::from("01A")));

        let Channel::Group { recipients, .. } = channel else {
            panic!("kind changed");
        };
        assert_eq!(recipients, vec![UserId::from("01B")]);
    }

    #[test]
    fn test_group_join_on_text_channel_is_noop() {
        let mut channel = text_channel();
        assert!(!channel.group_join(UserId::from("01A")));
    }
}
