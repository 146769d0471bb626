//! User entity, presence, and relationship state.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::UserId;

bitflags! {
    /// Platform moderation flags attached to a user account.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UserFlags: u32 {
        /// Account has been suspended by the platform.
        const SUSPENDED = 1;
        /// Account was deleted by its owner.
        const DELETED = 2;
        /// Account has been banned from the platform.
        const BANNED = 4;
    }
}

/// Presence shown next to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Presence {
    /// Actively online.
    Online,
    /// Away from keyboard.
    Idle,
    /// Online, only mention notifications.
    Focus,
    /// Do not disturb.
    Busy,
    /// Appears offline.
    Invisible,
}

/// Custom status of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatus {
    /// Free-form status text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Selected presence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<Presence>,
}

/// Relationship between the session user and another user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relationship {
    /// No relationship.
    None,
    /// The session user themselves.
    User,
    /// Mutual friends.
    Friend,
    /// Friend request sent by us.
    Outgoing,
    /// Friend request sent to us.
    Incoming,
    /// We blocked them.
    Blocked,
    /// They blocked us.
    BlockedOther,
}

/// Profile section of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Profile bio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Profile background attachment reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

/// A user known to the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    #[serde(rename = "_id")]
    pub id: UserId,
    /// Account name.
    pub username: String,
    /// Four-digit tag disambiguating equal usernames.
    #[serde(default)]
    pub discriminator: String,
    /// Preferred display name, when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Avatar attachment reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Whether the user is currently connected.
    #[serde(default)]
    pub online: bool,
    /// Custom status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
    /// Relationship to the session user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<Relationship>,
    /// Profile, when fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
    /// Raw platform moderation flags, see [`UserFlags`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<u32>,
    /// Raw badge bits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badges: Option<u32>,
}

/// Partial user payload carried by update events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<Relationship>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badges: Option<u32>,
}

/// Optional user fields a server may instruct the client to unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldsUser {
    Avatar,
    StatusText,
    StatusPresence,
    ProfileContent,
    ProfileBackground,
    DisplayName,
}

impl User {
    /// Creates the minimal user record inserted when a relationship event
    /// arrives for a user the session has never seen.
    #[must_use]
    pub fn with_relationship(id: UserId, relationship: Relationship) -> Self {
        Self {
            id,
            username: String::new(),
            discriminator: String::new(),
            display_name: None,
            avatar: None,
            online: false,
            status: None,
            relationship: Some(relationship),
            profile: None,
            flags: None,
            badges: None,
        }
    }

    /// Name to render for this user.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }

    /// Typed view of the raw flag bits.
    #[must_use]
    pub fn user_flags(&self) -> UserFlags {
        UserFlags::from_bits_truncate(self.flags.unwrap_or(0))
    }

    /// Applies a partial update, unsetting `clear` fields first.
    ///
    /// A field named in `clear` is never re-assigned from `data` within the
    /// same batch. Clears of status or profile sub-fields are no-ops when the
    /// parent is unset. Returns the names of fields that changed.
    pub fn apply_update(&mut self, data: PartialUser, clear: &[FieldsUser]) -> Vec<&'static str> {
        let mut changed = Vec::new();

        for field in clear {
            let effective = match field {
                FieldsUser::Avatar => self.avatar.take().is_some(),
                FieldsUser::DisplayName => self.display_name.take().is_some(),
                FieldsUser::StatusText => self
                    .status
                    .as_mut()
                    .is_some_and(|status| status.text.take().is_some()),
                FieldsUser::StatusPresence => self
                    .status
                    .as_mut()
                    .is_some_and(|status| status.presence.take().is_some()),
                FieldsUser::ProfileContent => self
                    .profile
                    .as_mut()
                    .is_some_and(|profile| profile.content.take().is_some()),
                FieldsUser::ProfileBackground => self
                    .profile
                    .as_mut()
                    .is_some_and(|profile| profile.background.take().is_some()),
            };
            if effective {
                changed.push(field.name());
            }
        }

        if let Some(username) = data.username {
            self.username = username;
            changed.push("username");
        }
        if let Some(discriminator) = data.discriminator {
            self.discriminator = discriminator;
            changed.push("discriminator");
        }
        if !clear.contains(&FieldsUser::DisplayName)
            && let Some(display_name) = data.display_name
        {
            self.display_name = Some(display_name);
            changed.push("display_name");
        }
        if !clear.contains(&FieldsUser::Avatar)
            && let Some(avatar) = data.avatar
        {
            self.avatar = Some(avatar);
            changed.push("avatar");
        }
        if let Some(online) = data.online {
            self.online = online;
            changed.push("online");
        }
        if let Some(mut status) = data.status {
            if clear.contains(&FieldsUser::StatusText) {
                status.text = None;
            }
            if clear.contains(&FieldsUser::StatusPresence) {
                status.presence = None;
            }
            self.status = Some(status);
            changed.push("status");
        }
        if let Some(relationship) = data.relationship {
            self.relationship = Some(relationship);
            changed.push("relationship");
        }
        if let Some(mut profile) = data.profile {
            if clear.contains(&FieldsUser::ProfileContent) {
                profile.content = None;
            }
            if clear.contains(&FieldsUser::ProfileBackground) {
                profile.background = None;
            }
            self.profile = Some(profile);
            changed.push("profile");
        }
        if let Some(flags) = data.flags {
            self.flags = Some(flags);
            changed.push("flags");
        }
        if let Some(badges) = data.badges {
            self.badges = Some(badges);
            changed.push("badges");
        }

        changed
    }
}

impl FieldsUser {
    const fn name(self) -> &'static str {
        match self {
            Self::Avatar => "avatar",
            Self::StatusText => "status.text",
            Self::StatusPresence => "status.presence",
            Self::ProfileContent => "profile.content",
            Self::ProfileBackground => "profile.background",
            Self::DisplayName => "display_name",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: UserId::from("01USER"),
            username: "willow".into(),
            discriminator: "1234".into(),
            display_name: Some("Willow".into()),
            avatar: Some("attachment".into()),
            online: true,
            status: Some(UserStatus {
                text: Some("brb".into()),
                presence: Some(Presence::Idle),
            }),
            relationship: None,
            profile: None,
            flags: None,
            badges: None,
        }
    }

    #[test]
    fn test_clear_wins_over_data_for_same_field() {
        let mut user = sample_user();
        let data = PartialUser {
            avatar: Some("replacement".into()),
            ..PartialUser::default()
        };

        user.apply_update(data, &[FieldsUser::Avatar]);
        assert_eq!(user.avatar, None);
    }

    #[test]
    fn test_status_subfield_clear() {
        let mut user = sample_user();
        let changed = user.apply_update(PartialUser::default(), &[FieldsUser::StatusText]);

        assert_eq!(changed, vec!["status.text"]);
        let status = user.status.unwrap();
        assert_eq!(status.text, None);
        assert_eq!(status.presence, Some(Presence::Idle));
    }

    #[test]
    fn test_status_clear_without_status_is_noop() {
        let mut user = sample_user();
        user.status = None;

        let changed = user.apply_update(PartialUser::default(), &[FieldsUser::StatusPresence]);
        assert!(changed.is_empty());
        assert_eq!(user.status, None);
    }

    #[test]
    fn test_profile_subfield_clear_without_profile_is_noop() {
        let mut user = sample_user();
        let changed = user.apply_update(PartialUser::default(), &[FieldsUser::ProfileContent]);
        assert!(changed.is_empty());
    }

    #[test]
    fn test_data_assignment_reports_changed_fields() {
        let mut user = sample_user();
        let data = PartialUser {
            display_name: Some("Willow the Second".into()),
            online: Some(false),
            ..PartialUser::default()
        };

        let changed = user.apply_update(data, &[]);
        assert_eq!(changed, vec!["display_name", "online"]);
        assert_eq!(user.display_name(), "Willow the Second");
        assert!(!user.online);
    }

    #[test]
    fn test_minimal_relationship_user() {
        let user = User::with_relationship(UserId::from("01USER"), Relationship::Incoming);
        assert_eq!(user.relationship, Some(Relationship::Incoming));
        assert!(user.username.is_empty());
    }

    #[test]
    fn test_user_flags_truncate_unknown_bits() {
        let mut user = sample_user();
        user.flags = Some(1 | 8);
        assert_eq!(user.user_flags(), UserFlags::SUSPENDED);
    }
}
