//! Server member entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MemberKey, RoleId};
use crate::domain::entities::Server;

/// A user's membership of one server, keyed by [`MemberKey`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// Composite identifier.
    #[serde(rename = "_id")]
    pub id: MemberKey,
    /// When the user joined the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<Utc>>,
    /// Per-server nickname.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    /// Per-server avatar attachment reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Roles held by the member.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<RoleId>>,
    /// Until when the member is timed out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<DateTime<Utc>>,
}

/// Partial member payload carried by update events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct PartialMember {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<RoleId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<DateTime<Utc>>,
}

/// Optional member fields a server may instruct the client to unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum FieldsMember {
    Nickname,
    Avatar,
    Roles,
    Timeout,
}

impl Member {
    /// Creates the bare membership record inserted when a join event arrives.
    #[must_use]
    pub fn new(id: MemberKey) -> Self {
        Self {
            id,
            joined_at: Some(Utc::now()),
            nickname: None,
            avatar: None,
            roles: None,
            timeout: None,
        }
    }

    /// Applies a partial update, unsetting `clear` fields first.
    ///
    /// A field named in `clear` is never re-assigned from `data` within the
    /// same batch. Returns the names of fields that changed.
    pub fn apply_update(
        &mut self,
        data: PartialMember,
        clear: &[FieldsMember],
    ) -> Vec<&'static str> {
        let mut changed = Vec::new();

        for field in clear {
            let effective = match field {
                FieldsMember::Nickname => self.nickname.take().is_some(),
                FieldsMember::Avatar => self.avatar.take().is_some(),
                FieldsMember::Roles => self.roles.take().is_some(),
                FieldsMember::Timeout => self.timeout.take().is_some(),
            };
            if effective {
                changed.push(field.name());
            }
        }

        if !clear.contains(&FieldsMember::Nickname)
            && let Some(nickname) = data.nickname
        {
            self.nickname = Some(nickname);
            changed.push("nickname");
        }
        if !clear.contains(&FieldsMember::Avatar)
            && let Some(avatar) = data.avatar
        {
            self.avatar = Some(avatar);
            changed.push("avatar");
        }
        if !clear.contains(&FieldsMember::Roles)
            && let Some(roles) = data.roles
        {
            self.roles = Some(roles);
            changed.push("roles");
        }
        if !clear.contains(&FieldsMember::Timeout)
            && let Some(timeout) = data.timeout
        {
            self.timeout = Some(timeout);
            changed.push("timeout");
        }

        changed
    }

    /// Roles held by the member, empty when unset.
    #[must_use]
    pub fn roles(&self) -> &[RoleId] {
        self.roles.as_deref().unwrap_or_default()
    }

    /// Display colour contributed by the member's roles within `server`.
    #[must_use]
    pub fn role_colour<'s>(&self, server: &'s Server) -> Option<&'s str> {
        server.role_colour(self.roles())
    }
}

impl FieldsMember {
    const fn name(self) -> &'static str {
        match self {
            Self::Nickname => "nickname",
            Self::Avatar => "avatar",
            Self::Roles => "roles",
            Self::Timeout => "timeout",
        }
    }
}
