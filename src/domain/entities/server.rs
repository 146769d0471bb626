//! Server entity, roles, and categories.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{ChannelId, RoleId, ServerId, UserId};

/// Allow/deny permission override pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideField {
    /// Allowed permission bits.
    #[serde(default)]
    pub a: i64,
    /// Denied permission bits.
    #[serde(default)]
    pub d: i64,
}

/// A role grantable to server members.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Role {
    /// Role name.
    #[serde(default)]
    pub name: String,
    /// Display colour, any CSS colour expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colour: Option<String>,
    /// Permission override granted by the role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<OverrideField>,
    /// Whether members holding the role are shown separately.
    #[serde(default)]
    pub hoist: bool,
    /// Ordering rank; lower values take precedence.
    #[serde(default)]
    pub rank: i64,
}

/// Partial role payload carried by role update events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct PartialRole {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colour: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<OverrideField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hoist: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<i64>,
}

/// Optional role fields a server may instruct the client to unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum FieldsRole {
    Colour,
}

/// An ordered grouping of channels within a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Category identifier, unique within the server.
    pub id: String,
    /// Category title.
    pub title: String,
    /// Channels in display order.
    #[serde(default)]
    pub channels: Vec<ChannelId>,
}

/// Channels that receive join/leave/kick/ban notices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemMessages {
    /// Channel receiving join notices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_joined: Option<ChannelId>,
    /// Channel receiving leave notices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_left: Option<ChannelId>,
    /// Channel receiving kick notices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_kicked: Option<ChannelId>,
    /// Channel receiving ban notices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_banned: Option<ChannelId>,
}

/// A server the session user is a member of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    /// Unique identifier.
    #[serde(rename = "_id")]
    pub id: ServerId,
    /// Owning user.
    pub owner: UserId,
    /// Server name.
    pub name: String,
    /// Server description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Channels belonging to the server.
    #[serde(default)]
    pub channels: Vec<ChannelId>,
    /// Ordered channel categories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<Category>>,
    /// System message routing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_messages: Option<SystemMessages>,
    /// Roles by identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<HashMap<RoleId, Role>>,
    /// Icon attachment reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Banner attachment reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    /// Raw server flag bits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<u32>,
}

/// Partial server payload carried by update events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct PartialServer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<ChannelId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<Category>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_messages: Option<SystemMessages>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<u32>,
}

/// Optional server fields a server may instruct the client to unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum FieldsServer {
    Description,
    Categories,
    SystemMessages,
    Icon,
    Banner,
}

impl Server {
    /// Applies a partial update, unsetting `clear` fields first.
    ///
    /// A field named in `clear` is never re-assigned from `data` within the
    /// same batch. Returns the names of fields that changed.
    pub fn apply_update(
        &mut self,
        data: PartialServer,
        clear: &[FieldsServer],
    ) -> Vec<&'static str> {
        let mut changed = Vec::new();

        for field in clear {
            let effective = match field {
                FieldsServer::Description => self.description.take().is_some(),
                FieldsServer::Categories => self.categories.take().is_some(),
                FieldsServer::SystemMessages => self.system_messages.take().is_some(),
                FieldsServer::Icon => self.icon.take().is_some(),
                FieldsServer::Banner => self.banner.take().is_some(),
            };
            if effective {
                changed.push(field.name());
            }
        }

        if let Some(owner) = data.owner {
            self.owner = owner;
            changed.push("owner");
        }
        if let Some(name) = data.name {
            self.name = name;
            changed.push("name");
        }
        if !clear.contains(&FieldsServer::Description)
            && let Some(description) = data.description
        {
            self.description = Some(description);
            changed.push("description");
        }
        if let Some(channels) = data.channels {
            self.channels = channels;
            changed.push("channels");
        }
        if !clear.contains(&FieldsServer::Categories)
            && let Some(categories) = data.categories
        {
            self.categories = Some(categories);
            changed.push("categories");
        }
        if !clear.contains(&FieldsServer::SystemMessages)
            && let Some(system_messages) = data.system_messages
        {
            self.system_messages = Some(system_messages);
            changed.push("system_messages");
        }
        if !clear.contains(&FieldsServer::Icon)
            && let Some(icon) = data.icon
        {
            self.icon = Some(icon);
            changed.push("icon");
        }
        if !clear.contains(&FieldsServer::Banner)
            && let Some(banner) = data.banner
        {
            self.banner = Some(banner);
            changed.push("banner");
        }
        if let Some(flags) = data.flags {
            self.flags = Some(flags);
            changed.push("flags");
        }

        changed
    }

    /// Patches a single role field by field, creating the role when the
    /// server has a role map but no entry for `role_id`.
    ///
    /// Returns `false` when nothing changed, including when the server has
    /// no role map at all.
    pub fn patch_role(
        &mut self,
        role_id: RoleId,
        data: PartialRole,
        clear: &[FieldsRole],
    ) -> bool {
        let Some(roles) = self.roles.as_mut() else {
            return false;
        };
        let role = roles.entry(role_id).or_default();
        let mut changed = false;

        if clear.contains(&FieldsRole::Colour) {
            changed |= role.colour.take().is_some();
        }

        if let Some(name) = data.name {
            role.name = name;
            changed = true;
        }
        if !clear.contains(&FieldsRole::Colour)
            && let Some(colour) = data.colour
        {
            role.colour = Some(colour);
            changed = true;
        }
        if let Some(permissions) = data.permissions {
            role.permissions = Some(permissions);
            changed = true;
        }
        if let Some(hoist) = data.hoist {
            role.hoist = hoist;
            changed = true;
        }
        if let Some(rank) = data.rank {
            role.rank = rank;
            changed = true;
        }

        changed
    }

    /// Removes a role from the server. No-op when the role map is unset or
    /// the role is unknown.
    pub fn remove_role(&mut self, role_id: &RoleId) -> bool {
        self.roles
            .as_mut()
            .is_some_and(|roles| roles.remove(role_id).is_some())
    }

    /// Resolves the display colour for a member holding `member_roles`.
    ///
    /// Picks the colour of the highest-ranked role (lowest `rank` value)
    /// among the member's roles that defines one.
    #[must_use]
    pub fn role_colour(&self, member_roles: &[RoleId]) -> Option<&str> {
        let roles = self.roles.as_ref()?;
        member_roles
            .iter()
            .filter_map(|id| roles.get(id))
            .filter(|role| role.colour.is_some())
            .min_by_key(|role| role.rank)
            .and_then(|role| role.colour.as_deref())
    }
}

impl FieldsServer {
    const fn name(self) -> &'static str {
        match self {
            Self::Description => "description",
            Self::Categories => "categories",
            Self::SystemMessages => "system_messages",
            Self::Icon => "icon",
            Self::Banner => "banner",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_server() -> Server {
        Server {
            id: ServerId::from("01SERVER"),
            owner: UserId::from("01OWNER"),
            name: "lounge".into(),
            description: Some("a place".into()),
            channels: vec![ChannelId::from("01CHAN")],
            categories: None,
            system_messages: None,
            roles: None,
            icon: Some("icon".into()),
            banner: None,
            flags: None,
        }
    }

    fn role(colour: Option<&str>, rank: i64) -> Role {
        Role {
            name: "role".into(),
            colour: colour.map(str::to_owned),
            permissions: None,
            hoist: false,
            rank,
        }
    }

    #[test]
    fn test_update_clears_then_assigns() {
        let mut server = sample_server();
        let data = PartialServer {
            name: Some("new lounge".into()),
            ..PartialServer::default()
        };

        let changed = server.apply_update(data, &[FieldsServer::Icon]);
        assert_eq!(changed, vec!["icon", "name"]);
        assert_eq!(server.icon, None);
        assert_eq!(server.name, "new lounge");
    }

    #[test]
    fn test_role_patch_creates_missing_role_in_existing_map() {
        let mut server = sample_server();
        server.roles = Some(HashMap::new());
        let data = PartialRole {
            name: Some("mods".into()),
            rank: Some(3),
            ..PartialRole::default()
        };

        assert!(server.patch_role(RoleId::from("01ROLE"), data, &[]));
        let role = &server.roles.as_ref().unwrap()[&RoleId::from("01ROLE")];
        assert_eq!(role.name, "mods");
        assert_eq!(role.rank, 3);
    }

    #[test]
    fn test_role_patch_without_role_map_is_noop() {
        let mut server = sample_server();
        let data = PartialRole {
            name: Some("mods".into()),
            ..PartialRole::default()
        };

        assert!(!server.patch_role(RoleId::from("01ROLE"), data, &[]));
        assert_eq!(server.roles, None);
    }

    #[test]
    fn test_role_colour_clear_wins() {
        let mut server = sample_server();
        server.roles = Some(HashMap::from([(
            RoleId::from("01ROLE"),
            role(Some("red"), 1),
        )]));

        let data = PartialRole {
            colour: Some("blue".into()),
            ..PartialRole::default()
        };
        assert!(server.patch_role(RoleId::from("01ROLE"), data, &[FieldsRole::Colour]));
        assert_eq!(
            server.roles.as_ref().unwrap()[&RoleId::from("01ROLE")].colour,
            None
        );
    }

    #[test]
    fn test_remove_role_without_map_is_noop() {
        let mut server = sample_server();
        assert!(!server.remove_role(&RoleId::from("01ROLE")));
    }

    #[test]
    fn test_role_colour_prefers_lowest_rank() {
        let mut server = sample_server();
        server.roles = Some(HashMap::from([
            (RoleId::from("r1"), role(Some("red"), 1)),
            (RoleId::from("r2"), role(Some("blue"), 2)),
            (RoleId::from("r3"), role(None, 0)),
        ]));

        let member_roles = [
            RoleId::from("r2"),
            RoleId::from("r1"),
            RoleId::from("r3"),
        ];
        assert_eq!(server.role_colour(&member_roles), Some("red"));
    }

    #[test]
    fn test_role_colour_ignores_unknown_roles() {
        let server = sample_server();
        assert_eq!(server.role_colour(&[RoleId::from("missing")]), None);
    }
}
