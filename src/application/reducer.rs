//! Applies gateway events to the local state mirror.

use std::sync::Arc;

use tracing::{debug, info, trace};

use crate::domain::entities::{Member, MemberKey, User};
use crate::domain::state::ClientState;
use crate::infrastructure::gateway::ServerEvent;

/// Folds the event stream into [`ClientState`].
///
/// `apply` returns the events a consumer should still see: bulk frames come
/// back unrolled, and deletions of entities this client never knew about are
/// swallowed.
pub struct Reducer {
    state: Arc<ClientState>,
}

impl Reducer {
    /// Creates a reducer writing into `state`.
    #[must_use]
    pub const fn new(state: Arc<ClientState>) -> Self {
        Self { state }
    }

    /// Applies one event and returns what to surface downstream.
    #[allow(clippy::too_many_lines)]
    pub fn apply(&self, event: ServerEvent) -> Vec<ServerEvent> {
        trace!(event = event.name(), "applying event");

        match event {
            ServerEvent::Bulk { v } => v.into_iter().flat_map(|inner| self.apply(inner)).collect(),

            ServerEvent::Ready {
                users,
                servers,
                channels,
                members,
                emojis,
            } => {
                info!(
                    users = users.len(),
                    servers = servers.len(),
                    channels = channels.len(),
                    "ready snapshot received"
                );

                self.state
                    .users
                    .bulk_load(users.iter().map(|u| (u.id.clone(), u.clone())));
                self.state
                    .servers
                    .bulk_load(servers.iter().map(|s| (s.id.clone(), s.clone())));
                self.state
                    .channels
                    .bulk_load(channels.iter().map(|c| (c.id().clone(), c.clone())));
                self.state
                    .members
                    .bulk_load(members.iter().map(|m| (m.id.clone(), m.clone())));
                self.state
                    .emojis
                    .bulk_load(emojis.iter().map(|e| (e.id.clone(), e.clone())));

                vec![ServerEvent::Ready {
                    users,
                    servers,
                    channels,
                    members,
                    emojis,
                }]
            }

            ServerEvent::Message { message } => {
                self.state.channels.update(&message.channel, |channel| {
                    if channel.set_last_message_id(message.id.clone()) {
                        vec!["last_message_id"]
                    } else {
                        Vec::new()
                    }
                });

                let current_user = self.state.current_user();
                self.state
                    .unreads
                    .observe_message(&message, current_user.as_ref());

                vec![ServerEvent::Message { message }]
            }

            ServerEvent::ChannelCreate { channel } => {
                if let Some(server_id) = channel.server_id().cloned() {
                    let channel_id = channel.id().clone();
                    self.state.servers.update(&server_id, |server| {
                        if server.channels.contains(&channel_id) {
                            Vec::new()
                        } else {
                            server.channels.push(channel_id.clone());
                            vec!["channels"]
                        }
                    });
                }
                self.state.channels.insert(channel.id().clone(), channel.clone());
                vec![ServerEvent::ChannelCreate { channel }]
            }

            ServerEvent::ChannelUpdate { id, data, clear } => {
                self.state.channels.update(&id, |channel| {
                    channel.apply_update(data.clone(), &clear)
                });
                vec![ServerEvent::ChannelUpdate { id, data, clear }]
            }

            ServerEvent::ChannelDelete { id } => {
                let removed_from = self
                    .state
                    .channels
                    .get(&id)
                    .and_then(|channel| channel.server_id().cloned());

                if self.state.channels.remove(&id) {
                    if let Some(server_id) = removed_from {
                        self.state.servers.update(&server_id, |server| {
                            let before = server.channels.len();
                            server.channels.retain(|c| c != &id);
                            if server.channels.len() == before {
                                Vec::new()
                            } else {
                                vec!["channels"]
                            }
                        });
                    }
                    vec![ServerEvent::ChannelDelete { id }]
                } else {
                    debug!(channel = %id, "delete for unknown channel");
                    Vec::new()
                }
            }

            ServerEvent::ChannelGroupJoin { id, user } => {
                self.state.channels.update(&id, |channel| {
                    if channel.group_join(user.clone()) {
                        vec!["recipients"]
                    } else {
                        Vec::new()
                    }
                });
                vec![ServerEvent::ChannelGroupJoin { id, user }]
            }

            ServerEvent::ChannelGroupLeave { id, user } => {
                self.state.channels.update(&id, |channel| {
                    if channel.group_leave(&user) {
                        vec!["recipients"]
                    } else {
                        Vec::new()
                    }
                });
                vec![ServerEvent::ChannelGroupLeave { id, user }]
            }

            ServerEvent::ChannelAck {
                id,
                user,
                message_id,
            } => {
                self.state
                    .unreads
                    .acknowledge(&id, &user, message_id.clone());
                vec![ServerEvent::ChannelAck {
                    id,
                    user,
                    message_id,
                }]
            }

            ServerEvent::ServerCreate {
                id,
                server,
                channels,
            } => {
                for channel in &channels {
                    self.state
                        .channels
                        .insert(channel.id().clone(), channel.clone());
                }
                self.state.servers.insert(id.clone(), server.clone());
                vec![ServerEvent::ServerCreate {
                    id,
                    server,
                    channels,
                }]
            }

            ServerEvent::ServerUpdate { id, data, clear } => {
                self.state.servers.update(&id, |server| {
                    server.apply_update(data.clone(), &clear)
                });
                vec![ServerEvent::ServerUpdate { id, data, clear }]
            }

            ServerEvent::ServerDelete { id } => {
                let orphaned = self
                    .state
                    .servers
                    .get(&id)
                    .map(|server| server.channels)
                    .unwrap_or_default();

                if self.state.servers.remove(&id) {
                    for channel_id in &orphaned {
                        self.state.channels.remove(channel_id);
                    }
                    let dropped = self.state.members.retain(|key, _| key.server != id);
                    debug!(server = %id, members = dropped, "server removed");
                    vec![ServerEvent::ServerDelete { id }]
                } else {
                    debug!(server = %id, "delete for unknown server");
                    Vec::new()
                }
            }

            ServerEvent::ServerMemberJoin { id, user } => {
                let key = MemberKey::new(id.clone(), user.clone());
                self.state.members.insert(key.clone(), Member::new(key));
                vec![ServerEvent::ServerMemberJoin { id, user }]
            }

            ServerEvent::ServerMemberUpdate { id, data, clear } => {
                self.state.members.update(&id, |member| {
                    member.apply_update(data.clone(), &clear)
                });
                vec![ServerEvent::ServerMemberUpdate { id, data, clear }]
            }

            ServerEvent::ServerMemberLeave { id, user } => {
                let key = MemberKey::new(id.clone(), user.clone());
                if self.state.members.remove(&key) {
                    vec![ServerEvent::ServerMemberLeave { id, user }]
                } else {
                    Vec::new()
                }
            }

            ServerEvent::ServerRoleUpdate {
                id,
                role_id,
                data,
                clear,
            } => {
                self.state.servers.update(&id, |server| {
                    if server.patch_role(role_id.clone(), data.clone(), &clear) {
                        vec!["roles"]
                    } else {
                        Vec::new()
                    }
                });
                vec![ServerEvent::ServerRoleUpdate {
                    id,
                    role_id,
                    data,
                    clear,
                }]
            }

            ServerEvent::ServerRoleDelete { id, role_id } => {
                self.state.servers.update(&id, |server| {
                    if server.remove_role(&role_id) {
                        vec!["roles"]
                    } else {
                        Vec::new()
                    }
                });
                vec![ServerEvent::ServerRoleDelete { id, role_id }]
            }

            ServerEvent::UserUpdate { id, data, clear } => {
                self.state
                    .users
                    .update(&id, |user| user.apply_update(data.clone(), &clear));
                vec![ServerEvent::UserUpdate { id, data, clear }]
            }

            ServerEvent::UserRelationship { user, status } => {
                if self.state.users.contains(&user) {
                    self.state.users.update(&user, |known| {
                        if known.relationship == Some(status) {
                            Vec::new()
                        } else {
                            known.relationship = Some(status);
                            vec!["relationship"]
                        }
                    });
                } else {
                    // A relationship change can be the first time we hear of
                    // this user at all.
                    self.state
                        .users
                        .insert(user.clone(), User::with_relationship(user.clone(), status));
                }
                vec![ServerEvent::UserRelationship { user, status }]
            }

            ServerEvent::UserPresence { id, online } => {
                self.state.users.update(&id, |user| {
                    if user.online == online {
                        Vec::new()
                    } else {
                        user.online = online;
                        vec!["online"]
                    }
                });
                vec![ServerEvent::UserPresence { id, online }]
            }

            ServerEvent::UserPlatformWipe { user_id, flags } => {
                self.state.users.update(&user_id, |user| {
                    user.flags = Some(flags);
                    vec!["flags"]
                });
                vec![ServerEvent::UserPlatformWipe { user_id, flags }]
            }

            ServerEvent::EmojiCreate { emoji } => {
                self.state.emojis.insert(emoji.id.clone(), emoji.clone());
                vec![ServerEvent::EmojiCreate { emoji }]
            }

            ServerEvent::EmojiDelete { id } => {
                if self.state.emojis.remove(&id) {
                    vec![ServerEvent::EmojiDelete { id }]
                } else {
                    Vec::new()
                }
            }

            // Message history is not mirrored beyond last_message_id and
            // unreads, so the remaining message-stream events pass through
            // untouched for consumers that track open conversations.
            other => vec![other],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{
        Channel, ChannelId, FieldsChannel, FieldsUser, Message, MessageId, PartialChannel,
        PartialRole, PartialUser, Relationship, Server, ServerId, UserId,
    };
    use crate::infrastructure::gateway::decode_event;

    fn text_channel(id: &str, server: &str) -> Channel {
        Channel::TextChannel {
            id: ChannelId::from(id),
            server: ServerId::from(server),
            name: "general".to_owned(),
            description: None,
            icon: Some("icon.png".to_owned()),
            last_message_id: None,
            default_permissions: None,
            nsfw: false,
        }
    }

    fn server(id: &str, channels: &[&str]) -> Server {
        Server {
            id: ServerId::from(id),
            owner: UserId::from("01OWNER"),
            name: "testing".to_owned(),
            description: None,
            channels: channels.iter().map(|c| ChannelId::from(*c)).collect(),
            categories: None,
            system_messages: None,
            roles: None,
            icon: None,
            banner: None,
            flags: None,
        }
    }

    fn message(id: &str, channel: &str) -> Message {
        Message {
            id: MessageId::from(id),
            channel: ChannelId::from(channel),
            author: UserId::from("01AUTHOR"),
            content: Some("hello".to_owned()),
            mentions: None,
            replies: None,
            edited: None,
        }
    }

    fn reducer() -> (Reducer, Arc<ClientState>) {
        let state = Arc::new(ClientState::new());
        (Reducer::new(Arc::clone(&state)), state)
    }

    #[test]
    fn ready_then_message_tracks_unread_and_last_message() {
        let (reducer, state) = reducer();
        state.set_current_user(Some(UserId::from("01ME")));

        reducer.apply(ServerEvent::Ready {
            users: Vec::new(),
            servers: vec![server("01SRV", &["01CHAN"])],
            channels: vec![text_channel("01CHAN", "01SRV")],
            members: Vec::new(),
            emojis: Vec::new(),
        });

        // The first message seen live bootstraps the tracker and does not
        // count as unread; only later messages do.
        reducer.apply(ServerEvent::Message {
            message: message("01HMSGAAA", "01CHAN"),
        });

        let channel_id = ChannelId::from("01CHAN");
        let channel = state.channels.get(&channel_id).unwrap();
        assert_eq!(
            channel.last_message_id().map(MessageId::as_str),
            Some("01HMSGAAA")
        );
        assert!(!state.unreads.is_unread(&channel));

        reducer.apply(ServerEvent::Message {
            message: message("01HMSGBBB", "01CHAN"),
        });

        let channel = state.channels.get(&channel_id).unwrap();
        assert_eq!(
            channel.last_message_id().map(MessageId::as_str),
            Some("01HMSGBBB")
        );
        assert!(state.unreads.is_unread(&channel));
    }

    #[test]
    fn bulk_is_equivalent_to_sequential_delivery() {
        let (bulk_reducer, bulk_state) = reducer();
        let (seq_reducer, seq_state) = reducer();

        let events = vec![
            ServerEvent::ChannelCreate {
                channel: text_channel("01CHAN", "01SRV"),
            },
            ServerEvent::ChannelUpdate {
                id: ChannelId::from("01CHAN"),
                data: PartialChannel {
                    name: Some("renamed".to_owned()),
                    ..Default::default()
                },
                clear: Vec::new(),
            },
        ];

        let surfaced = bulk_reducer.apply(ServerEvent::Bulk { v: events.clone() });
        for event in events {
            seq_reducer.apply(event);
        }

        // Bulk comes back unrolled.
        assert_eq!(surfaced.len(), 2);
        let channel_id = ChannelId::from("01CHAN");
        assert_eq!(
            bulk_state.channels.get(&channel_id),
            seq_state.channels.get(&channel_id)
        );
    }

    #[test]
    fn update_with_clear_masks_reassignment() {
        let (reducer, state) = reducer();
        reducer.apply(ServerEvent::ChannelCreate {
            channel: text_channel("01CHAN", "01SRV"),
        });

        // One frame renames the channel and clears its icon; the icon value
        // in data must not survive the clear.
        reducer.apply(ServerEvent::ChannelUpdate {
            id: ChannelId::from("01CHAN"),
            data: PartialChannel {
                name: Some("renamed".to_owned()),
                icon: Some("sneaky.png".to_owned()),
                ..Default::default()
            },
            clear: vec![FieldsChannel::Icon],
        });

        match state.channels.get(&ChannelId::from("01CHAN")).unwrap() {
            Channel::TextChannel { name, icon, .. } => {
                assert_eq!(name, "renamed");
                assert_eq!(icon, None);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn updates_for_unknown_entities_are_tolerated() {
        let (reducer, state) = reducer();

        reducer.apply(ServerEvent::UserUpdate {
            id: UserId::from("01GHOST"),
            data: PartialUser::default(),
            clear: vec![FieldsUser::Avatar],
        });
        let surfaced = reducer.apply(ServerEvent::ChannelDelete {
            id: ChannelId::from("01GHOST"),
        });

        assert!(surfaced.is_empty());
        assert!(state.users.is_empty());
        assert!(state.channels.is_empty());
    }

    #[test]
    fn channel_create_registers_with_owning_server() {
        let (reducer, state) = reducer();
        reducer.apply(ServerEvent::ServerCreate {
            id: ServerId::from("01SRV"),
            server: server("01SRV", &[]),
            channels: Vec::new(),
        });

        reducer.apply(ServerEvent::ChannelCreate {
            channel: text_channel("01NEW", "01SRV"),
        });

        let srv = state.servers.get(&ServerId::from("01SRV")).unwrap();
        assert_eq!(srv.channels, vec![ChannelId::from("01NEW")]);
    }

    #[test]
    fn server_delete_cascades_to_channels_and_members() {
        let (reducer, state) = reducer();
        reducer.apply(ServerEvent::ServerCreate {
            id: ServerId::from("01SRV"),
            server: server("01SRV", &["01CHAN"]),
            channels: vec![text_channel("01CHAN", "01SRV")],
        });
        reducer.apply(ServerEvent::ServerMemberJoin {
            id: ServerId::from("01SRV"),
            user: UserId::from("01ME"),
        });

        reducer.apply(ServerEvent::ServerDelete {
            id: ServerId::from("01SRV"),
        });

        assert!(state.servers.is_empty());
        assert!(state.channels.is_empty());
        assert!(state.members.is_empty());
    }

    #[test]
    fn role_update_creates_and_patches() {
        let (reducer, state) = reducer();
        let mut srv = server("01SRV", &[]);
        srv.roles = Some(std::collections::HashMap::new());
        reducer.apply(ServerEvent::ServerCreate {
            id: ServerId::from("01SRV"),
            server: srv,
            channels: Vec::new(),
        });

        reducer.apply(ServerEvent::ServerRoleUpdate {
            id: ServerId::from("01SRV"),
            role_id: crate::domain::entities::RoleId::from("01ROLE"),
            data: PartialRole {
                name: Some("admins".to_owned()),
                colour: Some("#ff0000".to_owned()),
                ..Default::default()
            },
            clear: Vec::new(),
        });

        let srv = state.servers.get(&ServerId::from("01SRV")).unwrap();
        let role = srv
            .roles
            .as_ref()
            .unwrap()
            .get(&crate::domain::entities::RoleId::from("01ROLE"))
            .unwrap();
        assert_eq!(role.name, "admins");
        assert_eq!(role.colour.as_deref(), Some("#ff0000"));
    }

    #[test]
    fn relationship_change_upserts_unknown_user() {
        let (reducer, state) = reducer();

        reducer.apply(ServerEvent::UserRelationship {
            user: UserId::from("01NEW"),
            status: Relationship::Incoming,
        });

        let user = state.users.get(&UserId::from("01NEW")).unwrap();
        assert_eq!(user.relationship, Some(Relationship::Incoming));
    }

    #[test]
    fn ack_event_clears_unread() {
        let (reducer, state) = reducer();
        state.set_current_user(Some(UserId::from("01ME")));
        reducer.apply(ServerEvent::ChannelCreate {
            channel: text_channel("01CHAN", "01SRV"),
        });
        // Two messages, so the channel is unread past the bootstrap one.
        reducer.apply(ServerEvent::Message {
            message: message("01HMSGAAA", "01CHAN"),
        });
        reducer.apply(ServerEvent::Message {
            message: message("01HMSGBBB", "01CHAN"),
        });

        let channel = state.channels.get(&ChannelId::from("01CHAN")).unwrap();
        assert!(state.unreads.is_unread(&channel));

        reducer.apply(ServerEvent::ChannelAck {
            id: ChannelId::from("01CHAN"),
            user: UserId::from("01ME"),
            message_id: MessageId::from("01HMSGBBB"),
        });
        assert!(!state.unreads.is_unread(&channel));
    }

    #[test]
    fn wire_frame_flows_end_to_end() {
        let (reducer, state) = reducer();

        let event = decode_event(
            r#"{"type":"ChannelCreate","channel_type":"Group","_id":"01GRP","name":"plans","owner":"01ME","recipients":["01ME","01PAL"]}"#,
        )
        .unwrap();
        reducer.apply(event);

        assert!(state.channels.contains(&ChannelId::from("01GRP")));
    }
}
