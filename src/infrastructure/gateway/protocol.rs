//! Wire protocol for the realtime gateway.
//!
//! Every frame is a JSON object whose `type` field selects the variant.
//! Unknown or malformed frames are logged and dropped so a protocol
//! addition on the server never kills the connection.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::entities::{
    AppendMessage, Channel, ChannelId, Emoji, EmojiId, FieldsChannel, FieldsMember, FieldsRole,
    FieldsServer, FieldsUser, Member, MemberKey, Message, MessageId, PartialChannel, PartialMember,
    PartialMessage, PartialRole, PartialServer, PartialUser, Relationship, RoleId, Server,
    ServerId, User, UserId,
};

/// Messages sent from the client to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Presents the session token after the socket opens.
    Authenticate {
        /// Session token.
        token: String,
    },
    /// Signals that the local user started typing in a channel.
    BeginTyping {
        /// Target channel.
        channel: ChannelId,
    },
    /// Signals that the local user stopped typing in a channel.
    EndTyping {
        /// Target channel.
        channel: ChannelId,
    },
    /// Keepalive probe; the server echoes `data` back in a `Pong`.
    Ping {
        /// Opaque echo payload, millisecond timestamp by convention.
        data: i64,
    },
    /// Reply to a server-initiated `Ping`.
    Pong {
        /// Echoed payload.
        data: i64,
    },
}

/// Error identifiers the gateway reports in `Error` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerErrorId {
    /// Placeholder error the server has not labelled yet.
    LabelMe,
    /// Internal server failure.
    InternalError,
    /// The presented session token is not valid.
    InvalidSession,
    /// The account exists but onboarding is incomplete.
    OnboardingNotFinished,
    /// A second `Authenticate` was sent on an authenticated socket.
    AlreadyAuthenticated,
    /// An identifier this client does not recognise.
    Unknown,
}

impl ServerErrorId {
    /// Parses a wire identifier, mapping unrecognised strings to `Unknown`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "LabelMe" => Self::LabelMe,
            "InternalError" => Self::InternalError,
            "InvalidSession" => Self::InvalidSession,
            "OnboardingNotFinished" => Self::OnboardingNotFinished,
            "AlreadyAuthenticated" => Self::AlreadyAuthenticated,
            _ => Self::Unknown,
        }
    }

    /// Wire identifier for this error.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LabelMe => "LabelMe",
            Self::InternalError => "InternalError",
            Self::InvalidSession => "InvalidSession",
            Self::OnboardingNotFinished => "OnboardingNotFinished",
            Self::AlreadyAuthenticated => "AlreadyAuthenticated",
            Self::Unknown => "Unknown",
        }
    }

    /// Whether the session token should be discarded on this error.
    #[must_use]
    pub const fn invalidates_session(self) -> bool {
        matches!(self, Self::InvalidSession | Self::OnboardingNotFinished)
    }
}

impl std::fmt::Display for ServerErrorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ServerErrorId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ServerErrorId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::parse(&value))
    }
}

/// Events pushed by the gateway to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Several events coalesced into one frame.
    Bulk {
        /// Inner events, in delivery order.
        v: Vec<ServerEvent>,
    },
    /// Authentication handshake succeeded.
    Authenticated,
    /// The session this socket presented no longer exists.
    NotFound,
    /// Fatal protocol or session error.
    Error {
        /// Error identifier.
        error: ServerErrorId,
    },
    /// Keepalive reply carrying back the `Ping` payload.
    Pong {
        /// Echoed payload.
        data: i64,
    },
    /// Server-initiated keepalive probe.
    Ping {
        /// Payload to echo back.
        data: i64,
    },
    /// Initial state snapshot delivered after authentication.
    Ready {
        /// Every user visible to this session.
        users: Vec<User>,
        /// Every server this session belongs to.
        servers: Vec<Server>,
        /// Every channel visible to this session.
        channels: Vec<Channel>,
        /// Server memberships of the local user.
        #[serde(default)]
        members: Vec<Member>,
        /// Custom emoji visible to this session.
        #[serde(default)]
        emojis: Vec<Emoji>,
    },
    /// A new message arrived.
    Message {
        /// The message itself, inlined into the frame.
        #[serde(flatten)]
        message: Message,
    },
    /// A message was edited.
    MessageUpdate {
        /// Message id.
        id: MessageId,
        /// Containing channel.
        channel: ChannelId,
        /// Changed fields.
        data: PartialMessage,
    },
    /// Content was appended to a message.
    MessageAppend {
        /// Message id.
        id: MessageId,
        /// Containing channel.
        channel: ChannelId,
        /// Appended content.
        append: AppendMessage,
    },
    /// A message was deleted.
    MessageDelete {
        /// Message id.
        id: MessageId,
        /// Containing channel.
        channel: ChannelId,
    },
    /// Several messages were deleted at once.
    BulkMessageDelete {
        /// Containing channel.
        channel: ChannelId,
        /// Deleted message ids.
        ids: Vec<MessageId>,
    },
    /// A reaction was added to a message.
    MessageReact {
        /// Message id.
        id: MessageId,
        /// Containing channel.
        channel_id: ChannelId,
        /// Reacting user.
        user_id: UserId,
        /// Reaction emoji, custom id or unicode.
        emoji_id: String,
    },
    /// A reaction was removed from a message.
    MessageUnreact {
        /// Message id.
        id: MessageId,
        /// Containing channel.
        channel_id: ChannelId,
        /// User whose reaction was removed.
        user_id: UserId,
        /// Reaction emoji, custom id or unicode.
        emoji_id: String,
    },
    /// Every reaction of one emoji was stripped from a message.
    MessageRemoveReaction {
        /// Message id.
        id: MessageId,
        /// Containing channel.
        channel_id: ChannelId,
        /// Reaction emoji, custom id or unicode.
        emoji_id: String,
    },
    /// A channel became visible to this session.
    ChannelCreate {
        /// The channel, inlined into the frame.
        #[serde(flatten)]
        channel: Channel,
    },
    /// Channel fields changed.
    ChannelUpdate {
        /// Channel id.
        id: ChannelId,
        /// Changed fields.
        data: PartialChannel,
        /// Fields reset to absent.
        #[serde(default)]
        clear: Vec<FieldsChannel>,
    },
    /// A channel was deleted or became invisible.
    ChannelDelete {
        /// Channel id.
        id: ChannelId,
    },
    /// A user joined a group channel.
    ChannelGroupJoin {
        /// Group channel id.
        id: ChannelId,
        /// Joining user.
        user: UserId,
    },
    /// A user left a group channel.
    ChannelGroupLeave {
        /// Group channel id.
        id: ChannelId,
        /// Leaving user.
        user: UserId,
    },
    /// A user started typing in a channel.
    ChannelStartTyping {
        /// Channel id.
        id: ChannelId,
        /// Typing user.
        user: UserId,
    },
    /// A user stopped typing in a channel.
    ChannelStopTyping {
        /// Channel id.
        id: ChannelId,
        /// User who stopped.
        user: UserId,
    },
    /// A user acknowledged a channel up to a message.
    ChannelAck {
        /// Channel id.
        id: ChannelId,
        /// Acknowledging user.
        user: UserId,
        /// Highest message id read.
        message_id: MessageId,
    },
    /// This session joined a server.
    ServerCreate {
        /// Server id.
        id: ServerId,
        /// The server record.
        server: Server,
        /// The server's channels.
        #[serde(default)]
        channels: Vec<Channel>,
    },
    /// Server fields changed.
    ServerUpdate {
        /// Server id.
        id: ServerId,
        /// Changed fields.
        data: PartialServer,
        /// Fields reset to absent.
        #[serde(default)]
        clear: Vec<FieldsServer>,
    },
    /// This session left a server, or the server was deleted.
    ServerDelete {
        /// Server id.
        id: ServerId,
    },
    /// A user joined a server.
    ServerMemberJoin {
        /// Server id.
        id: ServerId,
        /// Joining user.
        user: UserId,
    },
    /// Member fields changed.
    ServerMemberUpdate {
        /// Composite membership key.
        id: MemberKey,
        /// Changed fields.
        data: PartialMember,
        /// Fields reset to absent.
        #[serde(default)]
        clear: Vec<FieldsMember>,
    },
    /// A user left a server.
    ServerMemberLeave {
        /// Server id.
        id: ServerId,
        /// Leaving user.
        user: UserId,
    },
    /// A role was created or changed.
    ServerRoleUpdate {
        /// Server id.
        id: ServerId,
        /// Role id.
        role_id: RoleId,
        /// Changed fields.
        data: PartialRole,
        /// Fields reset to absent.
        #[serde(default)]
        clear: Vec<FieldsRole>,
    },
    /// A role was deleted.
    ServerRoleDelete {
        /// Server id.
        id: ServerId,
        /// Role id.
        role_id: RoleId,
    },
    /// User fields changed.
    UserUpdate {
        /// User id.
        id: UserId,
        /// Changed fields.
        data: PartialUser,
        /// Fields reset to absent.
        #[serde(default)]
        clear: Vec<FieldsUser>,
    },
    /// The relationship with another user changed.
    UserRelationship {
        /// The other user.
        user: UserId,
        /// New relationship.
        status: Relationship,
    },
    /// A user's presence flipped.
    UserPresence {
        /// User id.
        id: UserId,
        /// Whether the user is now online.
        online: bool,
    },
    /// A user's account was wiped by the platform.
    UserPlatformWipe {
        /// Wiped user.
        user_id: UserId,
        /// Raw account flags after the wipe.
        flags: u32,
    },
    /// A custom emoji was created.
    EmojiCreate {
        /// The emoji, inlined into the frame.
        #[serde(flatten)]
        emoji: Emoji,
    },
    /// A custom emoji was deleted.
    EmojiDelete {
        /// Emoji id.
        id: EmojiId,
    },
}

impl ServerEvent {
    /// Wire name of this event, for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bulk { .. } => "Bulk",
            Self::Authenticated => "Authenticated",
            Self::NotFound => "NotFound",
            Self::Error { .. } => "Error",
            Self::Pong { .. } => "Pong",
            Self::Ping { .. } => "Ping",
            Self::Ready { .. } => "Ready",
            Self::Message { .. } => "Message",
            Self::MessageUpdate { .. } => "MessageUpdate",
            Self::MessageAppend { .. } => "MessageAppend",
            Self::MessageDelete { .. } => "MessageDelete",
            Self::BulkMessageDelete { .. } => "BulkMessageDelete",
            Self::MessageReact { .. } => "MessageReact",
            Self::MessageUnreact { .. } => "MessageUnreact",
            Self::MessageRemoveReaction { .. } => "MessageRemoveReaction",
            Self::ChannelCreate { .. } => "ChannelCreate",
            Self::ChannelUpdate { .. } => "ChannelUpdate",
            Self::ChannelDelete { .. } => "ChannelDelete",
            Self::ChannelGroupJoin { .. } => "ChannelGroupJoin",
            Self::ChannelGroupLeave { .. } => "ChannelGroupLeave",
            Self::ChannelStartTyping { .. } => "ChannelStartTyping",
            Self::ChannelStopTyping { .. } => "ChannelStopTyping",
            Self::ChannelAck { .. } => "ChannelAck",
            Self::ServerCreate { .. } => "ServerCreate",
            Self::ServerUpdate { .. } => "ServerUpdate",
            Self::ServerDelete { .. } => "ServerDelete",
            Self::ServerMemberJoin { .. } => "ServerMemberJoin",
            Self::ServerMemberUpdate { .. } => "ServerMemberUpdate",
            Self::ServerMemberLeave { .. } => "ServerMemberLeave",
            Self::ServerRoleUpdate { .. } => "ServerRoleUpdate",
            Self::ServerRoleDelete { .. } => "ServerRoleDelete",
            Self::UserUpdate { .. } => "UserUpdate",
            Self::UserRelationship { .. } => "UserRelationship",
            Self::UserPresence { .. } => "UserPresence",
            Self::UserPlatformWipe { .. } => "UserPlatformWipe",
            Self::EmojiCreate { .. } => "EmojiCreate",
            Self::EmojiDelete { .. } => "EmojiDelete",
        }
    }
}

/// The `type` field alone, used to identify frames that fail full decoding.
#[derive(Deserialize)]
struct EventTag {
    #[serde(rename = "type")]
    kind: String,
}

/// Decodes a text frame into an event, or logs and drops it.
#[must_use]
pub fn decode_event(text: &str) -> Option<ServerEvent> {
    match serde_json::from_str(text) {
        Ok(event) => Some(event),
        Err(error) => {
            let kind = serde_json::from_str::<EventTag>(text)
                .map_or_else(|_| "<untagged>".to_owned(), |tag| tag.kind);
            warn!(%kind, %error, "dropping undecodable gateway frame");
            None
        }
    }
}

/// Encodes a client message into a text frame.
pub fn encode_message(message: &ClientMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticate_serializes_with_type_tag() {
        let frame = encode_message(&ClientMessage::Authenticate {
            token: "tok".to_owned(),
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "Authenticate");
        assert_eq!(value["token"], "tok");
    }

    #[test]
    fn decodes_message_event_with_flattened_body() {
        let event = decode_event(
            r#"{"type":"Message","_id":"01AAA","channel":"01CCC","author":"01UUU","content":"hi"}"#,
        )
        .unwrap();
        match event {
            ServerEvent::Message { message } => {
                assert_eq!(message.id.as_str(), "01AAA");
                assert_eq!(message.channel.as_str(), "01CCC");
                assert_eq!(message.content.as_deref(), Some("hi"));
            }
            other => panic!("unexpected event: {}", other.name()),
        }
    }

    #[test]
    fn decodes_channel_update_with_defaulted_clear() {
        let event = decode_event(
            r#"{"type":"ChannelUpdate","id":"01CCC","data":{"name":"renamed"}}"#,
        )
        .unwrap();
        match event {
            ServerEvent::ChannelUpdate { id, data, clear } => {
                assert_eq!(id.as_str(), "01CCC");
                assert_eq!(data.name.as_deref(), Some("renamed"));
                assert!(clear.is_empty());
            }
            other => panic!("unexpected event: {}", other.name()),
        }
    }

    #[test]
    fn decodes_bulk_frame_recursively() {
        let event = decode_event(
            r#"{"type":"Bulk","v":[{"type":"Authenticated"},{"type":"ChannelDelete","id":"01CCC"}]}"#,
        )
        .unwrap();
        match event {
            ServerEvent::Bulk { v } => {
                assert_eq!(v.len(), 2);
                assert_eq!(v[0], ServerEvent::Authenticated);
            }
            other => panic!("unexpected event: {}", other.name()),
        }
    }

    #[test]
    fn unknown_event_type_is_dropped() {
        assert!(decode_event(r#"{"type":"SomethingNew","id":"x"}"#).is_none());
    }

    #[test]
    fn malformed_known_event_is_dropped() {
        // Message without its required channel field.
        assert!(decode_event(r#"{"type":"Message","_id":"01AAA"}"#).is_none());
        assert!(decode_event("not json at all").is_none());
    }

    #[test]
    fn server_error_id_round_trips_and_defaults_to_unknown() {
        assert_eq!(ServerErrorId::parse("InvalidSession"), ServerErrorId::InvalidSession);
        assert_eq!(ServerErrorId::parse("FutureError"), ServerErrorId::Unknown);
        assert!(ServerErrorId::InvalidSession.invalidates_session());
        assert!(!ServerErrorId::InternalError.invalidates_session());

        let event = decode_event(r#"{"type":"Error","error":"AlreadyAuthenticated"}"#).unwrap();
        assert_eq!(
            event,
            ServerEvent::Error {
                error: ServerErrorId::AlreadyAuthenticated
            }
        );
    }

    #[test]
    fn ready_defaults_optional_collections() {
        let event = decode_event(
            r#"{"type":"Ready","users":[],"servers":[],"channels":[]}"#,
        )
        .unwrap();
        match event {
            ServerEvent::Ready {
                members, emojis, ..
            } => {
                assert!(members.is_empty());
                assert!(emojis.is_empty());
            }
            other => panic!("unexpected event: {}", other.name()),
        }
    }
}
