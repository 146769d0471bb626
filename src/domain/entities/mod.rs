//! Domain entities mirrored from the remote chat service.

mod channel;
mod emoji;
mod id;
mod member;
mod message;
mod server;
mod unread;
mod user;

pub use channel::{Channel, FieldsChannel, PartialChannel};
pub use emoji::{Emoji, EmojiParent};
pub use id::{ChannelId, EmojiId, MemberKey, MessageId, RoleId, ServerId, UserId};
pub use member::{FieldsMember, Member, PartialMember};
pub use message::{AppendMessage, Message, PartialMessage};
pub use server::{
    Category, FieldsRole, FieldsServer, OverrideField, PartialRole, PartialServer, Role, Server,
    SystemMessages,
};
pub use unread::{ChannelCompositeKey, ChannelUnread};
pub use user::{
    FieldsUser, PartialUser, Presence, Relationship, User, UserFlags, UserProfile, UserStatus,
};
