//! Typed entity identifiers.
//!
//! Identifiers on the wire are 26-character time-sortable strings, so lexical
//! ordering equals chronological ordering. Each entity kind gets its own
//! newtype to keep lookups from crossing caches.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// The identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifier of a user.
    UserId
);
string_id!(
    /// Identifier of a server.
    ServerId
);
string_id!(
    /// Identifier of a channel.
    ChannelId
);
string_id!(
    /// Identifier of a message.
    MessageId
);
string_id!(
    /// Identifier of a role within a server.
    RoleId
);
string_id!(
    /// Identifier of a custom emoji.
    EmojiId
);

/// Composite identifier of a server member.
///
/// The member cache is keyed by this struct directly (maps compare keys by
/// value), while [`MemberKey::canonical`] keeps the scalar derivation around
/// for logging and for contexts that need a single string key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberKey {
    /// Server half of the key.
    pub server: ServerId,
    /// User half of the key.
    pub user: UserId,
}

impl MemberKey {
    /// Creates a composite key.
    #[must_use]
    pub fn new(server: impl Into<ServerId>, user: impl Into<UserId>) -> Self {
        Self {
            server: server.into(),
            user: user.into(),
        }
    }

    /// Canonical scalar derivation of the key.
    ///
    /// Both halves are fixed-length identifiers, so plain concatenation is
    /// injective without a delimiter.
    #[must_use]
    pub fn canonical(&self) -> String {
        format!("{}{}", self.server.0, self.user.0)
    }
}

impl std::fmt::Display for MemberKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.server, self.user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_ordering_is_lexical() {
        let earlier = MessageId::from("01H0000000000000000000AAAA");
        let later = MessageId::from("01H0000000000000000000BBBB");
        assert!(earlier < later);
    }

    #[test]
    fn test_member_key_canonical_is_deterministic() {
        let a = MemberKey::new("01SERVERAAAAAAAAAAAAAAAAAA", "01USERBBBBBBBBBBBBBBBBBBBB");
        let b = MemberKey::new("01SERVERAAAAAAAAAAAAAAAAAA", "01USERBBBBBBBBBBBBBBBBBBBB");
        assert_eq!(a.canonical(), b.canonical());
        assert_eq!(a, b);
    }

    #[test]
    fn test_member_key_canonical_is_injective() {
        let keys = [
            MemberKey::new("01SERVERAAAAAAAAAAAAAAAAAA", "01USERBBBBBBBBBBBBBBBBBBBB"),
            MemberKey::new("01SERVERAAAAAAAAAAAAAAAAAA", "01USERCCCCCCCCCCCCCCCCCCCC"),
            MemberKey::new("01SERVERDDDDDDDDDDDDDDDDDD", "01USERBBBBBBBBBBBBBBBBBBBB"),
        ];

        for (i, a) in keys.iter().enumerate() {
            for (j, b) in keys.iter().enumerate() {
                assert_eq!(i == j, a.canonical() == b.canonical());
            }
        }
    }

    #[test]
    fn test_id_serde_is_transparent() {
        let id: ChannelId = serde_json::from_str("\"01CHANNEL\"").unwrap();
        assert_eq!(id.as_str(), "01CHANNEL");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"01CHANNEL\"");
    }
}
