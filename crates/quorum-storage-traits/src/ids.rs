//! Identifier newtypes
//!
//! Every address and identifier that crosses a storage boundary gets its own type so a
//! space id can never be passed where an inbox address is expected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from anything string-like
            pub fn new<S>(value: S) -> Self
            where
                S: Into<String>,
            {
                Self(value.into())
            }

            /// Borrow as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner string
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
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
    /// Space (group) identifier
    SpaceId
);
string_id!(
    /// Channel identifier, unique within a space
    ChannelId
);
string_id!(
    /// Message identifier, unique within a channel
    MessageId
);
string_id!(
    /// A user's account address
    UserAddress
);
string_id!(
    /// An inbox address that can receive sealed envelopes
    InboxAddress
);
string_id!(
    /// Conversation identifier used to key encryption session records
    ConversationId
);

impl ConversationId {
    /// Conversation that carries a space's group traffic.
    pub fn for_space(space_id: &SpaceId) -> Self {
        Self(format!("{space_id}/{space_id}"))
    }

    /// Conversation for a direct exchange with `counterparty`.
    pub fn direct(counterparty: &UserAddress) -> Self {
        Self(format!("{counterparty}/{counterparty}"))
    }
}

/// Opaque identifier assigned to an action when it is first enqueued
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(Uuid);

impl ActionId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ActionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}
