//! Identifier newtypes.
//!
//! Chat-platform ids are opaque strings (snowflakes on most platforms);
//! job ids are UUIDs minted locally. Newtypes keep the registry's two
//! indexes (job id, message id) from being mixed up.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identity of a tracking job. Survives message recreation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

string_id!(
    /// Owning group (guild/server) of a tracked order's channel.
    GroupId
);
string_id!(
    /// Channel the display message lives in.
    ChannelId
);
string_id!(
    /// Published display message. Mutable: replaced when the message is lost.
    MessageId
);
string_id!(
    /// A chat-platform user (requester or notifier).
    UserId
);
string_id!(
    /// Role whose single unambiguous holder becomes the notifier.
    RoleId
);
