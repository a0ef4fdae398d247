use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod payload;
pub mod signal;
pub mod store;
pub mod thumbnail;

pub use payload::{MediaItem, MediaKind, PayloadError, UrlShare};
pub use signal::{ActivationSignal, SignalError};
pub use store::{MemoryStore, SharedStore, StoreError, StoredValue};

/// Prefix of the namespace both processes open the shared store under.
pub const GROUP_PREFIX: &str = "group.";

/// Namespace of the shared store for an app base identifier.
pub fn group_identifier(app_id: &str) -> String {
    format!("{GROUP_PREFIX}{app_id}")
}

/// One of the independent content categories carried by a handoff.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Media,
    Text,
    Url,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Media, Channel::Text, Channel::Url];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Media => "media",
            Channel::Text => "text",
            Channel::Url => "url",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("No such argument {name}")]
    NoSuchChannel { name: String },
}

impl ChannelError {
    /// Stable code reported to the consumer application.
    pub fn code(&self) -> &'static str {
        match self {
            ChannelError::NoSuchChannel { .. } => "NO_SUCH_ARGUMENT",
        }
    }
}

impl FromStr for Channel {
    type Err = ChannelError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "media" => Ok(Channel::Media),
            "text" => Ok(Channel::Text),
            "url" => Ok(Channel::Url),
            other => Err(ChannelError::NoSuchChannel {
                name: other.to_string(),
            }),
        }
    }
}
