//! Wake-up URLs: `<scheme>://<label>=<key>#<channel>`.

use crate::Channel;
use thiserror::Error;
use url::Url;

/// Host label the producer puts in front of the store key.
pub const KEY_LABEL: &str = "dataUrl";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    #[error("activation signal is empty")]
    Empty,
    #[error("activation signal '{raw}' is not a url: {reason}")]
    Malformed { raw: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationSignal {
    raw: String,
    fragment: Option<String>,
    key: Option<String>,
}

impl ActivationSignal {
    pub fn parse(raw: &str) -> Result<Self, SignalError> {
        if raw.trim().is_empty() {
            return Err(SignalError::Empty);
        }
        let url = Url::parse(raw).map_err(|err| SignalError::Malformed {
            raw: raw.to_string(),
            reason: err.to_string(),
        })?;
        let key = url
            .host_str()
            .and_then(|host| host.rsplit('=').next())
            .filter(|key| !key.is_empty())
            .map(str::to_string);
        Ok(Self {
            raw: raw.to_string(),
            fragment: url.fragment().map(str::to_string),
            key,
        })
    }

    /// Builds the url a producer uses to wake the consumer for `channel`.
    pub fn compose(scheme: &str, key: &str, channel: Channel) -> String {
        format!("{scheme}://{KEY_LABEL}={key}#{channel}")
    }

    /// The signal exactly as it was received.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Channel selected by the fragment; `None` for a missing or unknown fragment.
    pub fn channel(&self) -> Option<Channel> {
        self.fragment.as_deref().and_then(|raw| raw.parse().ok())
    }

    /// Store key: the last `=`-separated component of the host.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}
