//! Snapshot, reset and subscription calls made by the consumer application.

use crate::router::ShareReceiver;
use crate::subscription::ShareSink;
use handoff_core::payload::{media_to_json, url_to_json, PayloadError};
use handoff_core::{Channel, ChannelError, MediaItem, UrlShare};
use thiserror::Error;
use tracing::info;

pub const GET_INITIAL_MEDIA: &str = "getInitialMedia";
pub const GET_INITIAL_TEXT: &str = "getInitialText";
pub const GET_INITIAL_URL: &str = "getInitialUrl";
pub const RESET: &str = "reset";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("method '{0}' is not implemented")]
    NotImplemented(String),
    #[error("could not encode reply: {0}")]
    Encode(#[from] PayloadError),
}

impl CommandError {
    pub fn code(&self) -> &'static str {
        match self {
            CommandError::NotImplemented(_) => "NOT_IMPLEMENTED",
            CommandError::Encode(_) => "ENCODE_FAILED",
        }
    }
}

impl ShareReceiver {
    pub fn initial_media(&self) -> Option<&[MediaItem]> {
        self.media.initial().map(Vec::as_slice)
    }

    pub fn latest_media(&self) -> Option<&[MediaItem]> {
        self.media.latest().map(Vec::as_slice)
    }

    pub fn initial_text(&self) -> Option<&str> {
        self.text.initial().map(String::as_str)
    }

    pub fn latest_text(&self) -> Option<&str> {
        self.text.latest().map(String::as_str)
    }

    pub fn initial_url(&self) -> Option<&UrlShare> {
        self.url.initial()
    }

    pub fn latest_url(&self) -> Option<&UrlShare> {
        self.url.latest()
    }

    /// Encoded initial media list.
    pub fn get_initial_media(&self) -> Result<Option<String>, PayloadError> {
        self.initial_media().map(media_to_json).transpose()
    }

    pub fn get_initial_text(&self) -> Option<String> {
        self.initial_text().map(str::to_string)
    }

    /// Encoded initial link record.
    pub fn get_initial_url(&self) -> Result<Option<String>, PayloadError> {
        self.initial_url().map(url_to_json).transpose()
    }

    /// Clears initial and latest values on every channel.
    pub fn reset(&mut self) {
        self.media.reset();
        self.text.reset();
        self.url.reset();
        info!(event = "channels_reset");
    }

    /// Dispatches a command by method name.
    pub fn handle_method(&mut self, method: &str) -> Result<Option<String>, CommandError> {
        match method {
            GET_INITIAL_MEDIA => Ok(self.get_initial_media()?),
            GET_INITIAL_TEXT => Ok(self.get_initial_text()),
            GET_INITIAL_URL => Ok(self.get_initial_url()?),
            RESET => {
                self.reset();
                Ok(None)
            }
            other => Err(CommandError::NotImplemented(other.to_string())),
        }
    }

    /// Registers `sink` for `channel`, replacing any earlier sink. Updates that
    /// landed before this call are not replayed.
    pub fn subscribe(&mut self, channel: Channel, sink: Box<dyn ShareSink>) {
        self.subscriptions.subscribe(channel, sink);
    }

    pub fn unsubscribe(&mut self, channel: Channel) {
        self.subscriptions.unsubscribe(channel);
    }

    pub fn subscribe_named(&mut self, name: &str, sink: Box<dyn ShareSink>) -> Result<(), ChannelError> {
        self.subscriptions.subscribe_named(name, sink)
    }

    pub fn unsubscribe_named(&mut self, name: &str) -> Result<(), ChannelError> {
        self.subscriptions.unsubscribe_named(name)
    }
}
