use handoff_core::payload::{media_to_json, url_to_json, PayloadError};
use handoff_core::{Channel, ChannelError, MediaItem, UrlShare};
use std::collections::BTreeMap;
use tracing::debug;

/// A value pushed to a channel subscriber. `None` means the activation
/// carried no usable payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ShareUpdate {
    Media(Option<Vec<MediaItem>>),
    Text(Option<String>),
    Url(Option<UrlShare>),
}

impl ShareUpdate {
    pub fn channel(&self) -> Channel {
        match self {
            ShareUpdate::Media(_) => Channel::Media,
            ShareUpdate::Text(_) => Channel::Text,
            ShareUpdate::Url(_) => Channel::Url,
        }
    }

    /// The update in the form the consumer application receives it.
    pub fn encoded(&self) -> Result<Option<String>, PayloadError> {
        match self {
            ShareUpdate::Media(items) => items.as_deref().map(media_to_json).transpose(),
            ShareUpdate::Text(text) => Ok(text.clone()),
            ShareUpdate::Url(share) => share.as_ref().map(url_to_json).transpose(),
        }
    }
}

pub trait ShareSink {
    fn deliver(&mut self, update: &ShareUpdate);
}

impl<F> ShareSink for F
where
    F: FnMut(&ShareUpdate),
{
    fn deliver(&mut self, update: &ShareUpdate) {
        self(update)
    }
}

/// At most one sink per channel; a new subscription silently replaces the old one.
#[derive(Default)]
pub struct SubscriptionManager {
    sinks: BTreeMap<Channel, Box<dyn ShareSink>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when an earlier sink was replaced.
    pub fn subscribe(&mut self, channel: Channel, sink: Box<dyn ShareSink>) -> bool {
        let replaced = self.sinks.insert(channel, sink).is_some();
        debug!(event = "subscriber_registered", channel = %channel, replaced);
        replaced
    }

    pub fn subscribe_named(
        &mut self,
        name: &str,
        sink: Box<dyn ShareSink>,
    ) -> Result<(), ChannelError> {
        let channel = name.parse::<Channel>()?;
        self.subscribe(channel, sink);
        Ok(())
    }

    /// Returns `true` when a sink was registered.
    pub fn unsubscribe(&mut self, channel: Channel) -> bool {
        let removed = self.sinks.remove(&channel).is_some();
        debug!(event = "subscriber_removed", channel = %channel, removed);
        removed
    }

    pub fn unsubscribe_named(&mut self, name: &str) -> Result<(), ChannelError> {
        let channel = name.parse::<Channel>()?;
        self.unsubscribe(channel);
        Ok(())
    }

    pub fn is_subscribed(&self, channel: Channel) -> bool {
        self.sinks.contains_key(&channel)
    }

    /// Delivers synchronously to the channel's sink. Without a sink the update is dropped.
    pub fn publish(&mut self, update: &ShareUpdate) -> bool {
        match self.sinks.get_mut(&update.channel()) {
            Some(sink) => {
                sink.deliver(update);
                true
            }
            None => false,
        }
    }
}
