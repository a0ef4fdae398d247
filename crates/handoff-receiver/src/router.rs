use crate::channel::ChannelState;
use crate::resolver::IdentifierResolver;
use crate::subscription::{ShareUpdate, SubscriptionManager};
use handoff_core::payload::{decode_media, decode_text, decode_url, join_text};
use handoff_core::thumbnail::ThumbnailGenerator;
use handoff_core::{ActivationSignal, Channel, MediaItem, SharedStore, StoredValue, UrlShare};
use std::path::Path;
use tracing::{debug, info, warn};

/// Consumer side of the handoff: turns wake-up signals into channel values.
pub struct ShareReceiver {
    pub(crate) store: Box<dyn SharedStore>,
    pub(crate) resolver: Box<dyn IdentifierResolver>,
    pub(crate) thumbnails: Option<ThumbnailGenerator>,
    pub(crate) media: ChannelState<Vec<MediaItem>>,
    pub(crate) text: ChannelState<String>,
    pub(crate) url: ChannelState<UrlShare>,
    pub(crate) subscriptions: SubscriptionManager,
    cold_start_seen: bool,
}

impl ShareReceiver {
    pub fn new(store: Box<dyn SharedStore>, resolver: Box<dyn IdentifierResolver>) -> Self {
        Self {
            store,
            resolver,
            thumbnails: None,
            media: ChannelState::new(),
            text: ChannelState::new(),
            url: ChannelState::new(),
            subscriptions: SubscriptionManager::new(),
            cold_start_seen: false,
        }
    }

    /// Generates missing video thumbnails while normalizing media.
    pub fn with_thumbnails(mut self, thumbnails: ThumbnailGenerator) -> Self {
        self.thumbnails = Some(thumbnails);
        self
    }

    /// Whether a cold-start activation has already been accepted.
    pub fn cold_start_seen(&self) -> bool {
        self.cold_start_seen
    }

    /// Handles one wake-up signal. Returns whether an activation was accepted.
    ///
    /// An absent or unparseable signal clears the latest value of every
    /// channel. A parsed signal is always accepted, even when its store entry
    /// is missing or garbled; the channel then receives an absent value.
    pub fn handle_activation(&mut self, signal: Option<&str>, is_cold_start: bool) -> bool {
        let parsed = match signal.map(ActivationSignal::parse) {
            Some(Ok(parsed)) => parsed,
            Some(Err(err)) => {
                warn!(event = "activation_malformed", error = %err);
                self.clear_latest();
                return false;
            }
            None => {
                debug!(event = "activation_absent", cold_start = is_cold_start);
                self.clear_latest();
                return false;
            }
        };

        let cold_start = is_cold_start && !self.cold_start_seen;
        if is_cold_start {
            self.cold_start_seen = true;
        }

        let update = match (parsed.channel(), parsed.key()) {
            (Some(Channel::Media), key) => {
                let items = key.and_then(|key| self.read_media(key));
                self.media.apply_activation(items, cold_start);
                ShareUpdate::Media(self.media.latest().cloned())
            }
            (Some(Channel::Text), key) => {
                let text = key.and_then(|key| self.read_text(key));
                self.text.apply_activation(text, cold_start);
                ShareUpdate::Text(self.text.latest().cloned())
            }
            (Some(Channel::Url), key) => {
                let share = key.and_then(|key| self.read_url(key));
                self.url.apply_activation(share, cold_start);
                ShareUpdate::Url(self.url.latest().cloned())
            }
            (None, _) => {
                // Plain deep links carry no payload; the link itself is the text.
                debug!(
                    event = "activation_text_fallback",
                    fragment = parsed.fragment().unwrap_or_default()
                );
                self.text
                    .apply_activation(Some(parsed.raw().to_string()), cold_start);
                ShareUpdate::Text(self.text.latest().cloned())
            }
        };

        let delivered = self.subscriptions.publish(&update);
        info!(
            event = "activation_accepted",
            channel = %update.channel(),
            key = parsed.key().unwrap_or_default(),
            cold_start,
            delivered
        );
        true
    }

    pub(crate) fn clear_latest(&mut self) {
        self.media.clear_latest();
        self.text.clear_latest();
        self.url.clear_latest();
    }

    fn load(&self, key: &str) -> Option<StoredValue> {
        match self.store.get(key) {
            Ok(Some(value)) => Some(value),
            Ok(None) => {
                warn!(event = "store_entry_missing", namespace = self.store.namespace(), key);
                None
            }
            Err(err) => {
                warn!(event = "store_read_failed", key, error = %err);
                None
            }
        }
    }

    fn read_media(&self, key: &str) -> Option<Vec<MediaItem>> {
        let value = self.load(key)?;
        let Some(bytes) = value.as_data() else {
            warn!(event = "store_decode_failed", key, kind = value.kind(), channel = "media");
            return None;
        };
        let items = match decode_media(bytes) {
            Ok(items) => items,
            Err(err) => {
                warn!(event = "store_decode_failed", key, channel = "media", error = %err);
                return None;
            }
        };

        let received = items.len();
        let resolved = items
            .into_iter()
            .filter_map(|item| self.normalize_media(item))
            .collect::<Vec<_>>();
        if resolved.len() < received {
            warn!(
                event = "media_items_dropped",
                key,
                received,
                kept = resolved.len()
            );
        }
        Some(resolved)
    }

    /// Replaces identifiers with readable paths. `None` drops the item.
    fn normalize_media(&self, item: MediaItem) -> Option<MediaItem> {
        let path = self.resolver.resolve(&item.path)?;
        if !item.is_video() {
            return Some(MediaItem {
                path,
                thumbnail_path: None,
                ..item
            });
        }

        let thumbnail_path = item
            .thumbnail_path
            .as_deref()
            .and_then(|thumbnail| self.resolver.resolve(thumbnail))
            .or_else(|| {
                self.thumbnails
                    .as_ref()
                    .and_then(|thumbnails| thumbnails.ensure_or_skip(Path::new(&path)))
                    .map(|generated| generated.to_string_lossy().into_owned())
            });
        Some(MediaItem {
            path,
            thumbnail_path,
            ..item
        })
    }

    fn read_text(&self, key: &str) -> Option<String> {
        match self.load(key)? {
            StoredValue::Strings(texts) => Some(join_text(&texts)),
            StoredValue::Data(bytes) => match decode_text(&bytes) {
                Ok(texts) => Some(join_text(&texts)),
                Err(err) => {
                    warn!(event = "store_decode_failed", key, channel = "text", error = %err);
                    None
                }
            },
        }
    }

    fn read_url(&self, key: &str) -> Option<UrlShare> {
        let value = self.load(key)?;
        let Some(bytes) = value.as_data() else {
            warn!(event = "store_decode_failed", key, kind = value.kind(), channel = "url");
            return None;
        };
        match decode_url(bytes) {
            Ok(share) => Some(share),
            Err(err) => {
                warn!(event = "store_decode_failed", key, channel = "url", error = %err);
                None
            }
        }
    }
}
