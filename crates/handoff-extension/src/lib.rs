//! Producer side of the handoff: runs in the short-lived share extension,
//! writes one batch to the shared store and wakes the host app.

use handoff_core::payload::encode_url;
use handoff_core::thumbnail::ThumbnailGenerator;
use handoff_core::{
    ActivationSignal, Channel, MediaItem, PayloadError, SharedStore, StoreError, StoredValue,
    UrlShare,
};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

pub mod attachment;
pub mod batch;

pub use attachment::{copy_into_container, file_url, Attachment};
pub use batch::{BatchContents, Completion, ShareBatch};

#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("payload error: {0}")]
    Payload(#[from] PayloadError),
    #[error("could not signal host app: {0}")]
    Signal(String),
    #[error("share batch has no usable attachment")]
    EmptyBatch,
    #[error("attachment index {index} out of range for batch of {expected}")]
    IndexOutOfRange { index: usize, expected: usize },
    #[error("attachment {index} completed twice")]
    DuplicateCompletion { index: usize },
    #[error("share batch lock poisoned")]
    Poisoned,
}

/// Wakes the host app with a url. How that happens is platform business.
pub trait HostSignal {
    fn signal_host(&self, url: &str) -> Result<(), ProducerError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionConfig {
    /// Url scheme the host app is registered for.
    pub scheme: String,
    /// Store key every batch is written under.
    pub share_key: String,
    /// Shared container the media copies go to.
    pub container_dir: PathBuf,
}

pub struct ShareExtension {
    config: ExtensionConfig,
    store: Box<dyn SharedStore>,
    host: Box<dyn HostSignal>,
    thumbnails: Option<ThumbnailGenerator>,
}

impl ShareExtension {
    pub fn new(
        config: ExtensionConfig,
        store: Box<dyn SharedStore>,
        host: Box<dyn HostSignal>,
    ) -> Self {
        Self {
            config,
            store,
            host,
            thumbnails: None,
        }
    }

    /// Enables duration probing and thumbnails for shared videos.
    pub fn with_thumbnails(mut self, thumbnails: ThumbnailGenerator) -> Self {
        self.thumbnails = Some(thumbnails);
        self
    }

    pub fn config(&self) -> &ExtensionConfig {
        &self.config
    }

    /// Loads one attachment. Failures are logged and yield [`Completion::Skipped`].
    pub fn materialize(&self, attachment: &Attachment) -> Completion {
        match attachment {
            Attachment::Text(text) => Completion::Text(text.clone()),
            Attachment::Url(url) => Completion::Text(url.clone()),
            Attachment::Image(source) => match copy_into_container(
                source,
                &self.config.container_dir,
                attachment::DEFAULT_IMAGE_EXTENSION,
            ) {
                Ok(copy) => Completion::Media(MediaItem::image(file_url(&copy))),
                Err(err) => {
                    warn!(event = "attachment_copy_failed", kind = "image", source = %source.display(), error = %err);
                    Completion::Skipped
                }
            },
            Attachment::Video(source) => match copy_into_container(
                source,
                &self.config.container_dir,
                attachment::DEFAULT_VIDEO_EXTENSION,
            ) {
                Ok(copy) => {
                    let (thumbnail, duration_ms) = match &self.thumbnails {
                        Some(thumbnails) => (
                            thumbnails
                                .ensure_or_skip(&copy)
                                .map(|path| file_url(&path)),
                            thumbnails.duration_ms(&copy),
                        ),
                        None => (None, None),
                    };
                    Completion::Media(MediaItem::video(file_url(&copy), thumbnail, duration_ms))
                }
                Err(err) => {
                    warn!(event = "attachment_copy_failed", kind = "video", source = %source.display(), error = %err);
                    Completion::Skipped
                }
            },
        }
    }

    /// Shares `attachments` as one batch: every attachment completes through a
    /// [`ShareBatch`], and only the last completion writes and signals.
    /// Returns the wake-up url that was sent.
    pub fn share(&self, attachments: &[Attachment]) -> Result<String, ProducerError> {
        if attachments.is_empty() {
            return Err(ProducerError::EmptyBatch);
        }
        let batch = ShareBatch::new(attachments.len());
        let mut ready = None;
        for (index, attachment) in attachments.iter().enumerate() {
            if let Some(contents) = batch.complete(index, self.materialize(attachment))? {
                ready = Some(contents);
            }
        }
        let contents = ready.ok_or(ProducerError::EmptyBatch)?;
        self.publish(contents)
    }

    /// Writes a completed batch under the share key and signals the host once.
    pub fn publish(&self, contents: BatchContents) -> Result<String, ProducerError> {
        let (channel, value) = contents.into_payload()?.ok_or(ProducerError::EmptyBatch)?;
        self.write_and_signal(channel, value)
    }

    /// Shares a link record, optionally with a co-shared media file.
    pub fn share_url(&self, share: &UrlShare) -> Result<String, ProducerError> {
        let bytes = encode_url(share)?;
        self.write_and_signal(Channel::Url, StoredValue::Data(bytes))
    }

    fn write_and_signal(&self, channel: Channel, value: StoredValue) -> Result<String, ProducerError> {
        self.store.set(&self.config.share_key, value)?;
        let url = ActivationSignal::compose(&self.config.scheme, &self.config.share_key, channel);
        self.host.signal_host(&url)?;
        info!(
            event = "share_signaled",
            channel = %channel,
            key = %self.config.share_key,
            namespace = self.store.namespace()
        );
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handoff_core::payload::decode_media;
    use handoff_core::MemoryStore;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;

    struct RecordingHost {
        urls: Rc<RefCell<Vec<String>>>,
    }

    impl HostSignal for RecordingHost {
        fn signal_host(&self, url: &str) -> Result<(), ProducerError> {
            self.urls.borrow_mut().push(url.to_string());
            Ok(())
        }
    }

    struct UnreachableHost;

    impl HostSignal for UnreachableHost {
        fn signal_host(&self, _url: &str) -> Result<(), ProducerError> {
            Err(ProducerError::Signal("no responder can open urls".to_string()))
        }
    }

    fn extension(
        container: PathBuf,
        store: &Arc<MemoryStore>,
    ) -> (ShareExtension, Rc<RefCell<Vec<String>>>) {
        let urls = Rc::new(RefCell::new(Vec::new()));
        let extension = ShareExtension::new(
            ExtensionConfig {
                scheme: "SharePhotos".to_string(),
                share_key: "ShareKey".to_string(),
                container_dir: container,
            },
            Box::new(Arc::clone(store)),
            Box::new(RecordingHost {
                urls: Rc::clone(&urls),
            }),
        );
        (extension, urls)
    }

    #[test]
    fn text_and_links_share_as_one_text_batch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new("group.test"));
        let (extension, urls) = extension(dir.path().to_path_buf(), &store);

        let url = extension
            .share(&[
                Attachment::Text("look".to_string()),
                Attachment::Url("https://example.com".to_string()),
            ])
            .expect("share");

        assert_eq!(url, "SharePhotos://dataUrl=ShareKey#text");
        assert_eq!(urls.borrow().as_slice(), &[url]);
        assert_eq!(
            store.get("ShareKey").expect("get"),
            Some(StoredValue::Strings(vec![
                "look".to_string(),
                "https://example.com".to_string()
            ]))
        );
    }

    #[test]
    fn images_are_copied_before_signaling() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("pick.jpg");
        std::fs::write(&source, b"jpeg").expect("write source");
        let store = Arc::new(MemoryStore::new("group.test"));
        let (extension, urls) = extension(dir.path().join("group"), &store);

        let url = extension
            .share(&[
                Attachment::Image(source.clone()),
                Attachment::Image(dir.path().join("missing.png")),
            ])
            .expect("share");
        assert_eq!(url, "SharePhotos://dataUrl=ShareKey#media");
        assert_eq!(urls.borrow().len(), 1);

        let stored = store.get("ShareKey").expect("get").expect("entry");
        let items = decode_media(stored.as_data().expect("data")).expect("decode");
        assert_eq!(items.len(), 1);
        assert!(items[0].path.starts_with("file://"));
        assert!(items[0].path.ends_with(".jpg"));
        assert!(!items[0].path.contains("pick"));
    }

    #[test]
    fn nothing_usable_means_no_signal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new("group.test"));
        let (extension, urls) = extension(dir.path().to_path_buf(), &store);

        assert!(matches!(extension.share(&[]), Err(ProducerError::EmptyBatch)));
        assert!(matches!(
            extension.share(&[Attachment::Video(dir.path().join("gone.mov"))]),
            Err(ProducerError::EmptyBatch)
        ));
        assert!(urls.borrow().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn url_record_uses_url_channel() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new("group.test"));
        let (extension, _urls) = extension(dir.path().to_path_buf(), &store);

        let url = extension
            .share_url(&UrlShare {
                url: Some("https://example.com".to_string()),
                media_path: None,
            })
            .expect("share url");
        assert_eq!(url, "SharePhotos://dataUrl=ShareKey#url");
    }

    #[test]
    fn signal_failure_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new("group.test"));
        let extension = ShareExtension::new(
            ExtensionConfig {
                scheme: "SharePhotos".to_string(),
                share_key: "ShareKey".to_string(),
                container_dir: dir.path().to_path_buf(),
            },
            Box::new(Arc::clone(&store)),
            Box::new(UnreachableHost),
        );
        assert!(matches!(
            extension.share(&[Attachment::Text("x".to_string())]),
            Err(ProducerError::Signal(_))
        ));
    }
}
