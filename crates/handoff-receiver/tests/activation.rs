use handoff_core::payload::{encode_media, encode_text, encode_url};
use handoff_core::thumbnail::{
    thumbnail_path, FrameSize, ThumbnailError, ThumbnailGenerator, VideoFrameSource,
};
use handoff_core::{Channel, MediaItem, MemoryStore, SharedStore, StoredValue, UrlShare};
use handoff_receiver::{
    IdentifierResolver, LaunchOptions, ResolveError, ShareReceiver, ShareSink, ShareUpdate,
    UserActivity,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

const MEDIA_SIGNAL: &str = "SharePhotos://dataUrl=ShareKey#media";
const TEXT_SIGNAL: &str = "SharePhotos://dataUrl=ShareKey#text";
const URL_SIGNAL: &str = "SharePhotos://dataUrl=ShareKey#url";

/// Resolves a fixed set of identifiers; everything else fails.
struct MapResolver {
    known: HashMap<String, String>,
}

impl MapResolver {
    fn new(pairs: &[(&str, &str)]) -> Self {
        Self {
            known: pairs
                .iter()
                .map(|(id, path)| (id.to_string(), path.to_string()))
                .collect(),
        }
    }
}

impl IdentifierResolver for MapResolver {
    fn try_resolve(&self, identifier: &str) -> Result<String, ResolveError> {
        self.known
            .get(identifier)
            .cloned()
            .ok_or_else(|| ResolveError::NotInCatalog(identifier.to_string()))
    }
}

struct StubFrames {
    fail: bool,
}

impl VideoFrameSource for StubFrames {
    fn duration(&self, _video: &Path) -> Result<Duration, ThumbnailError> {
        Ok(Duration::from_secs(2))
    }

    fn write_frame(
        &self,
        _video: &Path,
        _at: Duration,
        _bound: FrameSize,
        dest: &Path,
    ) -> Result<(), ThumbnailError> {
        if self.fail {
            return Err(ThumbnailError::Frame("no decoder".to_string()));
        }
        std::fs::write(dest, b"frame")?;
        Ok(())
    }
}

fn receiver_with(store: &Arc<MemoryStore>, resolver: MapResolver) -> ShareReceiver {
    ShareReceiver::new(Box::new(Arc::clone(store)), Box::new(resolver))
}

fn put_media(store: &MemoryStore, items: &[MediaItem]) {
    store
        .set(
            "ShareKey",
            StoredValue::Data(encode_media(items).expect("encode media")),
        )
        .expect("store media");
}

fn put_text(store: &MemoryStore, texts: &[&str]) {
    store
        .set(
            "ShareKey",
            StoredValue::Strings(texts.iter().map(|t| t.to_string()).collect()),
        )
        .expect("store text");
}

fn recorder() -> (Rc<RefCell<Vec<ShareUpdate>>>, Box<dyn ShareSink>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink_seen = Rc::clone(&seen);
    let sink: Box<dyn ShareSink> =
        Box::new(move |update: &ShareUpdate| sink_seen.borrow_mut().push(update.clone()));
    (seen, sink)
}

#[test]
fn cold_then_warm_media_keeps_initial_until_reset() {
    let store = Arc::new(MemoryStore::new("group.test"));
    let mut receiver = receiver_with(
        &store,
        MapResolver::new(&[("asset-a", "/photos/a.jpg"), ("asset-b", "/photos/b.jpg")]),
    );

    put_media(&store, &[MediaItem::image("asset-a")]);
    assert!(receiver.handle_activation(Some(MEDIA_SIGNAL), true));
    put_media(&store, &[MediaItem::image("asset-b")]);
    assert!(receiver.handle_activation(Some(MEDIA_SIGNAL), false));

    assert_eq!(
        receiver.initial_media(),
        Some(&[MediaItem::image("/photos/a.jpg")][..])
    );
    assert_eq!(
        receiver.latest_media(),
        Some(&[MediaItem::image("/photos/b.jpg")][..])
    );
    assert_eq!(
        receiver.get_initial_media().expect("encode").as_deref(),
        Some(r#"[{"path":"/photos/a.jpg","type":0}]"#)
    );

    receiver.reset();
    receiver.reset();
    assert_eq!(receiver.initial_media(), None);
    assert_eq!(receiver.latest_media(), None);
    assert_eq!(receiver.initial_text(), None);
    assert_eq!(receiver.latest_url(), None);
}

#[test]
fn second_cold_flagged_activation_does_not_replace_initial() {
    let store = Arc::new(MemoryStore::new("group.test"));
    let mut receiver = receiver_with(&store, MapResolver::new(&[]));

    put_text(&store, &["first"]);
    assert!(receiver.handle_activation(Some(TEXT_SIGNAL), true));
    put_text(&store, &["second"]);
    assert!(receiver.handle_activation(Some(TEXT_SIGNAL), true));

    assert!(receiver.cold_start_seen());
    assert_eq!(receiver.initial_text(), Some("first"));
    assert_eq!(receiver.latest_text(), Some("second"));
}

#[test]
fn unresolvable_item_is_dropped_from_batch() {
    let store = Arc::new(MemoryStore::new("group.test"));
    let mut receiver = receiver_with(
        &store,
        MapResolver::new(&[("asset-1", "/p/1.jpg"), ("asset-3", "/p/3.jpg")]),
    );
    put_media(
        &store,
        &[
            MediaItem::image("asset-1"),
            MediaItem::image("asset-2"),
            MediaItem::image("asset-3"),
        ],
    );

    assert!(receiver.handle_activation(Some(MEDIA_SIGNAL), false));
    let latest = receiver.latest_media().expect("media");
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[0].path, "/p/1.jpg");
    assert_eq!(latest[1].path, "/p/3.jpg");
}

#[test]
fn unrecognized_fragment_becomes_text() {
    let store = Arc::new(MemoryStore::new("group.test"));
    let mut receiver = receiver_with(&store, MapResolver::new(&[]));
    let (seen, sink) = recorder();
    receiver.subscribe(Channel::Text, sink);

    assert!(receiver.handle_activation(Some("myapp://foo"), true));
    assert_eq!(receiver.latest_text(), Some("myapp://foo"));
    assert_eq!(receiver.initial_text(), Some("myapp://foo"));

    assert!(receiver.handle_activation(Some("myapp://foo#photos"), false));
    assert_eq!(receiver.latest_text(), Some("myapp://foo#photos"));
    assert_eq!(
        seen.borrow().as_slice(),
        &[
            ShareUpdate::Text(Some("myapp://foo".to_string())),
            ShareUpdate::Text(Some("myapp://foo#photos".to_string())),
        ]
    );
}

#[test]
fn replaced_subscriber_receives_nothing() {
    let store = Arc::new(MemoryStore::new("group.test"));
    let mut receiver = receiver_with(&store, MapResolver::new(&[("a", "/p/a.jpg")]));
    let (first, first_sink) = recorder();
    let (second, second_sink) = recorder();
    receiver
        .subscribe_named("media", first_sink)
        .expect("subscribe first");
    receiver
        .subscribe_named("media", second_sink)
        .expect("subscribe second");

    put_media(&store, &[MediaItem::image("a")]);
    receiver.handle_activation(Some(MEDIA_SIGNAL), false);

    assert!(first.borrow().is_empty());
    assert_eq!(
        second.borrow().as_slice(),
        &[ShareUpdate::Media(Some(vec![MediaItem::image("/p/a.jpg")]))]
    );
}

#[test]
fn subscriber_registered_late_gets_no_replay() {
    let store = Arc::new(MemoryStore::new("group.test"));
    let mut receiver = receiver_with(&store, MapResolver::new(&[]));
    put_text(&store, &["early"]);
    receiver.handle_activation(Some(TEXT_SIGNAL), true);

    let (seen, sink) = recorder();
    receiver.subscribe(Channel::Text, sink);
    assert!(seen.borrow().is_empty());
    assert_eq!(receiver.get_initial_text().as_deref(), Some("early"));
}

#[test]
fn each_activation_pushes_once_in_arrival_order() {
    let store = Arc::new(MemoryStore::new("group.test"));
    let mut receiver = receiver_with(&store, MapResolver::new(&[]));
    let (seen, sink) = recorder();
    receiver.subscribe(Channel::Text, sink);

    put_text(&store, &["one"]);
    receiver.handle_activation(Some(TEXT_SIGNAL), false);
    receiver.handle_activation(Some(TEXT_SIGNAL), false);
    put_text(&store, &["two", "three"]);
    receiver.handle_activation(Some(TEXT_SIGNAL), false);

    assert_eq!(
        seen.borrow().as_slice(),
        &[
            ShareUpdate::Text(Some("one".to_string())),
            ShareUpdate::Text(Some("one".to_string())),
            ShareUpdate::Text(Some("two,three".to_string())),
        ]
    );
}

#[test]
fn missing_or_garbled_entry_is_accepted_as_absent() {
    let store = Arc::new(MemoryStore::new("group.test"));
    let mut receiver = receiver_with(&store, MapResolver::new(&[]));
    let (seen, sink) = recorder();
    receiver.subscribe(Channel::Media, sink);

    assert!(receiver.handle_activation(Some(MEDIA_SIGNAL), true));
    assert_eq!(receiver.latest_media(), None);

    store
        .set("ShareKey", StoredValue::Data(b"[{\"path\":1}".to_vec()))
        .expect("store garbage");
    assert!(receiver.handle_activation(Some(MEDIA_SIGNAL), false));

    put_text(&store, &["wrong shape"]);
    assert!(receiver.handle_activation(Some(MEDIA_SIGNAL), false));

    assert_eq!(receiver.latest_media(), None);
    assert_eq!(seen.borrow().len(), 3);
    assert!(seen
        .borrow()
        .iter()
        .all(|update| *update == ShareUpdate::Media(None)));
}

#[test]
fn signal_without_key_is_accepted_as_absent() {
    let store = Arc::new(MemoryStore::new("group.test"));
    let mut receiver = receiver_with(&store, MapResolver::new(&[]));
    put_text(&store, &["ignored"]);
    assert!(receiver.handle_activation(Some("SharePhotos://dataUrl=#text"), false));
    assert_eq!(receiver.latest_text(), None);
}

#[test]
fn absent_or_malformed_signal_clears_latest_only() {
    let store = Arc::new(MemoryStore::new("group.test"));
    let mut receiver = receiver_with(&store, MapResolver::new(&[]));
    put_text(&store, &["kept"]);
    receiver.handle_activation(Some(TEXT_SIGNAL), true);

    assert!(!receiver.handle_activation(None, false));
    assert_eq!(receiver.latest_text(), None);
    assert_eq!(receiver.initial_text(), Some("kept"));

    receiver.handle_activation(Some(TEXT_SIGNAL), false);
    assert!(!receiver.handle_activation(Some("not a url"), false));
    assert_eq!(receiver.latest_text(), None);
    assert_eq!(receiver.initial_text(), Some("kept"));
}

#[test]
fn text_payload_may_arrive_as_encoded_data() {
    let store = Arc::new(MemoryStore::new("group.test"));
    let mut receiver = receiver_with(&store, MapResolver::new(&[]));
    store
        .set(
            "ShareKey",
            StoredValue::Data(
                encode_text(&["a".to_string(), "b".to_string()]).expect("encode text"),
            ),
        )
        .expect("store");
    receiver.handle_activation(Some(TEXT_SIGNAL), false);
    assert_eq!(receiver.latest_text(), Some("a,b"));
}

#[test]
fn url_channel_round_trips_link_record() {
    let store = Arc::new(MemoryStore::new("group.test"));
    let mut receiver = receiver_with(&store, MapResolver::new(&[]));
    let share = UrlShare {
        url: Some("https://example.com/post/1".to_string()),
        media_path: Some("/group/cover.png".to_string()),
    };
    store
        .set(
            "ShareKey",
            StoredValue::Data(encode_url(&share).expect("encode url")),
        )
        .expect("store");

    assert!(receiver.handle_activation(Some(URL_SIGNAL), true));
    assert_eq!(receiver.initial_url(), Some(&share));
    assert_eq!(
        receiver.get_initial_url().expect("encode").as_deref(),
        Some(r#"{"url":"https://example.com/post/1","mediaPath":"/group/cover.png"}"#)
    );
}

#[test]
fn video_thumbnails_are_resolved_or_generated() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(MemoryStore::new("group.test"));
    let mut receiver = receiver_with(
        &store,
        MapResolver::new(&[
            ("video-1", "/group/one.mp4"),
            ("thumb-1", "/group/one.jpg"),
            ("video-2", "/group/two.mp4"),
        ]),
    )
    .with_thumbnails(ThumbnailGenerator::new(
        dir.path(),
        Box::new(StubFrames { fail: false }),
    ));

    put_media(
        &store,
        &[
            MediaItem::video("video-1", Some("thumb-1".to_string()), Some(1000.0)),
            MediaItem::video("video-2", None, Some(2000.0)),
            MediaItem::video("video-2", Some("thumb-gone".to_string()), None),
        ],
    );
    receiver.handle_activation(Some(MEDIA_SIGNAL), false);

    let generated = thumbnail_path(dir.path(), Path::new("/group/two.mp4"))
        .expect("derived path")
        .to_string_lossy()
        .into_owned();
    let latest = receiver.latest_media().expect("media");
    assert_eq!(
        latest,
        &[
            MediaItem::video("/group/one.mp4", Some("/group/one.jpg".to_string()), Some(1000.0)),
            MediaItem::video("/group/two.mp4", Some(generated.clone()), Some(2000.0)),
            MediaItem::video("/group/two.mp4", Some(generated), None),
        ][..]
    );
}

#[test]
fn thumbnail_failure_keeps_the_video() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(MemoryStore::new("group.test"));
    let mut receiver = receiver_with(&store, MapResolver::new(&[("video", "/group/v.mp4")]))
        .with_thumbnails(ThumbnailGenerator::new(
            dir.path(),
            Box::new(StubFrames { fail: true }),
        ));

    put_media(&store, &[MediaItem::video("video", None, Some(500.0))]);
    receiver.handle_activation(Some(MEDIA_SIGNAL), false);

    assert_eq!(
        receiver.latest_media(),
        Some(&[MediaItem::video("/group/v.mp4", None, Some(500.0))][..])
    );
}

#[test]
fn image_items_never_carry_thumbnails() {
    let store = Arc::new(MemoryStore::new("group.test"));
    let mut receiver = receiver_with(&store, MapResolver::new(&[("img", "/p/img.png")]));
    put_media(
        &store,
        &[MediaItem {
            thumbnail_path: Some("stray".to_string()),
            ..MediaItem::image("img")
        }],
    );
    receiver.handle_activation(Some(MEDIA_SIGNAL), false);
    assert_eq!(
        receiver.latest_media(),
        Some(&[MediaItem::image("/p/img.png")][..])
    );
}

#[test]
fn command_dispatch_by_method_name() {
    let store = Arc::new(MemoryStore::new("group.test"));
    let mut receiver = receiver_with(&store, MapResolver::new(&[]));
    put_text(&store, &["hello", "world"]);
    receiver.handle_activation(Some(TEXT_SIGNAL), true);

    assert_eq!(
        receiver.handle_method("getInitialText").expect("text"),
        Some("hello,world".to_string())
    );
    assert_eq!(receiver.handle_method("getInitialMedia").expect("media"), None);
    assert_eq!(receiver.handle_method("getInitialUrl").expect("url"), None);
    assert_eq!(receiver.handle_method("reset").expect("reset"), None);
    assert_eq!(receiver.handle_method("getInitialText").expect("text"), None);

    let err = receiver.handle_method("getLatestText").expect_err("unknown");
    assert_eq!(err.code(), "NOT_IMPLEMENTED");
    assert!(receiver.unsubscribe_named("photos").is_err());
}

#[test]
fn entry_points_funnel_into_router() {
    let store = Arc::new(MemoryStore::new("group.test"));
    let mut receiver = receiver_with(&store, MapResolver::new(&[]));

    assert!(!receiver.on_launch(&LaunchOptions::default()));
    assert!(!receiver.cold_start_seen());

    let launch = LaunchOptions {
        url: None,
        user_activities: vec![
            UserActivity {
                activity_type: "com.example.note".to_string(),
                webpage_url: None,
            },
            UserActivity {
                activity_type: "NSUserActivityTypeBrowsingWeb".to_string(),
                webpage_url: Some("https://example.com/share".to_string()),
            },
        ],
    };
    assert!(receiver.on_launch(&launch));
    assert_eq!(receiver.initial_text(), Some("https://example.com/share"));

    put_text(&store, &["warm"]);
    assert!(receiver.on_open_url(TEXT_SIGNAL));
    assert_eq!(receiver.latest_text(), Some("warm"));
    assert_eq!(receiver.initial_text(), Some("https://example.com/share"));

    assert!(!receiver.on_continue_activity(&UserActivity::default()));
    assert_eq!(receiver.latest_text(), None);
}

#[test]
fn continue_activity_fills_initial_after_plain_launch() {
    let store = Arc::new(MemoryStore::new("group.test"));
    let mut receiver = receiver_with(&store, MapResolver::new(&[]));
    receiver.on_launch(&LaunchOptions::default());

    let activity = UserActivity {
        activity_type: "NSUserActivityTypeBrowsingWeb".to_string(),
        webpage_url: Some("https://example.com/a".to_string()),
    };
    assert!(receiver.on_continue_activity(&activity));
    assert_eq!(receiver.initial_text(), Some("https://example.com/a"));
}
